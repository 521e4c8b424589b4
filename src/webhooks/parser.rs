//! GitHub webhook payload parser.
//!
//! Webhooks are only triggers: the engine re-fetches everything it decides
//! on, so parsing extracts nothing but the repository and the pull request
//! numbers an event refers to.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. Unknown event types return `Ok(None)` (ignored, not an error)
//! 3. Known events without pull request numbers return `Ok(None)`
//! 4. Check events caused by the bot's own status report return `Ok(None)`
//! 5. Malformed payloads return `Err` with details

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::config::DEFAULT_STATUS_CHECK_NAME;
use crate::types::{PrNumber, PullRequestRef, RepoId};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Webhook events that can change the outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PullRequest,
    PullRequestReview,
    CheckRun,
    CheckSuite,
    Status,
}

impl EventKind {
    /// Maps an `X-GitHub-Event` header value. Unhandled events yield `None`.
    pub fn from_header(event_type: &str) -> Option<Self> {
        match event_type {
            "pull_request" => Some(EventKind::PullRequest),
            "pull_request_review" => Some(EventKind::PullRequestReview),
            "check_run" => Some(EventKind::CheckRun),
            "check_suite" => Some(EventKind::CheckSuite),
            "status" => Some(EventKind::Status),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PullRequest => "pull_request",
            EventKind::PullRequestReview => "pull_request_review",
            EventKind::CheckRun => "check_run",
            EventKind::CheckSuite => "check_suite",
            EventKind::Status => "status",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the check runs the bot publishes itself.
///
/// Reporting a status creates a check run, and GitHub answers with a
/// `check_run` webhook for the same pull request. Events matching these
/// fields are dropped so a report never triggers another evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnChecks {
    /// Name of the status check run.
    pub check_name: String,
    /// Slug of the GitHub App the bot authenticates as, if known. Check runs
    /// and check suites created by this app are ignored.
    pub app_slug: Option<String>,
}

impl Default for OwnChecks {
    fn default() -> Self {
        OwnChecks {
            check_name: DEFAULT_STATUS_CHECK_NAME.to_string(),
            app_slug: None,
        }
    }
}

impl OwnChecks {
    fn owns_app(&self, app: Option<&RawApp>) -> bool {
        match (&self.app_slug, app) {
            (Some(own), Some(app)) => *own == app.slug,
            _ => false,
        }
    }

    fn owns_run(&self, run: &RawCheck) -> bool {
        run.name.as_deref() == Some(self.check_name.as_str()) || self.owns_app(run.app.as_ref())
    }
}

/// The pull requests a webhook asks to re-evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub event: EventKind,
    pub repo: RepoId,
    /// Never empty, without duplicates, in payload order.
    pub pull_requests: Vec<PrNumber>,
}

impl Trigger {
    /// References to every triggered pull request.
    pub fn refs(&self) -> impl Iterator<Item = PullRequestRef> + '_ {
        self.pull_requests
            .iter()
            .map(|number| PullRequestRef::new(self.repo.clone(), *number))
    }
}

/// Parses a webhook payload into a trigger.
///
/// # Returns
///
/// * `Ok(Some(trigger))` - The event refers to at least one pull request
/// * `Ok(None)` - Unknown event type, no pull request involved, or a check
///   event produced by the bot itself (see [`OwnChecks`])
/// * `Err(e)` - Malformed payload or missing required fields
///
/// # Examples
///
/// ```
/// use auto_merge::webhooks::{OwnChecks, parse_webhook};
///
/// let payload = br#"{
///     "action": "submitted",
///     "pull_request": { "number": 42 },
///     "repository": { "owner": { "login": "octocat" }, "name": "hello-world" }
/// }"#;
///
/// let trigger = parse_webhook("pull_request_review", payload, &OwnChecks::default())
///     .unwrap()
///     .unwrap();
/// assert_eq!(trigger.pull_requests[0].0, 42);
/// ```
pub fn parse_webhook(
    event_type: &str,
    payload: &[u8],
    own: &OwnChecks,
) -> Result<Option<Trigger>, ParseError> {
    let Some(event) = EventKind::from_header(event_type) else {
        return Ok(None);
    };

    let (repository, numbers) = match event {
        EventKind::PullRequest | EventKind::PullRequestReview => {
            let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
            (raw.repository, vec![raw.pull_request.number])
        }
        EventKind::CheckRun => {
            let raw: RawCheckRunPayload = serde_json::from_slice(payload)?;
            if own.owns_run(&raw.check_run) {
                return Ok(None);
            }
            (raw.repository, numbers_of(raw.check_run.pull_requests))
        }
        EventKind::CheckSuite => {
            let raw: RawCheckSuitePayload = serde_json::from_slice(payload)?;
            if own.owns_app(raw.check_suite.app.as_ref()) {
                return Ok(None);
            }
            (raw.repository, numbers_of(raw.check_suite.pull_requests))
        }
        // Status payloads only carry a commit SHA.
        EventKind::Status => {
            let _: RawStatusPayload = serde_json::from_slice(payload)?;
            return Ok(None);
        }
    };

    let mut pull_requests: Vec<PrNumber> = Vec::with_capacity(numbers.len());
    for number in numbers {
        if !pull_requests.contains(&number) {
            pull_requests.push(number);
        }
    }
    if pull_requests.is_empty() {
        return Ok(None);
    }

    Ok(Some(Trigger {
        event,
        repo: RepoId::new(repository.owner.login, repository.name),
        pull_requests,
    }))
}

fn numbers_of(pull_requests: Vec<RawPullRequestNumber>) -> Vec<PrNumber> {
    pull_requests.into_iter().map(|pr| pr.number).collect()
}

// ============================================================================
// Raw payload structures for deserialization
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestNumber {
    number: PrNumber,
}

/// `pull_request` and `pull_request_review` share this shape.
#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    pull_request: RawPullRequestNumber,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawCheckRunPayload {
    check_run: RawCheck,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawCheckSuitePayload {
    check_suite: RawCheck,
    repository: RawRepository,
}

/// Shared by `check_run` and `check_suite`; suites have no `name`.
#[derive(Debug, Deserialize)]
struct RawCheck {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    app: Option<RawApp>,
    #[serde(default)]
    pull_requests: Vec<RawPullRequestNumber>,
}

#[derive(Debug, Deserialize)]
struct RawApp {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct RawStatusPayload {
    #[allow(dead_code)]
    repository: RawRepository,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repository() -> serde_json::Value {
        json!({ "owner": { "login": "octocat" }, "name": "hello-world" })
    }

    fn parse(event_type: &str, payload: serde_json::Value) -> Result<Option<Trigger>, ParseError> {
        parse_webhook(event_type, &serde_json::to_vec(&payload).unwrap(), &OwnChecks::default())
    }

    fn own_app() -> OwnChecks {
        OwnChecks {
            check_name: "auto-merge".to_string(),
            app_slug: Some("auto-merge-bot".to_string()),
        }
    }

    #[test]
    fn pull_request_event() {
        let trigger = parse(
            "pull_request",
            json!({
                "action": "labeled",
                "number": 7,
                "pull_request": { "number": 7, "head": { "sha": "abc" } },
                "repository": repository(),
            }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(trigger.event, EventKind::PullRequest);
        assert_eq!(trigger.repo, RepoId::new("octocat", "hello-world"));
        assert_eq!(trigger.pull_requests, vec![PrNumber(7)]);
        assert_eq!(
            trigger.refs().map(|r| r.to_string()).collect::<Vec<_>>(),
            vec!["octocat/hello-world#7"]
        );
    }

    #[test]
    fn check_run_event_lists_every_pull_request_once() {
        let trigger = parse(
            "check_run",
            json!({
                "action": "completed",
                "check_run": {
                    "name": "build",
                    "pull_requests": [{ "number": 3 }, { "number": 5 }, { "number": 3 }]
                },
                "repository": repository(),
            }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(trigger.pull_requests, vec![PrNumber(3), PrNumber(5)]);
    }

    #[test]
    fn own_status_check_run_is_ignored() {
        let result = parse(
            "check_run",
            json!({
                "action": "created",
                "check_run": {
                    "name": "auto-merge",
                    "pull_requests": [{ "number": 7 }]
                },
                "repository": repository(),
            }),
        )
        .unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn check_runs_of_own_app_are_ignored_under_any_name() {
        let payload = json!({
            "action": "completed",
            "check_run": {
                "name": "renamed-status",
                "app": { "slug": "auto-merge-bot" },
                "pull_requests": [{ "number": 7 }]
            },
            "repository": repository(),
        });

        let result =
            parse_webhook("check_run", &serde_json::to_vec(&payload).unwrap(), &own_app()).unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn check_suites_are_filtered_by_app() {
        let suite = |slug: &str| {
            json!({
                "action": "completed",
                "check_suite": {
                    "app": { "slug": slug },
                    "pull_requests": [{ "number": 4 }]
                },
                "repository": repository(),
            })
        };
        let parse_suite = |payload: serde_json::Value| {
            parse_webhook("check_suite", &serde_json::to_vec(&payload).unwrap(), &own_app())
                .unwrap()
        };

        assert_eq!(parse_suite(suite("auto-merge-bot")), None);
        assert_eq!(
            parse_suite(suite("github-actions")).map(|t| t.pull_requests),
            Some(vec![PrNumber(4)])
        );
    }

    #[test]
    fn check_suite_without_pull_requests_is_ignored() {
        let result = parse(
            "check_suite",
            json!({
                "action": "completed",
                "check_suite": { "pull_requests": [] },
                "repository": repository(),
            }),
        )
        .unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn status_event_is_ignored() {
        let result = parse(
            "status",
            json!({ "sha": "abc", "state": "success", "repository": repository() }),
        )
        .unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let result = parse("issue_comment", json!({ "anything": true })).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn missing_repository_is_an_error() {
        let result = parse("pull_request", json!({ "pull_request": { "number": 1 } }));
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }

    #[test]
    fn event_kinds_round_trip_through_header_names() {
        for kind in [
            EventKind::PullRequest,
            EventKind::PullRequestReview,
            EventKind::CheckRun,
            EventKind::CheckSuite,
            EventKind::Status,
        ] {
            assert_eq!(EventKind::from_header(kind.as_str()), Some(kind));
        }
    }
}
