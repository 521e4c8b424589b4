//! GitHub API error types.
//!
//! Errors are categorized so that logs tell apart failures that may resolve
//! on their own from those that need a human:
//!
//! - **Transient** errors (5xx, rate limits, propagation delays) usually pass
//!   on a later trigger.
//! - **Permanent** errors (most 4xx) need intervention.
//! - **Contract violations** mean GitHub answered with data the engine cannot
//!   interpret, such as an unknown enum value or a missing required field.
//!
//! Nothing here retries; a failed action is reported and the next trigger
//! re-evaluates the pull request from a fresh snapshot.

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Likely to succeed when attempted again.
    ///
    /// Examples:
    /// - HTTP 5xx (server errors)
    /// - HTTP 429 (rate limited)
    /// - HTTP 403 with rate limit headers
    /// - "Required status check is expected" (propagation delay)
    /// - "Base branch was modified" (concurrent push to the base)
    /// - Network timeouts
    Transient,

    /// Requires human intervention.
    ///
    /// Examples:
    /// - "Pull request is not mergeable" (merge conflicts)
    /// - "Head branch was modified" (SHA guard on merge)
    /// - PR not found (404)
    /// - Authentication failures (401, 403 non-rate-limit)
    Permanent,

    /// The response does not match the shape the adapter expects.
    ContractViolation,
}

impl GitHubErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitHubErrorKind::Transient => "transient",
            GitHubErrorKind::Permanent => "permanent",
            GitHubErrorKind::ContractViolation => "contract violation",
        }
    }
}

/// A categorized GitHub API error.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "GitHub API error (HTTP {}, {}): {}",
                code,
                self.kind.as_str(),
                self.message
            ),
            None => write!(f, "GitHub API error ({}): {}", self.kind.as_str(), self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a permanent error without an octocrab source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error for a response that could not be interpreted.
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::ContractViolation,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error.
    ///
    /// The categorization is based on:
    /// - HTTP status codes
    /// - Error message patterns for known GitHub API responses
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&err);
        let message = err.to_string();

        if is_transient_message(&message) {
            return Self {
                kind: GitHubErrorKind::Transient,
                status_code,
                message,
                source: Some(err),
            };
        }

        let kind = match status_code {
            Some(429) => GitHubErrorKind::Transient,
            Some(403) if is_rate_limit_error(&message) => GitHubErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => GitHubErrorKind::Transient,
            Some(_) => GitHubErrorKind::Permanent,
            None if is_network_error(&message) => GitHubErrorKind::Transient,
            None => GitHubErrorKind::Permanent,
        };

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Extracts the HTTP status code from an octocrab error, if present.
    ///
    /// octocrab does not expose the status of every error variant, so this
    /// reads it from the rendered message. An unrecognized message yields
    /// `None`, which categorizes as permanent unless it looks like a network
    /// failure.
    fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
        status_from_message(&err.to_string())
    }
}

/// Codes recognized anywhere in an error message, with an optional word that
/// must also appear.
const KNOWN_STATUS_CODES: &[(u16, Option<&str>)] = &[
    (404, Some("not found")),
    (409, Some("conflict")),
    (422, None),
    (403, None),
    (401, None),
    (429, None),
    (500, None),
    (502, None),
    (503, None),
];

fn status_from_message(message: &str) -> Option<u16> {
    if let Some(idx) = message.find("status: ") {
        let digits: String = message[idx + 8..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    let lower = message.to_lowercase();
    KNOWN_STATUS_CODES
        .iter()
        .find(|(code, word)| {
            message.contains(&code.to_string()) && word.is_none_or(|w| lower.contains(w))
        })
        .map(|(code, _)| *code)
}

fn contains_any(message: &str, needles: &[&str]) -> bool {
    let lower = message.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

/// Messages of GitHub quirks that resolve by themselves: status checks not yet
/// propagated after a push, a concurrent push to the base branch, and generic
/// "try again" answers.
fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    (lower.contains("required status check") && lower.contains("expected"))
        || contains_any(message, &["base branch was modified", "try again"])
}

fn is_rate_limit_error(message: &str) -> bool {
    contains_any(message, &["rate limit", "api rate", "abuse detection"])
}

fn is_network_error(message: &str) -> bool {
    contains_any(message, &["timeout", "timed out", "connection", "network", "dns"])
}
