//! Pull request snapshots via GraphQL.
//!
//! One query returns everything the conditions look at: the pull request,
//! its reviews, labels and head commit checks, the current tip of the base
//! branch and the repository's branch protection rules. REST would need a
//! request per concern.
//!
//! The response is first read as untyped JSON and then deserialized into the
//! domain types, so an unknown enum value surfaces as a
//! [`GitHubErrorKind::ContractViolation`](super::GitHubErrorKind) instead of
//! an opaque octocrab error.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::effects::SnapshotFetcher;
use crate::types::{
    AuthorAssociation, BranchProtectionRule, CheckRun, MergeableState, PrNumber, PrState,
    PullRequestRef, PullRequestSnapshot, RepoId, Review, ReviewState, Sha, StatusContext,
};

use super::client::OctocrabClient;
use super::error::GitHubApiError;

// ─── GraphQL Types ────────────────────────────────────────────────────────────

const SNAPSHOT_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!) {
    repository(owner: $owner, name: $repo) {
        branchProtectionRules(first: 100) {
            nodes {
                pattern
                requiresStatusChecks
                requiresStrictStatusChecks
                requiredStatusCheckContexts
            }
        }
        pullRequest(number: $number) {
            number
            title
            state
            mergeable
            authorAssociation
            baseRefName
            baseRefOid
            baseRef { target { oid } }
            headRefName
            headRefOid
            baseRepository { name owner { login } }
            headRepository { name owner { login } }
            labels(first: 100) { nodes { name } }
            reviews(last: 100) {
                nodes {
                    author { login }
                    authorAssociation
                    state
                    submittedAt
                }
            }
            commits(last: 1) {
                nodes {
                    commit {
                        checkSuites(first: 50) {
                            nodes { checkRuns(first: 100) { nodes { name status conclusion } } }
                        }
                        status { contexts { context state } }
                    }
                }
            }
        }
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

impl<T> Nodes<T> {
    fn into_vec(nodes: Option<Nodes<T>>) -> Vec<T> {
        nodes.map(|n| n.nodes).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotData {
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    branch_protection_rules: Option<Nodes<RawProtectionRule>>,
    pull_request: Option<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProtectionRule {
    pattern: String,
    requires_status_checks: bool,
    requires_strict_status_checks: bool,
    required_status_check_contexts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    number: u64,
    title: String,
    state: PrState,
    mergeable: MergeableState,
    author_association: AuthorAssociation,
    base_ref_name: String,
    base_ref_oid: Sha,
    base_ref: Option<RawRef>,
    head_ref_name: String,
    head_ref_oid: Sha,
    base_repository: Option<RawRepositoryName>,
    head_repository: Option<RawRepositoryName>,
    labels: Option<Nodes<RawLabel>>,
    reviews: Option<Nodes<RawReview>>,
    commits: Nodes<RawCommitNode>,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    target: Option<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    oid: Sha,
}

#[derive(Debug, Deserialize)]
struct RawRepositoryName {
    name: String,
    owner: RawActor,
}

impl From<RawRepositoryName> for RepoId {
    fn from(raw: RawRepositoryName) -> Self {
        RepoId::new(raw.owner.login, raw.name)
    }
}

#[derive(Debug, Deserialize)]
struct RawActor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReview {
    author: Option<RawActor>,
    author_association: AuthorAssociation,
    state: ReviewState,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawCommitNode {
    commit: RawCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommit {
    check_suites: Option<Nodes<RawCheckSuite>>,
    status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCheckSuite {
    check_runs: Option<Nodes<CheckRun>>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    contexts: Vec<StatusContext>,
}

// ─── Conversion ───────────────────────────────────────────────────────────────

/// Deserializes a GraphQL response body, surfacing reported errors.
fn parse_response<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, GitHubApiError> {
    let response: GraphQlResponse<T> = serde_json::from_value(body)
        .map_err(|e| GitHubApiError::contract_violation(format!("unexpected response: {}", e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(GitHubApiError::permanent_without_source(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| GitHubApiError::contract_violation("response has no data"))
}

/// Builds a snapshot from the query response for `pr`.
fn into_snapshot(
    pr: &PullRequestRef,
    data: SnapshotData,
) -> Result<PullRequestSnapshot, GitHubApiError> {
    let repository = data.repository.ok_or_else(|| {
        GitHubApiError::permanent_without_source(format!("repository {} not found", pr.repo))
    })?;
    let raw = repository
        .pull_request
        .ok_or_else(|| GitHubApiError::permanent_without_source(format!("{} not found", pr)))?;

    let branch_protection_rules = Nodes::into_vec(repository.branch_protection_rules)
        .into_iter()
        .map(|rule| BranchProtectionRule {
            pattern: rule.pattern,
            requires_status_checks: rule.requires_status_checks,
            requires_strict_status_checks: rule.requires_strict_status_checks,
            required_status_check_contexts: rule.required_status_check_contexts.unwrap_or_default(),
        })
        .collect();

    let reviews = Nodes::into_vec(raw.reviews)
        .into_iter()
        .map(|review| Review {
            author: review.author.map(|a| a.login),
            author_association: review.author_association,
            state: review.state,
            submitted_at: review.submitted_at,
        })
        .collect();

    let head_commit = raw.commits.nodes.into_iter().next_back().map(|n| n.commit);
    let (check_runs, status_contexts) = match head_commit {
        Some(commit) => (
            Nodes::into_vec(commit.check_suites)
                .into_iter()
                .flat_map(|suite| Nodes::into_vec(suite.check_runs))
                .collect(),
            commit.status.map(|s| s.contexts).unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(PullRequestSnapshot {
        number: PrNumber(raw.number),
        title: raw.title,
        state: raw.state,
        mergeable: raw.mergeable,
        author_association: raw.author_association,
        base_ref_name: raw.base_ref_name,
        base_ref_oid: raw.base_ref_oid,
        base_branch_tip: raw.base_ref.and_then(|r| r.target).map(|t| t.oid),
        head_ref_name: raw.head_ref_name,
        head_ref_oid: raw.head_ref_oid,
        base_repository: raw
            .base_repository
            .map(RepoId::from)
            .unwrap_or_else(|| pr.repo.clone()),
        head_repository: raw.head_repository.map(RepoId::from),
        labels: Nodes::into_vec(raw.labels).into_iter().map(|l| l.name).collect(),
        reviews,
        check_runs,
        status_contexts,
        branch_protection_rules,
    })
}

// ─── Fetcher Implementation ───────────────────────────────────────────────────

impl SnapshotFetcher for OctocrabClient {
    type Error = GitHubApiError;

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn fetch_snapshot(&self, pr: &PullRequestRef) -> Result<PullRequestSnapshot, GitHubApiError> {
        let body: serde_json::Value = self
            .inner()
            .graphql(&serde_json::json!({
                "query": SNAPSHOT_QUERY,
                "variables": {
                    "owner": pr.owner(),
                    "repo": pr.repo_name(),
                    "number": pr.number.0,
                },
            }))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let snapshot = into_snapshot(pr, parse_response(body)?)?;
        debug!(
            state = ?snapshot.state,
            mergeable = ?snapshot.mergeable,
            head = %snapshot.head_ref_oid.short(),
            "Fetched snapshot"
        );
        Ok(snapshot)
    }
}
