//! Action execution via the REST API.
//!
//! - `merge` uses the head SHA as a guard, so a push that lands after the
//!   snapshot was taken makes GitHub reject the merge.
//! - `update_branch` passes `expected_head_sha` for the same reason.
//! - `delete_branch` removes the head ref from the base repository.
//! - Status reports are check runs on the head commit.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::conditions::ConditionResults;
use crate::config::RepoConfig;
use crate::effects::{Action, ActionExecutor};
use crate::status::{PullRequestStatus, check_run_conclusion, format_summary};
use crate::types::PullRequestSnapshot;

use super::client::OctocrabClient;
use super::error::GitHubApiError;

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    merge_method: &'static str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    merged: bool,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateBranchRequest<'a> {
    expected_head_sha: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckRunOutput {
    title: String,
    summary: String,
}

#[derive(Debug, Serialize)]
struct CheckRunRequest<'a> {
    name: &'a str,
    head_sha: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conclusion: Option<&'static str>,
    output: CheckRunOutput,
}

/// Builds the check run that reports `status` on the head commit.
///
/// Pending statuses stay `in_progress`; settled ones complete with the
/// conclusion of [`check_run_conclusion`].
fn check_run_request<'a>(
    snapshot: &'a PullRequestSnapshot,
    status: &PullRequestStatus,
    results: &ConditionResults,
    config: &'a RepoConfig,
) -> CheckRunRequest<'a> {
    let conclusion = check_run_conclusion(status.code);
    CheckRunRequest {
        name: &config.status_check_name,
        head_sha: snapshot.head_ref_oid.as_str(),
        status: if conclusion.is_some() {
            "completed"
        } else {
            "in_progress"
        },
        conclusion,
        output: CheckRunOutput {
            title: status.message.clone(),
            summary: format_summary(status, results),
        },
    }
}

impl OctocrabClient {
    async fn merge(
        &self,
        snapshot: &PullRequestSnapshot,
        config: &RepoConfig,
    ) -> Result<(), GitHubApiError> {
        let repo = &snapshot.base_repository;
        let url = format!("/repos/{}/{}/pulls/{}/merge", repo.owner, repo.repo, snapshot.number.0);
        let request = MergeRequest {
            merge_method: config.merge_method.as_api_str(),
            sha: snapshot.head_ref_oid.as_str(),
        };

        let response: MergeResponse = self
            .inner()
            .put(&url, Some(&request))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        if response.merged {
            Ok(())
        } else {
            Err(GitHubApiError::permanent_without_source(format!(
                "Merge request returned merged=false: {}",
                response.message.as_deref().unwrap_or("unknown reason")
            )))
        }
    }

    async fn update_branch(&self, snapshot: &PullRequestSnapshot) -> Result<(), GitHubApiError> {
        let repo = &snapshot.base_repository;
        let url = format!(
            "/repos/{}/{}/pulls/{}/update-branch",
            repo.owner, repo.repo, snapshot.number.0
        );
        let request = UpdateBranchRequest {
            expected_head_sha: snapshot.head_ref_oid.as_str(),
        };

        let _: serde_json::Value = self
            .inner()
            .put(&url, Some(&request))
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(())
    }

    async fn delete_branch(&self, snapshot: &PullRequestSnapshot) -> Result<(), GitHubApiError> {
        let repo = &snapshot.base_repository;
        self.inner()
            .repos(&repo.owner, &repo.repo)
            .delete_ref(&octocrab::params::repos::Reference::Branch(
                snapshot.head_ref_name.clone(),
            ))
            .await
            .map_err(GitHubApiError::from_octocrab)
    }
}

impl ActionExecutor for OctocrabClient {
    type Error = GitHubApiError;

    #[instrument(skip_all, fields(pr = %snapshot.number, %action))]
    async fn execute(
        &self,
        action: Action,
        snapshot: &PullRequestSnapshot,
        config: &RepoConfig,
    ) -> Result<(), GitHubApiError> {
        match action {
            Action::Merge => self.merge(snapshot, config).await,
            Action::UpdateBranch => self.update_branch(snapshot).await,
            Action::DeleteBranch => self.delete_branch(snapshot).await,
            // Handled by the wait queue.
            Action::Reschedule => Ok(()),
        }
    }

    #[instrument(skip_all, fields(pr = %snapshot.number, status = %status.code))]
    async fn report_status(
        &self,
        snapshot: &PullRequestSnapshot,
        status: &PullRequestStatus,
        results: &ConditionResults,
        config: &RepoConfig,
    ) -> Result<(), GitHubApiError> {
        let repo = &snapshot.base_repository;
        let url = format!("/repos/{}/{}/check-runs", repo.owner, repo.repo);
        let request = check_run_request(snapshot, status, results, config);

        let _: serde_json::Value = self
            .inner()
            .post(&url, Some(&request))
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        debug!(conclusion = ?request.conclusion, "Reported status");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::evaluate;
    use crate::status::{StatusCode, resolve_status};
    use crate::test_utils::open_snapshot;
    use crate::types::MergeableState;

    fn request_for(snapshot: &PullRequestSnapshot, config: &RepoConfig) -> serde_json::Value {
        let results = evaluate(config, snapshot);
        let status = resolve_status(snapshot.state, &results);
        serde_json::to_value(check_run_request(snapshot, &status, &results, config)).unwrap()
    }

    #[test]
    fn ready_pull_request_completes_successfully() {
        let snapshot = open_snapshot();
        let config = RepoConfig::default();

        let request = request_for(&snapshot, &config);

        assert_eq!(request["name"], "auto-merge");
        assert_eq!(request["head_sha"], "a".repeat(40));
        assert_eq!(request["status"], "completed");
        assert_eq!(request["conclusion"], "success");
        assert!(
            request["output"]["summary"]
                .as_str()
                .unwrap()
                .contains(StatusCode::ReadyForMerge.as_str())
        );
    }

    #[test]
    fn pending_pull_request_stays_in_progress() {
        let mut snapshot = open_snapshot();
        snapshot.mergeable = MergeableState::Unknown;
        let config = RepoConfig {
            status_check_name: "merge-bot".to_string(),
            ..RepoConfig::default()
        };

        let request = request_for(&snapshot, &config);

        assert_eq!(request["name"], "merge-bot");
        assert_eq!(request["status"], "in_progress");
        assert!(request.get("conclusion").is_none());
    }

    #[test]
    fn merge_request_carries_the_sha_guard() {
        let snapshot = open_snapshot();
        let request = MergeRequest {
            merge_method: RepoConfig::default().merge_method.as_api_str(),
            sha: snapshot.head_ref_oid.as_str(),
        };

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["sha"], "a".repeat(40));
        assert!(value["merge_method"].is_string());
    }
}
