//! Check conditions: blocking check runs and required status checks.

use std::collections::BTreeSet;

use crate::config::RepoConfig;
use crate::types::{CheckStatus, PullRequestSnapshot, StatusState};

use super::ConditionResult;
use super::branch::matching_rules;

/// Pending while any check run is incomplete; fails if any completed run failed.
///
/// The bot's own status check run is ignored, otherwise it would block itself.
pub fn blocking_checks(config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    let runs: Vec<_> = snapshot
        .check_runs
        .iter()
        .filter(|run| run.name != config.status_check_name)
        .collect();

    let incomplete: Vec<&str> = runs
        .iter()
        .filter(|run| run.status != CheckStatus::Completed)
        .map(|run| run.name.as_str())
        .collect();
    if !incomplete.is_empty() {
        return ConditionResult::pending(format!(
            "Checks are not yet completed: {}",
            incomplete.join(", ")
        ));
    }

    let failed: Vec<&str> = runs
        .iter()
        .filter(|run| run.conclusion.is_some_and(|c| c.is_blocking()))
        .map(|run| run.name.as_str())
        .collect();
    if !failed.is_empty() {
        return ConditionResult::fail(format!("Checks have failed: {}", failed.join(", ")));
    }

    ConditionResult::Success
}

/// Combined state of one required context across check runs and commit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Missing,
    Pending,
    Failure,
    Success,
}

/// Resolves a required context against the check runs and commit statuses.
///
/// Any failing report wins over pending ones, and any pending report wins
/// over successful ones.
pub fn context_state(snapshot: &PullRequestSnapshot, context: &str) -> ContextState {
    let from_runs = snapshot
        .check_runs
        .iter()
        .filter(|run| run.name == context)
        .map(|run| match (run.status, run.conclusion) {
            (CheckStatus::Completed, Some(c)) if c.is_success() => ContextState::Success,
            (CheckStatus::Completed, _) => ContextState::Failure,
            _ => ContextState::Pending,
        });
    let from_statuses = snapshot
        .status_contexts
        .iter()
        .filter(|status| status.context == context)
        .map(|status| match status.state {
            StatusState::Success => ContextState::Success,
            StatusState::Pending | StatusState::Expected => ContextState::Pending,
            StatusState::Failure | StatusState::Error => ContextState::Failure,
        });

    from_runs
        .chain(from_statuses)
        .fold(ContextState::Missing, |acc, state| match (acc, state) {
            (ContextState::Failure, _) | (_, ContextState::Failure) => ContextState::Failure,
            (ContextState::Pending, _) | (_, ContextState::Pending) => ContextState::Pending,
            _ => ContextState::Success,
        })
}

/// Checks every context required by the protection rules of the base branch.
pub fn required_checks(_config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    let required: BTreeSet<&str> = matching_rules(snapshot)
        .filter(|rule| rule.requires_status_checks)
        .flat_map(|rule| rule.required_status_check_contexts.iter().map(String::as_str))
        .collect();

    let mut waiting = Vec::new();
    let mut failed = Vec::new();
    for context in required {
        match context_state(snapshot, context) {
            ContextState::Missing | ContextState::Pending => waiting.push(context),
            ContextState::Failure => failed.push(context),
            ContextState::Success => {}
        }
    }

    if !waiting.is_empty() {
        return ConditionResult::pending(format!(
            "Required checks are missing or pending: {}",
            waiting.join(", ")
        ));
    }
    if !failed.is_empty() {
        return ConditionResult::fail(format!(
            "Required checks have failed: {}",
            failed.join(", ")
        ));
    }
    ConditionResult::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{check_run, open_snapshot, protection_rule};
    use crate::types::{CheckConclusion, StatusContext};

    // ─── Blocking checks ───

    #[test]
    fn completed_successful_checks_pass() {
        let mut snapshot = open_snapshot();
        snapshot.check_runs = vec![
            check_run("build", CheckStatus::Completed, Some(CheckConclusion::Success)),
            check_run("lint", CheckStatus::Completed, Some(CheckConclusion::Neutral)),
        ];
        assert!(blocking_checks(&RepoConfig::default(), &snapshot).is_success());
    }

    #[test]
    fn incomplete_check_is_pending() {
        let mut snapshot = open_snapshot();
        snapshot.check_runs = vec![
            check_run("build", CheckStatus::InProgress, None),
            check_run("lint", CheckStatus::Completed, Some(CheckConclusion::Failure)),
        ];
        assert_eq!(
            blocking_checks(&RepoConfig::default(), &snapshot),
            ConditionResult::pending("Checks are not yet completed: build")
        );
    }

    #[test]
    fn each_blocking_conclusion_fails() {
        for conclusion in [
            CheckConclusion::Failure,
            CheckConclusion::Cancelled,
            CheckConclusion::TimedOut,
            CheckConclusion::ActionRequired,
        ] {
            let mut snapshot = open_snapshot();
            snapshot.check_runs = vec![check_run("build", CheckStatus::Completed, Some(conclusion))];
            assert_eq!(
                blocking_checks(&RepoConfig::default(), &snapshot),
                ConditionResult::fail("Checks have failed: build"),
                "conclusion {:?}",
                conclusion
            );
        }
    }

    #[test]
    fn own_status_check_is_ignored() {
        let mut snapshot = open_snapshot();
        snapshot
            .check_runs
            .push(check_run("auto-merge", CheckStatus::InProgress, None));
        assert!(blocking_checks(&RepoConfig::default(), &snapshot).is_success());
    }

    // ─── Required checks ───

    #[test]
    fn no_matching_rule_means_nothing_required() {
        let mut snapshot = open_snapshot();
        snapshot.branch_protection_rules = vec![protection_rule("release/*", false, &["ci"])];
        assert!(required_checks(&RepoConfig::default(), &snapshot).is_success());
    }

    #[test]
    fn missing_required_context_is_pending() {
        let mut snapshot = open_snapshot();
        snapshot.branch_protection_rules = vec![protection_rule("main", false, &["ci/deploy"])];
        assert_eq!(
            required_checks(&RepoConfig::default(), &snapshot),
            ConditionResult::pending("Required checks are missing or pending: ci/deploy")
        );
    }

    #[test]
    fn required_contexts_resolve_against_runs_and_statuses() {
        let mut snapshot = open_snapshot();
        snapshot.branch_protection_rules = vec![
            protection_rule("main", false, &["build"]),
            protection_rule("*", false, &["ci/legacy"]),
        ];
        snapshot.status_contexts = vec![StatusContext {
            context: "ci/legacy".to_string(),
            state: StatusState::Success,
        }];
        assert!(required_checks(&RepoConfig::default(), &snapshot).is_success());

        snapshot.status_contexts[0].state = StatusState::Error;
        assert_eq!(
            required_checks(&RepoConfig::default(), &snapshot),
            ConditionResult::fail("Required checks have failed: ci/legacy")
        );
    }

    #[test]
    fn pending_takes_precedence_over_failure() {
        let mut snapshot = open_snapshot();
        snapshot.branch_protection_rules = vec![protection_rule("main", false, &["build", "ci"])];
        snapshot.check_runs = vec![check_run(
            "build",
            CheckStatus::Completed,
            Some(CheckConclusion::Failure),
        )];
        snapshot.status_contexts = vec![StatusContext {
            context: "ci".to_string(),
            state: StatusState::Pending,
        }];
        assert!(required_checks(&RepoConfig::default(), &snapshot).is_pending());
    }

    #[test]
    fn rules_without_required_checks_are_skipped() {
        let mut snapshot = open_snapshot();
        let mut rule = protection_rule("main", false, &["ci/deploy"]);
        rule.requires_status_checks = false;
        snapshot.branch_protection_rules = vec![rule];
        assert!(required_checks(&RepoConfig::default(), &snapshot).is_success());
    }

    #[test]
    fn context_state_combines_reports() {
        let mut snapshot = open_snapshot();
        assert_eq!(context_state(&snapshot, "nothing"), ContextState::Missing);
        assert_eq!(context_state(&snapshot, "build"), ContextState::Success);

        snapshot.status_contexts.push(StatusContext {
            context: "build".to_string(),
            state: StatusState::Pending,
        });
        assert_eq!(context_state(&snapshot, "build"), ContextState::Pending);

        snapshot.check_runs.push(check_run(
            "build",
            CheckStatus::Completed,
            Some(CheckConclusion::TimedOut),
        ));
        assert_eq!(context_state(&snapshot, "build"), ContextState::Failure);
    }
}
