//! Action planning.
//!
//! Rules, first match wins:
//!
//! 1. A merged or closed pull request gets no actions.
//! 2. Any pending condition: `[reschedule]`.
//! 3. Only the up-to-date branch condition fails and `updateBranch` is on:
//!    `[update_branch]`, or nothing for a fork.
//! 4. Any other unsatisfied condition: nothing, wait for the next trigger.
//! 5. Everything succeeded: `[merge]`, followed by `delete_branch` when
//!    `deleteBranchAfterMerge` is on and the head branch is not in a fork.

use crate::conditions::{ConditionName, ConditionResults};
use crate::config::RepoConfig;
use crate::status::StatusCode;

use super::Action;

/// Returns the ordered actions for one evaluation.
pub fn plan_actions(
    status: StatusCode,
    results: &ConditionResults,
    config: &RepoConfig,
    is_fork: bool,
) -> Vec<Action> {
    if matches!(status, StatusCode::Merged | StatusCode::Closed) {
        return Vec::new();
    }

    if results.any_pending() {
        return vec![Action::Reschedule];
    }

    if results.unsatisfied() == [ConditionName::UpToDateBranch] && config.update_branch {
        return if is_fork {
            Vec::new()
        } else {
            vec![Action::UpdateBranch]
        };
    }

    if !results.all_success() {
        return Vec::new();
    }

    let mut actions = vec![Action::Merge];
    if config.delete_branch_after_merge && !is_fork {
        actions.push(Action::DeleteBranch);
    }
    actions
}
