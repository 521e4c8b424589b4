//! Conditions on the pull request itself: open and mergeable.

use crate::config::RepoConfig;
use crate::types::{MergeableState, PrState, PullRequestSnapshot};

use super::ConditionResult;

/// Succeeds iff the pull request is open.
pub fn open(_config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    match snapshot.state {
        PrState::Open => ConditionResult::Success,
        PrState::Closed => ConditionResult::fail("State of the pull request is CLOSED"),
        PrState::Merged => ConditionResult::fail("State of the pull request is MERGED"),
    }
}

/// Succeeds iff GitHub reports no conflicts; pending while GitHub is still computing.
pub fn mergeable(_config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    match snapshot.mergeable {
        MergeableState::Mergeable => ConditionResult::Success,
        MergeableState::Conflicting => ConditionResult::fail("Pull request has conflicts"),
        MergeableState::Unknown => ConditionResult::pending("Mergeable state is not yet known"),
    }
}
