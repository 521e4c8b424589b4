//! Merge conditions.
//!
//! Each condition is a pure function from `(config, snapshot)` to a
//! [`ConditionResult`]. The registry [`CONDITIONS`] is an explicit ordered
//! table; [`evaluate`] runs every entry (no short-circuiting) so callers can
//! report every blocking reason at once.

use serde::Serialize;

use crate::config::RepoConfig;
use crate::types::PullRequestSnapshot;

pub mod branch;
pub mod checks;
pub mod labels;
pub mod lifecycle;
pub mod reviews;

/// Outcome of a single condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConditionResult {
    Success,
    Fail { message: String },
    Pending { message: Option<String> },
}

impl ConditionResult {
    pub fn fail(message: impl Into<String>) -> Self {
        ConditionResult::Fail {
            message: message.into(),
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        ConditionResult::Pending {
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConditionResult::Success)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, ConditionResult::Fail { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ConditionResult::Pending { .. })
    }

    /// The explanation attached to a failing or pending result.
    pub fn message(&self) -> Option<&str> {
        match self {
            ConditionResult::Success => None,
            ConditionResult::Fail { message } => Some(message),
            ConditionResult::Pending { message } => message.as_deref(),
        }
    }
}

/// Names of the registered conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionName {
    Open,
    Mergeable,
    RequiredLabels,
    BlockingLabels,
    MinimumApprovals,
    MaximumChangesRequested,
    BlockingChecks,
    RequiredChecks,
    UpToDateBranch,
}

impl ConditionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionName::Open => "open",
            ConditionName::Mergeable => "mergeable",
            ConditionName::RequiredLabels => "required_labels",
            ConditionName::BlockingLabels => "blocking_labels",
            ConditionName::MinimumApprovals => "minimum_approvals",
            ConditionName::MaximumChangesRequested => "maximum_changes_requested",
            ConditionName::BlockingChecks => "blocking_checks",
            ConditionName::RequiredChecks => "required_checks",
            ConditionName::UpToDateBranch => "up_to_date_branch",
        }
    }
}

/// Signature shared by every condition.
pub type ConditionFn = fn(&RepoConfig, &PullRequestSnapshot) -> ConditionResult;

/// The condition registry, in evaluation and reporting order.
pub const CONDITIONS: &[(ConditionName, ConditionFn)] = &[
    (ConditionName::Open, lifecycle::open),
    (ConditionName::Mergeable, lifecycle::mergeable),
    (ConditionName::RequiredLabels, labels::required_labels),
    (ConditionName::BlockingLabels, labels::blocking_labels),
    (ConditionName::MinimumApprovals, reviews::minimum_approvals),
    (
        ConditionName::MaximumChangesRequested,
        reviews::maximum_changes_requested,
    ),
    (ConditionName::BlockingChecks, checks::blocking_checks),
    (ConditionName::RequiredChecks, checks::required_checks),
    (ConditionName::UpToDateBranch, branch::up_to_date_branch),
];

/// The named results of one evaluation, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionResults {
    entries: Vec<(ConditionName, ConditionResult)>,
}

impl ConditionResults {
    /// Builds a result set from explicit entries.
    ///
    /// Conditions missing from `entries` read as [`ConditionResult::Success`].
    pub fn from_entries(entries: Vec<(ConditionName, ConditionResult)>) -> Self {
        ConditionResults { entries }
    }

    pub fn get(&self, name: ConditionName) -> &ConditionResult {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(&ConditionResult::Success, |(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ConditionName, ConditionResult)> {
        self.entries.iter()
    }

    pub fn any_pending(&self) -> bool {
        self.entries.iter().any(|(_, r)| r.is_pending())
    }

    pub fn all_success(&self) -> bool {
        self.entries.iter().all(|(_, r)| r.is_success())
    }

    /// Names of the conditions that did not succeed.
    pub fn unsatisfied(&self) -> Vec<ConditionName> {
        self.entries
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(n, _)| *n)
            .collect()
    }
}

/// Runs every registered condition against `snapshot`.
pub fn evaluate(config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResults {
    let entries = CONDITIONS
        .iter()
        .map(|(name, condition)| (*name, condition(config, snapshot)))
        .collect();
    ConditionResults { entries }
}
