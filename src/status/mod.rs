//! Status resolution.
//!
//! Reduces the condition results of one evaluation, plus the pull request's
//! lifecycle state, to exactly one [`StatusCode`]. Codes are tried in a fixed
//! precedence order and the first match wins:
//!
//! ```text
//! merged / closed
//!   -> not_open -> conflicts -> pending_mergeable
//!   -> requires_label -> blocking_label
//!   -> changes_requested -> need_approvals
//!   -> blocking_check -> pending_checks
//!   -> out_of_date_branch
//!   -> ready_for_merge
//! ```
//!
//! A pull request that is missing approvals and has failing checks is
//! therefore reported as `need_approvals`, never as both.

use std::fmt;

use serde::Serialize;

use crate::conditions::{ConditionName, ConditionResult, ConditionResults};
use crate::types::PrState;

pub mod format;

pub use format::{check_run_conclusion, format_summary};

/// The single outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Merged,
    Closed,
    NotOpen,
    PendingMergeable,
    Conflicts,
    RequiresLabel,
    BlockingLabel,
    ChangesRequested,
    NeedApprovals,
    PendingChecks,
    BlockingCheck,
    OutOfDateBranch,
    ReadyForMerge,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Merged => "merged",
            StatusCode::Closed => "closed",
            StatusCode::NotOpen => "not_open",
            StatusCode::PendingMergeable => "pending_mergeable",
            StatusCode::Conflicts => "conflicts",
            StatusCode::RequiresLabel => "requires_label",
            StatusCode::BlockingLabel => "blocking_label",
            StatusCode::ChangesRequested => "changes_requested",
            StatusCode::NeedApprovals => "need_approvals",
            StatusCode::PendingChecks => "pending_checks",
            StatusCode::BlockingCheck => "blocking_check",
            StatusCode::OutOfDateBranch => "out_of_date_branch",
            StatusCode::ReadyForMerge => "ready_for_merge",
        }
    }

    /// Returns true for codes that resolve by themselves given time.
    pub fn is_pending(&self) -> bool {
        matches!(self, StatusCode::PendingMergeable | StatusCode::PendingChecks)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status code with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestStatus {
    pub code: StatusCode,
    pub message: String,
}

impl PullRequestStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        PullRequestStatus {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

fn message_or(result: &ConditionResult, fallback: &str) -> String {
    result.message().unwrap_or(fallback).to_string()
}

/// Resolves the status of a pull request.
pub fn resolve_status(state: PrState, results: &ConditionResults) -> PullRequestStatus {
    match state {
        PrState::Merged => {
            return PullRequestStatus::new(StatusCode::Merged, "The pull request was merged");
        }
        PrState::Closed => {
            return PullRequestStatus::new(StatusCode::Closed, "The pull request was closed");
        }
        PrState::Open => {}
    }

    let open = results.get(ConditionName::Open);
    if !open.is_success() {
        return PullRequestStatus::new(
            StatusCode::NotOpen,
            message_or(open, "The pull request is not open"),
        );
    }

    let mergeable = results.get(ConditionName::Mergeable);
    if mergeable.is_fail() {
        return PullRequestStatus::new(
            StatusCode::Conflicts,
            message_or(mergeable, "The pull request has conflicts"),
        );
    }
    if mergeable.is_pending() {
        return PullRequestStatus::new(
            StatusCode::PendingMergeable,
            message_or(mergeable, "Waiting for GitHub to compute mergeability"),
        );
    }

    // Remaining codes map one or two conditions to a status on failure.
    let failures = [
        (
            StatusCode::RequiresLabel,
            &[ConditionName::RequiredLabels][..],
        ),
        (StatusCode::BlockingLabel, &[ConditionName::BlockingLabels][..]),
        (
            StatusCode::ChangesRequested,
            &[ConditionName::MaximumChangesRequested][..],
        ),
        (
            StatusCode::NeedApprovals,
            &[ConditionName::MinimumApprovals][..],
        ),
        (
            StatusCode::BlockingCheck,
            &[ConditionName::BlockingChecks, ConditionName::RequiredChecks][..],
        ),
    ];
    for (code, names) in failures {
        if let Some(result) = names
            .iter()
            .map(|name| results.get(*name))
            .find(|r| r.is_fail())
        {
            return PullRequestStatus::new(code, message_or(result, code.as_str()));
        }
    }

    if let Some(result) = [ConditionName::BlockingChecks, ConditionName::RequiredChecks]
        .iter()
        .map(|name| results.get(*name))
        .find(|r| r.is_pending())
    {
        return PullRequestStatus::new(
            StatusCode::PendingChecks,
            message_or(result, "Waiting for checks to complete"),
        );
    }

    let up_to_date = results.get(ConditionName::UpToDateBranch);
    if !up_to_date.is_success() {
        return PullRequestStatus::new(
            StatusCode::OutOfDateBranch,
            message_or(up_to_date, "The branch is out of date"),
        );
    }

    PullRequestStatus::new(StatusCode::ReadyForMerge, "The pull request is ready to be merged")
}
