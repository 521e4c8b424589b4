//! Status check formatting.
//!
//! When `reportStatus` is enabled the resolved status is published as a check
//! run on the head commit. The check run's title is the status message and its
//! summary lists every condition result.

use std::fmt::Write;

use crate::conditions::{ConditionResult, ConditionResults};

use super::{PullRequestStatus, StatusCode};

/// Returns the check run conclusion for a status, or `None` while it is pending.
///
/// Pending statuses leave the check run `in_progress`.
pub fn check_run_conclusion(code: StatusCode) -> Option<&'static str> {
    match code {
        StatusCode::PendingMergeable | StatusCode::PendingChecks => None,
        StatusCode::ReadyForMerge | StatusCode::Merged => Some("success"),
        StatusCode::Closed | StatusCode::NotOpen => Some("neutral"),
        StatusCode::OutOfDateBranch => Some("action_required"),
        StatusCode::Conflicts
        | StatusCode::RequiresLabel
        | StatusCode::BlockingLabel
        | StatusCode::ChangesRequested
        | StatusCode::NeedApprovals
        | StatusCode::BlockingCheck => Some("failure"),
    }
}

fn marker(result: &ConditionResult) -> &'static str {
    match result {
        ConditionResult::Success => "✅",
        ConditionResult::Fail { .. } => "❌",
        ConditionResult::Pending { .. } => "⏳",
    }
}

/// Formats the markdown summary of a check run.
pub fn format_summary(status: &PullRequestStatus, results: &ConditionResults) -> String {
    let mut summary = format!("**{}** (`{}`)\n\n", status.message, status.code);
    for (name, result) in results.iter() {
        let _ = match result.message() {
            Some(message) => writeln!(summary, "- {} `{}`: {}", marker(result), name.as_str(), message),
            None => writeln!(summary, "- {} `{}`", marker(result), name.as_str()),
        };
    }
    summary
}
