//! Actions as data.
//!
//! The planner returns [`Action`] values describing what should happen to a
//! pull request; the handler hands them to an [`ActionExecutor`] in order.
//! `Reschedule` is never executed against GitHub: the handler turns it into a
//! delayed retry on the pull request's wait queue.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod interpreter;
pub mod plan;

pub use interpreter::{ActionExecutor, SnapshotFetcher};
pub use plan::plan_actions;

/// A side-effecting operation derived from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Merge the pull request with the configured merge method.
    Merge,
    /// Merge the base branch into the head branch.
    UpdateBranch,
    /// Delete the head branch.
    DeleteBranch,
    /// Evaluate the pull request again after the backoff delay.
    Reschedule,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Merge => "merge",
            Action::UpdateBranch => "update_branch",
            Action::DeleteBranch => "delete_branch",
            Action::Reschedule => "reschedule",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
