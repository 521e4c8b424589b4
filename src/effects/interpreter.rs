//! Collaborator traits for reading from and writing to GitHub.
//!
//! The decision engine never talks to GitHub directly. It asks a
//! [`SnapshotFetcher`] for a fresh view of a pull request and hands planned
//! actions to an [`ActionExecutor`]. The octocrab-backed client implements
//! both; tests use in-memory mocks.
//!
//! # Example (mock for testing)
//!
//! ```ignore
//! struct FixedSnapshot(PullRequestSnapshot);
//!
//! impl SnapshotFetcher for FixedSnapshot {
//!     type Error = std::convert::Infallible;
//!
//!     async fn fetch_snapshot(&self, _pr: &PullRequestRef) -> Result<PullRequestSnapshot, Self::Error> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

use std::future::Future;

use crate::conditions::ConditionResults;
use crate::config::RepoConfig;
use crate::status::PullRequestStatus;
use crate::types::{PullRequestRef, PullRequestSnapshot};

use super::Action;

/// Fetches pull request snapshots.
pub trait SnapshotFetcher: Send + Sync + 'static {
    /// The error type returned by this fetcher.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the current state of a pull request and of its base branch.
    fn fetch_snapshot(
        &self,
        pr: &PullRequestRef,
    ) -> impl Future<Output = Result<PullRequestSnapshot, Self::Error>> + Send;
}

/// Performs planned actions against GitHub.
pub trait ActionExecutor: Send + Sync + 'static {
    /// The error type returned by this executor.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes one action for the pull request described by `snapshot`.
    ///
    /// `Action::Reschedule` is never passed here.
    fn execute(
        &self,
        action: Action,
        snapshot: &PullRequestSnapshot,
        config: &RepoConfig,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Publishes the resolved status on the head commit.
    fn report_status(
        &self,
        snapshot: &PullRequestSnapshot,
        status: &PullRequestStatus,
        results: &ConditionResults,
        config: &RepoConfig,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
