//! GitHub adapter.
//!
//! [`OctocrabClient`] implements both collaborator traits of the engine:
//!
//! - [`SnapshotFetcher`](crate::effects::SnapshotFetcher) with a single
//!   GraphQL query per evaluation ([`snapshot`]),
//! - [`ActionExecutor`](crate::effects::ActionExecutor) with REST calls for
//!   merging, updating and deleting branches, and check runs for status
//!   reports ([`actions`]).
//!
//! Failures are categorized ([`GitHubErrorKind`]) but never retried here.

mod actions;
mod client;
mod error;
mod snapshot;

pub use client::OctocrabClient;
pub use error::{GitHubApiError, GitHubErrorKind};
