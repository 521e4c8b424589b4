//! Core domain types for the auto-merge bot.
//!
//! This module contains the identifiers used as queue keys and the pull
//! request snapshot consumed by the decision engine.

pub mod ids;
pub mod pr;

pub use ids::{PrNumber, PullRequestRef, RepoId, Sha};
pub use pr::{
    AuthorAssociation, BranchProtectionRule, CheckConclusion, CheckRun, CheckStatus,
    MergeableState, PrState, PullRequestSnapshot, Review, ReviewState, StatusContext,
    StatusState,
};
