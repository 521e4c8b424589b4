//! auto-merge - a GitHub bot that merges pull requests once they satisfy the
//! repository's merge requirements.
//!
//! Webhooks trigger evaluations ([`worker::Engine`]). Each evaluation fetches
//! a fresh snapshot of the pull request, runs the [`conditions`], resolves a
//! single [`status`] and plans the [`effects`] to execute: merge, update the
//! branch, delete the branch, or check again later.

pub mod conditions;
pub mod config;
pub mod effects;
pub mod github;
pub mod server;
pub mod status;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
mod test_utils;
