//! Branch protection matching and the up-to-date branch condition.
//!
//! Branch protection rule patterns are fnmatch-style globs: `*` matches any
//! run of characters except `/`, and `**` also crosses `/`. A rule applies to a
//! pull request when its pattern matches the base branch name.

use globset::GlobBuilder;
use tracing::warn;

use crate::config::RepoConfig;
use crate::types::{BranchProtectionRule, PullRequestSnapshot};

use super::ConditionResult;

/// Returns true if a branch protection `pattern` applies to `branch`.
///
/// Invalid patterns match nothing.
pub fn pattern_matches(pattern: &str, branch: &str) -> bool {
    match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher().is_match(branch),
        Err(e) => {
            warn!(pattern, error = %e, "Ignoring invalid branch protection pattern");
            false
        }
    }
}

/// Returns the protection rules that apply to the pull request's base branch.
pub fn matching_rules(snapshot: &PullRequestSnapshot) -> impl Iterator<Item = &BranchProtectionRule> {
    snapshot
        .branch_protection_rules
        .iter()
        .filter(|rule| pattern_matches(&rule.pattern, &snapshot.base_ref_name))
}

/// Whether the base branch requires head branches to be up to date.
///
/// "No rule" and "a rule that is not strict" are kept apart so neither is
/// mistaken for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrictProtection {
    /// No protection rule matches the base branch.
    NoRule,
    /// Matching rules exist, none of them strict.
    NotStrict,
    /// At least one matching rule requires strict status checks.
    Strict,
}

pub fn strict_protection(snapshot: &PullRequestSnapshot) -> StrictProtection {
    let mut protection = StrictProtection::NoRule;
    for rule in matching_rules(snapshot) {
        if rule.requires_strict_status_checks {
            return StrictProtection::Strict;
        }
        protection = StrictProtection::NotStrict;
    }
    protection
}

/// Fails if a strict rule protects the base branch and the pull request is behind it.
pub fn up_to_date_branch(_config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    match strict_protection(snapshot) {
        StrictProtection::NoRule | StrictProtection::NotStrict => ConditionResult::Success,
        StrictProtection::Strict => match &snapshot.base_branch_tip {
            Some(tip) if *tip == snapshot.base_ref_oid => ConditionResult::Success,
            Some(tip) => ConditionResult::fail(format!(
                "The pull request is based on {} but {} is at {}",
                snapshot.base_ref_oid.short(),
                snapshot.base_ref_name,
                tip.short()
            )),
            None => ConditionResult::fail(format!(
                "The base branch {} no longer exists",
                snapshot.base_ref_name
            )),
        },
    }
}
