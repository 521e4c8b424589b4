//! Pull request snapshot types.
//!
//! A [`PullRequestSnapshot`] is everything the decision engine knows about a
//! pull request at one point in time. It is fetched fresh for every evaluation
//! and never cached between evaluations.
//!
//! Enum values use GitHub's GraphQL spelling (`SCREAMING_SNAKE_CASE`) so the
//! GitHub adapter can deserialize them directly. A value outside the known set
//! fails deserialization, which surfaces as a contract violation rather than
//! being silently mapped to a default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PrNumber, RepoId, Sha};

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

/// GitHub's computed mergeability of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeableState {
    /// No conflicts with the base branch.
    Mergeable,
    /// Conflicts must be resolved before merging.
    Conflicting,
    /// GitHub has not finished computing mergeability yet.
    Unknown,
}

/// The relationship of a user to the repository (GitHub's `CommentAuthorAssociation`).
///
/// `Ord` follows [`AuthorAssociation::priority`], the authority order used for
/// threshold comparisons:
///
/// `Unknown < None < FirstTimer < FirstTimeContributor < Contributor < Collaborator < Member < Owner`
///
/// Any value GitHub sends that is not in the list (e.g. `MANNEQUIN`) becomes
/// [`AuthorAssociation::Unknown`], which ranks strictly below `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    None,
    FirstTimer,
    FirstTimeContributor,
    Contributor,
    Collaborator,
    Member,
    Owner,
    #[serde(other)]
    Unknown,
}

impl Ord for AuthorAssociation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for AuthorAssociation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl AuthorAssociation {
    /// Known associations in ascending priority.
    pub const ORDERED: [AuthorAssociation; 7] = [
        AuthorAssociation::None,
        AuthorAssociation::FirstTimer,
        AuthorAssociation::FirstTimeContributor,
        AuthorAssociation::Contributor,
        AuthorAssociation::Collaborator,
        AuthorAssociation::Member,
        AuthorAssociation::Owner,
    ];

    /// Position in [`Self::ORDERED`], or `-1` for an unrecognized association.
    pub fn priority(self) -> i8 {
        Self::ORDERED
            .iter()
            .position(|a| *a == self)
            .map_or(-1, |p| p as i8)
    }

    /// Returns true if this association has at least the authority of `threshold`.
    pub fn at_least(self, threshold: AuthorAssociation) -> bool {
        self.priority() >= threshold.priority()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthorAssociation::Unknown => "UNKNOWN",
            AuthorAssociation::None => "NONE",
            AuthorAssociation::FirstTimer => "FIRST_TIMER",
            AuthorAssociation::FirstTimeContributor => "FIRST_TIME_CONTRIBUTOR",
            AuthorAssociation::Contributor => "CONTRIBUTOR",
            AuthorAssociation::Collaborator => "COLLABORATOR",
            AuthorAssociation::Member => "MEMBER",
            AuthorAssociation::Owner => "OWNER",
        }
    }
}

impl std::fmt::Display for AuthorAssociation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

impl ReviewState {
    /// Returns true for reviews that express a verdict.
    ///
    /// Only verdicts replace an author's earlier review: a comment after an
    /// approval leaves the approval standing.
    pub fn is_verdict(self) -> bool {
        matches!(self, ReviewState::Approved | ReviewState::ChangesRequested)
    }
}

/// A pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Login of the reviewer. `None` for deleted accounts ("ghost").
    pub author: Option<String>,
    pub author_association: AuthorAssociation,
    pub state: ReviewState,
    /// `None` for reviews that were never submitted.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Execution status of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Requested,
    Queued,
    InProgress,
    Waiting,
    Pending,
    Completed,
}

/// Conclusion of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckConclusion {
    Success,
    Neutral,
    Skipped,
    Stale,
    Failure,
    Cancelled,
    TimedOut,
    ActionRequired,
    StartupFailure,
}

impl CheckConclusion {
    /// Returns true for conclusions that block a merge.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            CheckConclusion::Failure
                | CheckConclusion::Cancelled
                | CheckConclusion::TimedOut
                | CheckConclusion::ActionRequired
        )
    }

    /// Returns true for conclusions GitHub accepts for a required check.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            CheckConclusion::Success | CheckConclusion::Neutral | CheckConclusion::Skipped
        )
    }
}

/// A check run on the head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    /// Present once `status` is `Completed`.
    pub conclusion: Option<CheckConclusion>,
}

/// State of a commit status context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    Expected,
    Pending,
    Success,
    Failure,
    Error,
}

/// A commit status (legacy status API) on the head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusContext {
    pub context: String,
    pub state: StatusState,
}

/// A branch protection rule of the base repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtectionRule {
    /// fnmatch-style branch pattern, e.g. `main` or `release/*`.
    pub pattern: String,
    pub requires_status_checks: bool,
    /// "Require branches to be up to date before merging".
    pub requires_strict_status_checks: bool,
    pub required_status_check_contexts: Vec<String>,
}

/// A fresh view of a pull request and the facts of its base branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub number: PrNumber,
    pub title: String,
    pub state: PrState,
    pub mergeable: MergeableState,
    pub author_association: AuthorAssociation,

    /// Name of the base branch.
    pub base_ref_name: String,
    /// Base commit recorded on the pull request.
    pub base_ref_oid: Sha,
    /// Current tip of the base branch. `None` if the branch no longer exists.
    pub base_branch_tip: Option<Sha>,

    pub head_ref_name: String,
    pub head_ref_oid: Sha,

    pub base_repository: RepoId,
    /// `None` when the head repository was deleted.
    pub head_repository: Option<RepoId>,

    pub labels: Vec<String>,
    pub reviews: Vec<Review>,
    pub check_runs: Vec<CheckRun>,
    pub status_contexts: Vec<StatusContext>,
    pub branch_protection_rules: Vec<BranchProtectionRule>,
}

impl PullRequestSnapshot {
    /// Returns true if the head branch lives in a different repository.
    ///
    /// A deleted head repository counts as a fork: the bot cannot push to it or
    /// delete its branch.
    pub fn is_fork(&self) -> bool {
        self.head_repository.as_ref() != Some(&self.base_repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_association;
    use proptest::prelude::*;

    #[test]
    fn association_priorities_follow_github_order() {
        for (index, association) in AuthorAssociation::ORDERED.iter().enumerate() {
            assert_eq!(association.priority(), index as i8);
        }
        assert_eq!(AuthorAssociation::Unknown.priority(), -1);
    }

    #[test]
    fn unrecognized_association_deserializes_as_unknown() {
        let parsed: AuthorAssociation = serde_json::from_str("\"MANNEQUIN\"").unwrap();
        assert_eq!(parsed, AuthorAssociation::Unknown);
        assert!(!parsed.at_least(AuthorAssociation::None));
    }

    #[test]
    fn unknown_ranks_below_none() {
        assert!(AuthorAssociation::Unknown < AuthorAssociation::None);
        assert!(AuthorAssociation::Owner > AuthorAssociation::Member);

        let mut sorted = vec![AuthorAssociation::Owner, AuthorAssociation::Unknown, AuthorAssociation::None];
        sorted.sort();
        assert_eq!(
            sorted,
            vec![AuthorAssociation::Unknown, AuthorAssociation::None, AuthorAssociation::Owner]
        );
    }

    #[test]
    fn unknown_mergeable_value_is_rejected() {
        let parsed: Result<MergeableState, _> = serde_json::from_str("\"MAYBE\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn blocking_conclusions() {
        assert!(CheckConclusion::Failure.is_blocking());
        assert!(CheckConclusion::Cancelled.is_blocking());
        assert!(CheckConclusion::TimedOut.is_blocking());
        assert!(CheckConclusion::ActionRequired.is_blocking());
        assert!(!CheckConclusion::Success.is_blocking());
        assert!(!CheckConclusion::Neutral.is_blocking());
    }

    proptest! {
        #[test]
        fn order_matches_priority(a in arb_association(), b in arb_association()) {
            prop_assert_eq!(a.cmp(&b), a.priority().cmp(&b.priority()));
            prop_assert_eq!(a.at_least(b), a >= b);
        }
    }

    #[test]
    fn missing_head_repository_is_a_fork() {
        let mut snapshot = crate::test_utils::open_snapshot();
        assert!(!snapshot.is_fork());

        snapshot.head_repository = Some(RepoId::new("someone-else", "repo"));
        assert!(snapshot.is_fork());

        snapshot.head_repository = None;
        assert!(snapshot.is_fork());
    }
}
