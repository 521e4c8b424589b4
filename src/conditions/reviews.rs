//! Review conditions: minimum approvals and maximum change requests.
//!
//! Both conditions look only at each reviewer's latest verdict. Reviews are
//! ordered by submission time (stable, so equal timestamps keep their API
//! order) and a later `APPROVED` or `CHANGES_REQUESTED` review from the same
//! author replaces the earlier one. Comments, pending and dismissed reviews
//! never count and never replace a verdict. Reviews by deleted accounts
//! carry no author and are skipped, since they cannot be told apart.
//!
//! Thresholds are keyed by association: a threshold for `COLLABORATOR` counts
//! reviews from collaborators, members and owners.

use crate::config::RepoConfig;
use crate::types::{AuthorAssociation, PullRequestSnapshot, Review, ReviewState};

use super::ConditionResult;

/// Returns the latest verdict of every reviewer.
pub fn latest_reviews(reviews: &[Review]) -> Vec<&Review> {
    let mut sorted: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.author.is_some() && r.state.is_verdict())
        .collect();
    sorted.sort_by_key(|r| r.submitted_at);

    let mut latest: Vec<&Review> = Vec::new();
    for review in sorted {
        match latest.iter_mut().find(|r| r.author == review.author) {
            Some(slot) => *slot = review,
            None => latest.push(review),
        }
    }
    latest
}

fn count_at_least(reviews: &[&Review], state: ReviewState, threshold: AuthorAssociation) -> u32 {
    reviews
        .iter()
        .filter(|r| r.state == state && r.author_association.at_least(threshold))
        .count() as u32
}

/// Fails if any configured association has fewer approvals than required.
pub fn minimum_approvals(config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    let latest = latest_reviews(&snapshot.reviews);

    let missing: Vec<String> = config
        .min_approvals
        .iter()
        .filter(|(_, required)| **required > 0)
        .filter_map(|(association, required)| {
            let approvals = count_at_least(&latest, ReviewState::Approved, *association);
            (approvals < *required)
                .then(|| format!("{} {} of {}", association, approvals, required))
        })
        .collect();

    if missing.is_empty() {
        ConditionResult::Success
    } else {
        ConditionResult::fail(format!(
            "There are not enough approvals by reviewers ({})",
            missing.join(", ")
        ))
    }
}

/// Fails if any configured association has more change requests than allowed.
pub fn maximum_changes_requested(
    config: &RepoConfig,
    snapshot: &PullRequestSnapshot,
) -> ConditionResult {
    let latest = latest_reviews(&snapshot.reviews);

    let exceeded: Vec<String> = config
        .max_requested_changes
        .iter()
        .filter_map(|(association, allowed)| {
            let requested = count_at_least(&latest, ReviewState::ChangesRequested, *association);
            (requested > *allowed)
                .then(|| format!("{} {} of at most {}", association, requested, allowed))
        })
        .collect();

    if exceeded.is_empty() {
        ConditionResult::Success
    } else {
        ConditionResult::fail(format!(
            "There are changes requested by reviewers ({})",
            exceeded.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{open_snapshot, review};
    use std::collections::BTreeMap;

    fn config_with(
        min_approvals: &[(AuthorAssociation, u32)],
        max_requested_changes: &[(AuthorAssociation, u32)],
    ) -> RepoConfig {
        RepoConfig {
            min_approvals: min_approvals.iter().copied().collect::<BTreeMap<_, _>>(),
            max_requested_changes: max_requested_changes
                .iter()
                .copied()
                .collect::<BTreeMap<_, _>>(),
            ..RepoConfig::default()
        }
    }

    // ─── Latest review selection ───

    #[test]
    fn later_verdict_replaces_earlier_one() {
        let reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::ChangesRequested, 1),
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 2),
        ];
        let latest = latest_reviews(&reviews);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].state, ReviewState::Approved);
    }

    #[test]
    fn submission_time_wins_over_api_order() {
        let reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 5),
            review("alice", AuthorAssociation::Member, ReviewState::ChangesRequested, 3),
        ];
        let latest = latest_reviews(&reviews);
        assert_eq!(latest[0].state, ReviewState::Approved);
    }

    #[test]
    fn equal_timestamps_keep_api_order() {
        let reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 1),
            review("alice", AuthorAssociation::Member, ReviewState::ChangesRequested, 1),
        ];
        let latest = latest_reviews(&reviews);
        assert_eq!(latest[0].state, ReviewState::ChangesRequested);
    }

    #[test]
    fn comments_do_not_replace_verdicts() {
        let reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 1),
            review("alice", AuthorAssociation::Member, ReviewState::Commented, 2),
            review("alice", AuthorAssociation::Member, ReviewState::Dismissed, 3),
        ];
        let latest = latest_reviews(&reviews);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].state, ReviewState::Approved);
    }

    #[test]
    fn reviews_are_grouped_per_author() {
        let reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 1),
            review("bob", AuthorAssociation::Owner, ReviewState::ChangesRequested, 2),
        ];
        assert_eq!(latest_reviews(&reviews).len(), 2);
    }

    #[test]
    fn reviews_by_deleted_accounts_are_skipped() {
        let mut ghost_approval = review("ghost", AuthorAssociation::Owner, ReviewState::Approved, 1);
        ghost_approval.author = None;
        let mut ghost_request =
            review("ghost", AuthorAssociation::Owner, ReviewState::ChangesRequested, 2);
        ghost_request.author = None;
        let reviews = vec![
            ghost_approval,
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 3),
            ghost_request,
        ];

        let latest = latest_reviews(&reviews);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].author.as_deref(), Some("alice"));
    }

    // ─── Minimum approvals ───

    #[test]
    fn approval_from_higher_association_counts() {
        let config = config_with(&[(AuthorAssociation::Member, 1)], &[]);
        let snapshot = open_snapshot();
        assert!(minimum_approvals(&config, &snapshot).is_success());
    }

    #[test]
    fn approval_from_lower_association_does_not_count() {
        let config = config_with(&[(AuthorAssociation::Member, 1)], &[]);
        let mut snapshot = open_snapshot();
        snapshot.reviews = vec![review(
            "carol",
            AuthorAssociation::Contributor,
            ReviewState::Approved,
            1,
        )];

        assert_eq!(
            minimum_approvals(&config, &snapshot),
            ConditionResult::fail("There are not enough approvals by reviewers (MEMBER 0 of 1)")
        );
    }

    #[test]
    fn every_threshold_must_hold() {
        let config = config_with(
            &[(AuthorAssociation::Owner, 1), (AuthorAssociation::Collaborator, 2)],
            &[],
        );
        let mut snapshot = open_snapshot();
        snapshot.reviews = vec![
            review("owner", AuthorAssociation::Owner, ReviewState::Approved, 1),
            review("member", AuthorAssociation::Member, ReviewState::Approved, 2),
        ];
        assert!(minimum_approvals(&config, &snapshot).is_success());

        snapshot.reviews.pop();
        assert!(minimum_approvals(&config, &snapshot).is_fail());
    }

    #[test]
    fn zero_threshold_is_ignored() {
        let config = config_with(&[(AuthorAssociation::Owner, 0)], &[]);
        let mut snapshot = open_snapshot();
        snapshot.reviews.clear();
        assert!(minimum_approvals(&config, &snapshot).is_success());
    }

    #[test]
    fn superseded_approval_does_not_count() {
        let config = config_with(&[(AuthorAssociation::Member, 1)], &[]);
        let mut snapshot = open_snapshot();
        snapshot.reviews = vec![
            review("alice", AuthorAssociation::Member, ReviewState::Approved, 1),
            review("alice", AuthorAssociation::Member, ReviewState::ChangesRequested, 2),
        ];
        assert!(minimum_approvals(&config, &snapshot).is_fail());
    }

    #[test]
    fn unknown_association_never_meets_a_threshold() {
        let config = config_with(&[(AuthorAssociation::None, 1)], &[]);
        let mut snapshot = open_snapshot();
        snapshot.reviews = vec![review(
            "mannequin",
            AuthorAssociation::Unknown,
            ReviewState::Approved,
            1,
        )];
        assert!(minimum_approvals(&config, &snapshot).is_fail());
    }

    // ─── Maximum changes requested ───

    #[test]
    fn any_change_request_fails_default_config() {
        let config = RepoConfig::default();
        let mut snapshot = open_snapshot();
        snapshot.reviews.push(review(
            "dave",
            AuthorAssociation::None,
            ReviewState::ChangesRequested,
            3,
        ));

        assert_eq!(
            maximum_changes_requested(&config, &snapshot),
            ConditionResult::fail("There are changes requested by reviewers (NONE 1 of at most 0)")
        );
    }

    #[test]
    fn change_requests_below_threshold_association_are_ignored() {
        let config = config_with(&[], &[(AuthorAssociation::Member, 0)]);
        let mut snapshot = open_snapshot();
        snapshot.reviews.push(review(
            "dave",
            AuthorAssociation::Contributor,
            ReviewState::ChangesRequested,
            3,
        ));
        assert!(maximum_changes_requested(&config, &snapshot).is_success());
    }

    #[test]
    fn resolved_change_request_no_longer_counts() {
        let config = RepoConfig::default();
        let mut snapshot = open_snapshot();
        snapshot.reviews = vec![
            review("dave", AuthorAssociation::Member, ReviewState::ChangesRequested, 1),
            review("dave", AuthorAssociation::Member, ReviewState::Approved, 2),
        ];
        assert!(maximum_changes_requested(&config, &snapshot).is_success());
    }
}
