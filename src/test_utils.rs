//! Shared test fixtures, mock collaborators and arbitrary generators.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use thiserror::Error;

use crate::conditions::ConditionResults;
use crate::config::RepoConfig;
use crate::effects::{Action, ActionExecutor, SnapshotFetcher};
use crate::status::{PullRequestStatus, StatusCode};
use crate::types::{
    AuthorAssociation, BranchProtectionRule, CheckConclusion, CheckRun, CheckStatus,
    MergeableState, PrNumber, PrState, PullRequestRef, PullRequestSnapshot, RepoId, Review,
    ReviewState, Sha,
};

// ─── Generators ───

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    any::<u64>().prop_map(PrNumber)
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(Sha::new)
}

pub fn arb_association() -> impl Strategy<Value = AuthorAssociation> {
    prop_oneof![
        Just(AuthorAssociation::Unknown),
        Just(AuthorAssociation::None),
        Just(AuthorAssociation::FirstTimer),
        Just(AuthorAssociation::FirstTimeContributor),
        Just(AuthorAssociation::Contributor),
        Just(AuthorAssociation::Collaborator),
        Just(AuthorAssociation::Member),
        Just(AuthorAssociation::Owner),
    ]
}

// ─── Fixtures ───

/// The repository used by the fixtures.
pub fn repo() -> RepoId {
    RepoId::new("octocat", "hello-world")
}

pub fn pr_ref(number: u64) -> PullRequestRef {
    PullRequestRef::new(repo(), number)
}

/// A review submitted `t_secs` seconds after a fixed epoch.
pub fn review(login: &str, association: AuthorAssociation, state: ReviewState, t_secs: i64) -> Review {
    Review {
        author: Some(login.to_string()),
        author_association: association,
        state,
        submitted_at: Some(submitted_at(t_secs)),
    }
}

fn submitted_at(t_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + t_secs, 0).unwrap()
}

pub fn check_run(name: &str, status: CheckStatus, conclusion: Option<CheckConclusion>) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status,
        conclusion,
    }
}

/// A rule that requires status checks, strict or not, for `pattern`.
pub fn protection_rule(pattern: &str, strict: bool, contexts: &[&str]) -> BranchProtectionRule {
    BranchProtectionRule {
        pattern: pattern.to_string(),
        requires_status_checks: true,
        requires_strict_status_checks: strict,
        required_status_check_contexts: contexts.iter().map(|c| c.to_string()).collect(),
    }
}

/// PR #1 of [`repo()`], ready to merge under the default config.
///
/// Open and mergeable, approved by an owner, one successful `build` check,
/// no labels, up to date with `main` and not from a fork.
pub fn open_snapshot() -> PullRequestSnapshot {
    let base_sha = Sha::new("b".repeat(40));
    PullRequestSnapshot {
        number: PrNumber(1),
        title: "Add greeting".to_string(),
        state: PrState::Open,
        mergeable: MergeableState::Mergeable,
        author_association: AuthorAssociation::Contributor,
        base_ref_name: "main".to_string(),
        base_ref_oid: base_sha.clone(),
        base_branch_tip: Some(base_sha),
        head_ref_name: "feature/greeting".to_string(),
        head_ref_oid: Sha::new("a".repeat(40)),
        base_repository: repo(),
        head_repository: Some(repo()),
        labels: Vec::new(),
        reviews: vec![review(
            "octocat",
            AuthorAssociation::Owner,
            ReviewState::Approved,
            0,
        )],
        check_runs: vec![check_run(
            "build",
            CheckStatus::Completed,
            Some(CheckConclusion::Success),
        )],
        status_contexts: Vec::new(),
        branch_protection_rules: Vec::new(),
    }
}

// ─── Mock collaborators ───

#[derive(Debug, Clone, Error)]
#[error("mock: {0}")]
pub struct MockError(pub String);

#[derive(Default)]
struct FetcherState {
    snapshots: HashMap<PullRequestRef, PullRequestSnapshot>,
    fetches: Vec<PullRequestRef>,
    latency: Duration,
}

/// Serves snapshots from memory and records every fetch.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetcherState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `snapshot` for `pr` from now on.
    pub fn set(&self, pr: PullRequestRef, snapshot: PullRequestSnapshot) {
        self.state.lock().unwrap().snapshots.insert(pr, snapshot);
    }

    /// Applies `f` to the snapshot served for `pr`.
    pub fn update(&self, pr: &PullRequestRef, f: impl FnOnce(&mut PullRequestSnapshot)) {
        if let Some(snapshot) = self.state.lock().unwrap().snapshots.get_mut(pr) {
            f(snapshot);
        }
    }

    /// Makes every fetch take `latency` (of tokio time).
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    pub fn fetches(&self) -> Vec<PullRequestRef> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn fetch_count(&self, pr: &PullRequestRef) -> usize {
        self.fetches().iter().filter(|f| *f == pr).count()
    }
}

impl SnapshotFetcher for MockFetcher {
    type Error = MockError;

    async fn fetch_snapshot(&self, pr: &PullRequestRef) -> Result<PullRequestSnapshot, MockError> {
        let latency = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push(pr.clone());
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.state
            .lock()
            .unwrap()
            .snapshots
            .get(pr)
            .cloned()
            .ok_or_else(|| MockError(format!("{} not found", pr)))
    }
}

#[derive(Default)]
struct ExecutorState {
    executed: Vec<(Action, PrNumber)>,
    reported: Vec<StatusCode>,
    failing: HashSet<Action>,
}

/// Records executed actions and reported statuses.
#[derive(Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every execution of `action` fail.
    pub fn fail_on(&self, action: Action) {
        self.state.lock().unwrap().failing.insert(action);
    }

    /// Successfully executed actions, in order.
    pub fn executed(&self) -> Vec<(Action, PrNumber)> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn reported(&self) -> Vec<StatusCode> {
        self.state.lock().unwrap().reported.clone()
    }
}

impl ActionExecutor for MockExecutor {
    type Error = MockError;

    async fn execute(
        &self,
        action: Action,
        snapshot: &PullRequestSnapshot,
        _config: &RepoConfig,
    ) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&action) {
            return Err(MockError(format!("{} rejected", action)));
        }
        state.executed.push((action, snapshot.number));
        Ok(())
    }

    async fn report_status(
        &self,
        _snapshot: &PullRequestSnapshot,
        status: &PullRequestStatus,
        _results: &ConditionResults,
        _config: &RepoConfig,
    ) -> Result<(), MockError> {
        self.state.lock().unwrap().reported.push(status.code);
        Ok(())
    }
}
