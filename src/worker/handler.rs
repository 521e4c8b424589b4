//! Pull request evaluation.
//!
//! [`PullRequestHandler::handle`] is the unit of work the scheduler runs for a
//! pull request:
//!
//! 1. load the repository's config,
//! 2. fetch a fresh snapshot,
//! 3. evaluate every condition, resolve the status and plan actions,
//! 4. publish the status check (when `reportStatus` is on),
//! 5. execute the actions in order, stopping at the first failure.
//!
//! `Reschedule` is not executed here; the returned [`Evaluation`] tells the
//! wait queue to retry the pull request after the backoff delay.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::conditions::evaluate;
use crate::config::{ConfigError, ConfigProvider};
use crate::effects::{Action, ActionExecutor, SnapshotFetcher, plan_actions};
use crate::status::{PullRequestStatus, StatusCode, resolve_status};
use crate::types::PullRequestRef;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort the evaluation of a pull request.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("failed to load config for {pr}: {source}")]
    Config {
        pr: PullRequestRef,
        #[source]
        source: ConfigError,
    },

    #[error("failed to fetch {pr}: {source}")]
    Fetch {
        pr: PullRequestRef,
        #[source]
        source: BoxError,
    },

    #[error("{action} failed for {pr}: {source}")]
    Action {
        pr: PullRequestRef,
        action: Action,
        #[source]
        source: BoxError,
    },
}

impl HandleError {
    /// The pull request whose evaluation failed.
    pub fn pr(&self) -> &PullRequestRef {
        match self {
            HandleError::Config { pr, .. }
            | HandleError::Fetch { pr, .. }
            | HandleError::Action { pr, .. } => pr,
        }
    }
}

/// The result of one successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: PullRequestStatus,
    /// Planned actions, all executed except `Reschedule`.
    pub actions: Vec<Action>,
}

impl Evaluation {
    /// Returns true if the pull request should be evaluated again later.
    pub fn rescheduled(&self) -> bool {
        self.actions.contains(&Action::Reschedule)
    }
}

/// Evaluates pull requests and acts on the result.
#[derive(Debug)]
pub struct PullRequestHandler<C, F, X> {
    config: C,
    fetcher: F,
    executor: X,
}

impl<C, F, X> PullRequestHandler<C, F, X>
where
    C: ConfigProvider,
    F: SnapshotFetcher,
    X: ActionExecutor,
{
    pub fn new(config: C, fetcher: F, executor: X) -> Self {
        PullRequestHandler {
            config,
            fetcher,
            executor,
        }
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    pub async fn handle(&self, pr: &PullRequestRef) -> Result<Evaluation, HandleError> {
        let config = self
            .config
            .config_for(&pr.repo)
            .await
            .map_err(|source| HandleError::Config {
                pr: pr.clone(),
                source,
            })?;

        let snapshot = self
            .fetcher
            .fetch_snapshot(pr)
            .await
            .map_err(|e| HandleError::Fetch {
                pr: pr.clone(),
                source: Box::new(e),
            })?;

        let results = evaluate(&config, &snapshot);
        let status = resolve_status(snapshot.state, &results);
        let actions = plan_actions(status.code, &results, &config, snapshot.is_fork());
        debug!(
            status = %status.code,
            head = %snapshot.head_ref_oid.short(),
            ?actions,
            "Evaluated pull request"
        );

        if config.report_status && !matches!(status.code, StatusCode::Merged | StatusCode::Closed)
        {
            // Reporting failures never block the actions.
            if let Err(e) = self
                .executor
                .report_status(&snapshot, &status, &results, &config)
                .await
            {
                warn!(error = %e, "Failed to report status");
            }
        }

        for action in actions.iter().filter(|a| **a != Action::Reschedule) {
            info!(%action, "Executing action");
            self.executor
                .execute(*action, &snapshot, &config)
                .await
                .map_err(|e| HandleError::Action {
                    pr: pr.clone(),
                    action: *action,
                    source: Box::new(e),
                })?;
        }

        Ok(Evaluation { status, actions })
    }
}
