//! The scheduling engine.
//!
//! [`Engine::queue`] is the only ingress. Each repository gets a
//! [`WaitQueue`] of pull request numbers, created on the first trigger and
//! dropped again when it drains. The wait queue's worker submits the pull
//! request to the shared [`TaskScheduler`] under the repository key and waits
//! for the evaluation to finish; a rescheduled evaluation comes back as
//! [`WorkOutcome::Retry`] with the configured backoff. The backoff delays only
//! that pull request: other pull requests of the repository keep running.
//!
//! ```text
//!  trigger ──► Engine::queue ──► WaitQueue(repo) ──► TaskScheduler[repo] ──► PullRequestHandler
//!                  │                    ▲                                          │
//!                  └ stop_waiting_for   └──────── Retry(reschedule_delay) ◄────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::config::ConfigProvider;
use crate::effects::{ActionExecutor, SnapshotFetcher};
use crate::types::{PrNumber, PullRequestRef, RepoId};

use super::config::EngineConfig;
use super::handler::{HandleError, PullRequestHandler};
use super::scheduler::{ErrorFn, TaskError, TaskScheduler, task_fn};
use super::wait_queue::{DrainFn, WaitQueue, WaitQueueTask, WorkOutcome, work_fn};

/// A pull request submitted to the task scheduler.
#[derive(Debug, Clone)]
pub struct PullRequestTask {
    pub pr: PullRequestRef,
    /// Receives whether the evaluation asked for a reschedule.
    reply: mpsc::Sender<bool>,
}

/// A wait queue task as shown by the introspection endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskView {
    Wait { pr: PrNumber, delay_ms: u64 },
    Work { pr: PrNumber },
}

impl From<WaitQueueTask<PrNumber>> for TaskView {
    fn from(task: WaitQueueTask<PrNumber>) -> Self {
        match task {
            WaitQueueTask::Wait { id, delay } => TaskView::Wait {
                pr: id,
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            },
            WaitQueueTask::Work { id, .. } => TaskView::Work { pr: id },
        }
    }
}

/// Read-only view of one repository's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub repo: RepoId,
    pub current: Option<TaskView>,
    pub queued: Vec<TaskView>,
    /// Pull requests waiting out their reschedule backoff.
    pub retrying: Vec<TaskView>,
    /// True while the repository has work in the task scheduler.
    pub scheduled: bool,
}

type Scheduler = TaskScheduler<RepoId, PullRequestTask, HandleError>;

struct EngineInner {
    config: EngineConfig,
    queues: Mutex<HashMap<RepoId, WaitQueue<PrNumber>>>,
    scheduler: Arc<Scheduler>,
}

/// Schedules pull request evaluations. Cloning yields another handle.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn report_task_error(queue: &RepoId, error: TaskError<HandleError>) {
    match &error {
        TaskError::Failed(e) => {
            error!(%queue, pull_request = %e.pr(), error = %e, "Failed to process pull request");
        }
        TaskError::Panicked(message) => {
            error!(%queue, panic = %message, "Pull request handler panicked");
        }
    }
}

impl Engine {
    /// Creates an engine that evaluates pull requests with `handler`.
    ///
    /// Nothing is spawned until the first [`Engine::queue`], which must run
    /// within a tokio runtime.
    pub fn new<C, F, X>(config: EngineConfig, handler: PullRequestHandler<C, F, X>) -> Self
    where
        C: ConfigProvider,
        F: SnapshotFetcher,
        X: ActionExecutor,
    {
        let handler = Arc::new(handler);
        let worker = task_fn(move |task: PullRequestTask| {
            let handler = Arc::clone(&handler);
            async move {
                let result = handler.handle(&task.pr).await;
                let rescheduled = result.as_ref().is_ok_and(|e| e.rescheduled());
                // The wait queue stops listening only if it was torn down.
                let _ = task.reply.send(rescheduled).await;
                result.map(|_| ())
            }
        });
        let on_error: ErrorFn<RepoId, HandleError> = Arc::new(report_task_error);

        Engine {
            inner: Arc::new(EngineInner {
                scheduler: Arc::new(TaskScheduler::new(config.concurrency, worker, on_error)),
                config,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queues an evaluation of `pr`.
    ///
    /// A pending backoff for the same pull request is cut short, so a fresh
    /// trigger is never delayed by an earlier reschedule.
    pub fn queue(&self, pr: PullRequestRef) {
        let mut queues = self.inner.lock();
        let wait_queue = queues
            .entry(pr.repo.clone())
            .or_insert_with(|| self.inner.new_wait_queue(&pr.repo));

        wait_queue.stop_waiting_for(&pr.number);
        let queued = wait_queue.queue(pr.number);
        debug!(%pr, queued, "Triggered");
    }

    /// Snapshots every repository queue, ordered by repository.
    pub fn queues(&self) -> Vec<QueueSnapshot> {
        let queues: Vec<(RepoId, WaitQueue<PrNumber>)> = self
            .inner
            .lock()
            .iter()
            .map(|(repo, queue)| (repo.clone(), queue.clone()))
            .collect();

        let mut snapshots: Vec<_> = queues
            .into_iter()
            .map(|(repo, queue)| self.inner.snapshot(repo, &queue))
            .collect();
        snapshots.sort_by(|a, b| a.repo.cmp(&b.repo));
        snapshots
    }

    /// Snapshots the queue of one repository, if it has one.
    pub fn queue_for(&self, repo: &RepoId) -> Option<QueueSnapshot> {
        let queue = self.inner.lock().get(repo).cloned()?;
        Some(self.inner.snapshot(repo.clone(), &queue))
    }

    /// Discards work waiting in the task scheduler. Running evaluations finish.
    pub fn stop(&self) {
        self.inner.scheduler.stop();
    }
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<RepoId, WaitQueue<PrNumber>>> {
        // Critical sections never panic, so a poisoned lock still holds valid state.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self, repo: RepoId, queue: &WaitQueue<PrNumber>) -> QueueSnapshot {
        QueueSnapshot {
            current: queue.current_task().map(TaskView::from),
            queued: queue.queued_tasks().into_iter().map(TaskView::from).collect(),
            retrying: queue.retrying().into_iter().map(TaskView::from).collect(),
            scheduled: self.scheduler.has_queued(&repo),
            repo,
        }
    }

    fn new_wait_queue(self: &Arc<Self>, repo: &RepoId) -> WaitQueue<PrNumber> {
        trace!(%repo, "Creating wait queue");
        let scheduler = Arc::clone(&self.scheduler);
        let reschedule_delay = self.config.reschedule_delay;
        let worker_repo = repo.clone();
        let worker = work_fn(move |number: PrNumber| {
            let scheduler = Arc::clone(&scheduler);
            let pr = PullRequestRef::new(worker_repo.clone(), number);
            async move {
                let (reply, mut outcome) = mpsc::channel(1);
                scheduler.queue(pr.repo.clone(), PullRequestTask { pr, reply });
                match outcome.recv().await {
                    Some(true) => WorkOutcome::Retry(reschedule_delay),
                    // Finished, failed, or discarded by stop().
                    Some(false) | None => WorkOutcome::Done,
                }
            }
        });

        let engine: Weak<EngineInner> = Arc::downgrade(self);
        let drained_repo = repo.clone();
        let on_drain: DrainFn = Arc::new(move || {
            if let Some(engine) = engine.upgrade() {
                engine.remove_if_idle(&drained_repo);
            }
        });

        WaitQueue::with_drain_callback(worker, on_drain)
    }

    fn remove_if_idle(&self, repo: &RepoId) {
        let mut queues = self.lock();
        if queues.get(repo).is_some_and(WaitQueue::is_idle) {
            queues.remove(repo);
            trace!(%repo, "Removed drained wait queue");
        }
    }
}
