//! Per-repository wait queue.
//!
//! A [`WaitQueue`] holds the pending work of one repository. Each work item is
//! identified by [`QueueItem::id`] (for pull requests, the PR number) and at
//! most one unstarted `Work` task per identity may be queued at a time.
//!
//! # Tasks
//!
//! Queueing an item with a delay appends a `Wait` task followed by the `Work`
//! task; both share the item's identity and are inserted together. A single
//! runner (a tokio task) pops tasks from the head:
//!
//! - `Wait` sleeps for its delay, unless [`WaitQueue::stop_waiting_for`]
//!   cancels it first.
//! - `Work` removes its identity from the dedup set as it starts and then
//!   awaits the worker. Removing the identity at start (not at enqueue) is what
//!   lets a trigger arriving during execution queue the item once more.
//!
//! The worker returns a [`WorkOutcome`]. `Retry(delay)` schedules the same
//! item to be queued again once the delay elapses; this is the retry record of
//! a pull request whose checks are still pending. Scheduled retries live beside
//! the task list, so a backoff never holds up other items. A retry is cut short
//! by [`WaitQueue::stop_waiting_for`] and superseded by queueing the same item.
//!
//! When the queue empties and no retry is scheduled, the runner stops and the
//! drain callback fires once.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{trace, warn};

use crate::types::PrNumber;

use super::delay::{Delay, DelayHandle};

/// An item that can be queued, deduplicated by its identity.
pub trait QueueItem: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

impl QueueItem for PrNumber {
    type Id = PrNumber;

    fn id(&self) -> PrNumber {
        *self
    }
}

/// What the worker asks the queue to do after processing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Done,
    /// Process the item again after the given delay.
    Retry(Duration),
}

/// A task in a wait queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitQueueTask<T: QueueItem> {
    /// A timing placeholder that precedes the `Work` task with the same id.
    Wait { id: T::Id, delay: Duration },
    /// The actual unit of work.
    Work { id: T::Id, item: T },
}

impl<T: QueueItem> WaitQueueTask<T> {
    pub fn id(&self) -> &T::Id {
        match self {
            WaitQueueTask::Wait { id, .. } | WaitQueueTask::Work { id, .. } => id,
        }
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, WaitQueueTask::Wait { .. })
    }
}

/// The future returned by a [`WorkFn`].
pub type BoxedWork = Pin<Box<dyn Future<Output = WorkOutcome> + Send>>;

/// Boxed async worker invoked for each `Work` task.
pub type WorkFn<T> = Arc<dyn Fn(T) -> BoxedWork + Send + Sync>;

/// Boxes an async closure into a [`WorkFn`].
pub fn work_fn<T, F, Fut>(f: F) -> WorkFn<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkOutcome> + Send + 'static,
{
    Arc::new(move |item| -> BoxedWork { Box::pin(f(item)) })
}

/// Callback fired when the queue drains.
pub type DrainFn = Arc<dyn Fn() + Send + Sync>;

struct Running<T: QueueItem> {
    task: WaitQueueTask<T>,
    delay: Option<DelayHandle>,
}

/// A `Retry` waiting for its delay to elapse.
struct ScheduledRetry<T: QueueItem> {
    item: T,
    delay: Duration,
    handle: DelayHandle,
    seq: u64,
}

struct State<T: QueueItem> {
    tasks: VecDeque<WaitQueueTask<T>>,
    queued: HashSet<T::Id>,
    current: Option<Running<T>>,
    running: bool,
    retries: Vec<ScheduledRetry<T>>,
    next_retry: u64,
}

#[derive(Clone, Copy)]
enum Position {
    Front,
    Back,
}

impl<T: QueueItem> State<T> {
    /// Inserts the `Wait`+`Work` pair. Returns false if the id was already queued.
    fn insert(&mut self, item: T, delay: Duration, position: Position) -> bool {
        let id = item.id();
        if !self.queued.insert(id.clone()) {
            trace!(?id, "Already queued, dropping");
            return false;
        }
        if let Some(index) = self.retry_index(&id) {
            trace!(?id, "Superseding scheduled retry");
            self.retries.remove(index).handle.cancel();
        }

        let wait = (!delay.is_zero()).then(|| WaitQueueTask::Wait {
            id: id.clone(),
            delay,
        });
        let work = WaitQueueTask::Work { id, item };
        match position {
            Position::Back => {
                self.tasks.extend(wait);
                self.tasks.push_back(work);
            }
            Position::Front => {
                self.tasks.push_front(work);
                if let Some(wait) = wait {
                    self.tasks.push_front(wait);
                }
            }
        }
        true
    }

    fn retry_index(&self, id: &T::Id) -> Option<usize> {
        self.retries.iter().position(|r| r.item.id() == *id)
    }

    /// Records a retry of `item` after `delay`.
    ///
    /// Returns the timer to await, or `None` if the item is already queued
    /// again (a trigger arrived while it ran) or was queued without delay.
    fn schedule_retry(&mut self, item: T, delay: Duration) -> Option<(Delay, u64)> {
        if delay.is_zero() {
            self.insert(item, delay, Position::Back);
            return None;
        }
        if self.queued.contains(&item.id()) {
            trace!(id = ?item.id(), "Already queued, dropping retry");
            return None;
        }

        let timer = Delay::new(delay);
        self.next_retry += 1;
        self.retries.push(ScheduledRetry {
            item,
            delay,
            handle: timer.handle(),
            seq: self.next_retry,
        });
        Some((timer, self.next_retry))
    }

    /// Moves the retry at `index` into the task list.
    ///
    /// Returns true if a runner must be started.
    fn release_retry(&mut self, index: usize) -> bool {
        let retry = self.retries.remove(index);
        retry.handle.cancel();
        self.insert(retry.item, Duration::ZERO, Position::Back)
            && !std::mem::replace(&mut self.running, true)
    }
}

struct Shared<T: QueueItem> {
    state: Mutex<State<T>>,
    worker: WorkFn<T>,
    on_drain: Option<DrainFn>,
}

/// A deduplicating, delayable work queue with a single runner.
///
/// Cloning yields another handle to the same queue.
pub struct WaitQueue<T: QueueItem> {
    shared: Arc<Shared<T>>,
}

impl<T: QueueItem> Clone for WaitQueue<T> {
    fn clone(&self) -> Self {
        WaitQueue {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: QueueItem> fmt::Debug for WaitQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("WaitQueue")
            .field("queued", &state.tasks.len())
            .field("retries", &state.retries.len())
            .field("running", &state.running)
            .finish_non_exhaustive()
    }
}

impl<T: QueueItem> WaitQueue<T> {
    pub fn new(worker: WorkFn<T>) -> Self {
        Self::build(worker, None)
    }

    /// Creates a queue that calls `on_drain` each time it becomes idle.
    pub fn with_drain_callback(worker: WorkFn<T>, on_drain: DrainFn) -> Self {
        Self::build(worker, Some(on_drain))
    }

    fn build(worker: WorkFn<T>, on_drain: Option<DrainFn>) -> Self {
        WaitQueue {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    tasks: VecDeque::new(),
                    queued: HashSet::new(),
                    current: None,
                    running: false,
                    retries: Vec::new(),
                    next_retry: 0,
                }),
                worker,
                on_drain,
            }),
        }
    }

    /// Appends `item` after an optional delay. No-op if its id is already queued.
    ///
    /// Returns true if the item was queued.
    pub fn queue_last(&self, item: T, delay: Duration) -> bool {
        self.insert(item, delay, |_| Position::Back)
    }

    /// Inserts `item` at the head. No-op if its id is already queued.
    pub fn queue_first(&self, item: T, delay: Duration) -> bool {
        self.insert(item, delay, |_| Position::Front)
    }

    /// Queues `item` without delay.
    ///
    /// If the running task has the same identity the item goes to the head so
    /// it is processed again right after the current run; otherwise it is
    /// appended.
    pub fn queue(&self, item: T) -> bool {
        let id = item.id();
        self.insert(item, Duration::ZERO, |state| {
            match state.current.as_ref() {
                Some(running) if *running.task.id() == id => Position::Front,
                _ => Position::Back,
            }
        })
    }

    fn insert(
        &self,
        item: T,
        delay: Duration,
        position: impl FnOnce(&State<T>) -> Position,
    ) -> bool {
        let start_runner = {
            let mut state = self.shared.lock();
            let position = position(&state);
            if !state.insert(item, delay, position) {
                return false;
            }
            !std::mem::replace(&mut state.running, true)
        };
        if start_runner {
            self.shared.spawn_runner();
        }
        true
    }

    /// Cuts short the delay of `item`.
    ///
    /// A running `Wait` for the item completes now; a scheduled retry is
    /// queued now. Returns true if either was found.
    pub fn stop_waiting_for(&self, item: &T) -> bool {
        let id = item.id();
        let start_runner = {
            let mut state = self.shared.lock();
            if let Some(Running {
                task: WaitQueueTask::Wait { id: waiting, .. },
                delay: Some(handle),
            }) = state.current.as_ref()
            {
                if *waiting == id {
                    trace!(?id, "Cancelling wait");
                    handle.cancel();
                    return true;
                }
            }

            let Some(index) = state.retry_index(&id) else {
                return false;
            };
            trace!(?id, "Cancelling retry delay");
            state.release_retry(index)
        };
        if start_runner {
            self.shared.spawn_runner();
        }
        true
    }

    /// The task the runner is processing, if any.
    pub fn current_task(&self) -> Option<WaitQueueTask<T>> {
        self.shared
            .lock()
            .current
            .as_ref()
            .map(|running| running.task.clone())
    }

    /// Tasks waiting to run, head first.
    pub fn queued_tasks(&self) -> Vec<WaitQueueTask<T>> {
        self.shared.lock().tasks.iter().cloned().collect()
    }

    /// Scheduled retries as `Wait` tasks, oldest first.
    pub fn retrying(&self) -> Vec<WaitQueueTask<T>> {
        self.shared
            .lock()
            .retries
            .iter()
            .map(|retry| WaitQueueTask::Wait {
                id: retry.item.id(),
                delay: retry.delay,
            })
            .collect()
    }

    /// Returns true if no task is queued, running or scheduled for retry.
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        !state.running && state.tasks.is_empty() && state.retries.is_empty()
    }

    /// Returns true if both handles refer to the same queue.
    pub fn same_queue(&self, other: &WaitQueue<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: QueueItem> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Critical sections never panic, so a poisoned lock still holds valid state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_runner(self: &Arc<Self>) {
        tokio::spawn(Arc::clone(self).run());
    }

    /// Queues a retry whose delay elapsed, unless it was cut short meanwhile.
    fn fire_retry(self: &Arc<Self>, seq: u64) {
        let start_runner = {
            let mut state = self.lock();
            let Some(index) = state.retries.iter().position(|r| r.seq == seq) else {
                return;
            };
            state.release_retry(index)
        };
        if start_runner {
            self.spawn_runner();
        }
    }

    async fn run(self: Arc<Self>) {
        let drained = loop {
            let (task, delay) = {
                let mut state = self.lock();
                let Some(task) = state.tasks.pop_front() else {
                    state.current = None;
                    state.running = false;
                    break state.retries.is_empty();
                };
                let delay = match &task {
                    WaitQueueTask::Wait { delay, .. } => Some(Delay::new(*delay)),
                    WaitQueueTask::Work { id, .. } => {
                        state.queued.remove(id);
                        None
                    }
                };
                state.current = Some(Running {
                    task: task.clone(),
                    delay: delay.as_ref().map(Delay::handle),
                });
                (task, delay)
            };

            let retry = match (task, delay) {
                (WaitQueueTask::Wait { .. }, Some(delay)) => {
                    delay.wait().await;
                    None
                }
                (WaitQueueTask::Work { id, item }, _) => {
                    let work = (self.worker)(item.clone());
                    match tokio::spawn(work).await {
                        Ok(WorkOutcome::Done) => None,
                        Ok(WorkOutcome::Retry(delay)) => Some((item, delay)),
                        Err(e) => {
                            warn!(?id, error = %e, "Worker panicked");
                            None
                        }
                    }
                }
                (WaitQueueTask::Wait { .. }, None) => None,
            };

            let mut state = self.lock();
            state.current = None;
            if let Some((item, delay)) = retry {
                trace!(id = ?item.id(), ?delay, "Scheduling retry");
                if let Some((timer, seq)) = state.schedule_retry(item, delay) {
                    let shared = Arc::clone(&self);
                    tokio::spawn(async move {
                        if !timer.wait().await {
                            shared.fire_retry(seq);
                        }
                    });
                }
            }
        };

        if drained {
            if let Some(on_drain) = &self.on_drain {
                on_drain();
            }
        }
    }
}
