//! Multi-queue task scheduler.
//!
//! A [`TaskScheduler`] owns one FIFO queue per key and a pool of `K` permits.
//! Each key has at most one *drain unit* at a time: a tokio task that waits for
//! a permit, runs one task, releases the permit and then either re-spawns
//! itself (more tasks queued) or removes the key's entry (queue empty). This
//! serializes tasks within a key while running up to `K` keys in parallel.
//!
//! Worker failures and panics are passed to the error handler tagged with the
//! key. They never stop the key's queue or affect other keys.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::trace;

/// A failed task.
#[derive(Debug, Error)]
pub enum TaskError<E: std::error::Error + 'static> {
    #[error("task failed: {0}")]
    Failed(#[source] E),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// The future returned by a [`TaskFn`].
pub type BoxedTask<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;

/// Boxed async worker invoked for each task.
pub type TaskFn<T, E> = Arc<dyn Fn(T) -> BoxedTask<E> + Send + Sync>;

/// Receives failed tasks with the key of their queue.
pub type ErrorFn<K, E> = Arc<dyn Fn(&K, TaskError<E>) + Send + Sync>;

/// Boxes an async closure into a [`TaskFn`].
pub fn task_fn<T, E, F, Fut>(f: F) -> TaskFn<T, E>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: 'static,
{
    Arc::new(move |task| -> BoxedTask<E> { Box::pin(f(task)) })
}

struct Entry<T> {
    generation: u64,
    tasks: VecDeque<T>,
}

struct Queues<K, T> {
    entries: HashMap<K, Entry<T>>,
    next_generation: u64,
}

struct Shared<K, T, E: std::error::Error + 'static> {
    queues: Mutex<Queues<K, T>>,
    permits: Arc<Semaphore>,
    worker: TaskFn<T, E>,
    on_error: ErrorFn<K, E>,
}

/// Runs tasks FIFO per key with bounded concurrency across keys.
pub struct TaskScheduler<K, T, E: std::error::Error + 'static> {
    shared: Arc<Shared<K, T, E>>,
}

impl<K, T, E: std::error::Error + 'static> fmt::Debug for TaskScheduler<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("available_permits", &self.shared.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl<K, T, E> TaskScheduler<K, T, E>
where
    K: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Creates a scheduler running at most `concurrency` tasks at once.
    ///
    /// A concurrency of zero is raised to one.
    pub fn new(concurrency: usize, worker: TaskFn<T, E>, on_error: ErrorFn<K, E>) -> Self {
        TaskScheduler {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues {
                    entries: HashMap::new(),
                    next_generation: 0,
                }),
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                worker,
                on_error,
            }),
        }
    }

    /// Appends `task` to the queue of `key`, starting a drain unit if the key
    /// had no queue.
    pub fn queue(&self, key: K, task: T) {
        let generation = {
            let mut queues = self.shared.lock();
            if let Some(entry) = queues.entries.get_mut(&key) {
                entry.tasks.push_back(task);
                return;
            }
            let generation = queues.next_generation;
            queues.next_generation += 1;
            queues.entries.insert(
                key.clone(),
                Entry {
                    generation,
                    tasks: VecDeque::from([task]),
                },
            );
            generation
        };
        trace!(%key, "Starting drain");
        self.shared.spawn_drain(key, generation);
    }

    /// Returns true while `key` has a queue (tasks pending or one running).
    pub fn has_queued(&self, key: &K) -> bool {
        self.shared.lock().entries.contains_key(key)
    }

    /// Keys that currently have a queue.
    pub fn queue_keys(&self) -> Vec<K> {
        self.shared.lock().entries.keys().cloned().collect()
    }

    /// Number of tasks waiting in the queue of `key`, not counting a running task.
    pub fn queued_len(&self, key: &K) -> usize {
        self.shared
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.tasks.len())
    }

    /// Discards every queued task. Tasks already running are not cancelled.
    pub fn stop(&self) {
        self.shared.lock().entries.clear();
    }
}

impl<K, T, E> TaskScheduler<K, T, E>
where
    K: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static,
    T: Clone + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Tasks waiting in the queue of `key`, head first.
    pub fn get_queue(&self, key: &K) -> Vec<T> {
        self.shared
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.tasks.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<K, T, E> Shared<K, T, E>
where
    K: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Queues<K, T>> {
        // Critical sections never panic, so a poisoned lock still holds valid state.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_drain(self: &Arc<Self>, key: K, generation: u64) {
        tokio::spawn(Arc::clone(self).drain(key, generation));
    }

    async fn drain(self: Arc<Self>, key: K, generation: u64) {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return;
        };

        let task = {
            let mut queues = self.lock();
            match queues.entries.get_mut(&key) {
                Some(entry) if entry.generation == generation => entry.tasks.pop_front(),
                // Discarded by stop(), possibly re-created since.
                _ => None,
            }
        };
        let Some(task) = task else {
            return;
        };

        let worker = Arc::clone(&self.worker);
        let result = tokio::spawn(async move { worker(task).await }).await;
        drop(permit);

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => (self.on_error)(&key, TaskError::Failed(e)),
            Err(e) => (self.on_error)(&key, TaskError::Panicked(e.to_string())),
        }

        let more = {
            let mut queues = self.lock();
            match queues.entries.get(&key) {
                Some(entry) if entry.generation == generation => {
                    if entry.tasks.is_empty() {
                        queues.entries.remove(&key);
                        trace!(%key, "Queue drained");
                        false
                    } else {
                        true
                    }
                }
                _ => false,
            }
        };
        if more {
            self.spawn_drain(key, generation);
        }
    }
}
