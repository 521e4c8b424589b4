//! Scheduling and evaluation of pull requests.
//!
//! Triggers enter through [`Engine::queue`]. Each repository gets a
//! [`WaitQueue`] that deduplicates pending pull requests and holds back
//! rescheduled ones, while a single [`TaskScheduler`] bounds how many
//! evaluations run at once and keeps them in FIFO order per repository.
//!
//! # Module Structure
//!
//! - [`delay`]: cancellable timers
//! - [`wait_queue`]: deduplicating queue with delayed items
//! - [`scheduler`]: bounded-concurrency keyed task scheduler
//! - [`handler`]: evaluation of a single pull request
//! - [`engine`]: wiring of the above
//! - [`config`]: engine settings

pub mod config;
pub mod delay;
pub mod engine;
pub mod handler;
pub mod scheduler;
pub mod wait_queue;


pub use config::EngineConfig;
pub use delay::{Delay, DelayHandle};
pub use engine::{Engine, QueueSnapshot, TaskView};
pub use handler::{Evaluation, HandleError, PullRequestHandler};
pub use scheduler::{TaskError, TaskScheduler};
pub use wait_queue::{QueueItem, WaitQueue, WaitQueueTask, WorkOutcome};
