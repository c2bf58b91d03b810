//! Bounded-concurrency batch execution.
//!
//! A batch is a set of named, independent async tasks. The runner admits at
//! most `max_concurrency` of them at once through a [`PermitPool`](crate::permit::PermitPool),
//! records every task's value or failure with its timing, and returns only
//! after all tasks have finished. A failing or panicking task never affects
//! its siblings.

mod outcome;
mod runner;
mod task;

pub use outcome::{BatchId, BatchResult, TaskFailure, TaskOutcome};
pub use runner::BoundedConcurrencyRunner;
pub use task::{TaskFn, TaskFuture, TaskSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("Invalid concurrency limit {0}: must be at least 1")]
    InvalidConcurrencyLimit(usize),
    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),
}
