//! Per-task outcomes and the aggregate batch result.

use std::time::Duration;

use indexmap::IndexMap;

use crate::permit::{PermitError, SlotId};

/// Identifier of one `run_all` invocation, for correlating log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct BatchId(uuid::Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a task produced no value.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    #[error("Task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task never ran: {0}")]
    Unscheduled(#[from] PermitError),
}

/// Result of one task.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub name: String,
    pub result: Result<T, TaskFailure>,
    /// Wall-clock time from permit acquisition to completion.
    pub elapsed: Duration,
    /// Time spent waiting for a permit.
    pub queued: Duration,
    /// Permit slot the task ran on; `None` if it never got one.
    pub slot: Option<SlotId>,
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, TaskFailure> {
        self.result
    }

    /// Post-process a successful value, keeping name and timing.
    ///
    /// An error from `f` turns the outcome into `TaskFailure::Failed`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> anyhow::Result<U>) -> TaskOutcome<U> {
        let result = match self.result {
            Ok(value) => f(value).map_err(TaskFailure::Failed),
            Err(e) => Err(e),
        };

        TaskOutcome {
            name: self.name,
            result,
            elapsed: self.elapsed,
            queued: self.queued,
            slot: self.slot,
        }
    }

    pub(crate) fn missing(name: impl Into<String>) -> Self {
        let name = name.into();
        let error = anyhow::anyhow!("no outcome recorded for task '{name}'");
        Self {
            name,
            result: Err(TaskFailure::Failed(error)),
            elapsed: Duration::ZERO,
            queued: Duration::ZERO,
            slot: None,
        }
    }
}

/// Outcomes of one batch, keyed by task name in submission order.
#[derive(Debug)]
pub struct BatchResult<T> {
    id: BatchId,
    outcomes: IndexMap<String, TaskOutcome<T>>,
    elapsed: Duration,
}

impl<T> BatchResult<T> {
    pub(crate) fn new(
        id: BatchId,
        outcomes: IndexMap<String, TaskOutcome<T>>,
        elapsed: Duration,
    ) -> Self {
        Self {
            id,
            outcomes,
            elapsed,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Wall-clock time for the whole batch.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn get(&self, name: &str) -> Option<&TaskOutcome<T>> {
        self.outcomes.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(TaskOutcome::value)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskOutcome<T>)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TaskOutcome<T>> {
        self.outcomes.values().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome<T>> {
        self.outcomes.values().filter(|o| o.is_failure())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(TaskOutcome::is_success)
    }

    /// Remove one outcome, e.g. to move its value out.
    pub fn take(&mut self, name: &str) -> Option<TaskOutcome<T>> {
        self.outcomes.shift_remove(name)
    }

    pub fn into_outcomes(self) -> IndexMap<String, TaskOutcome<T>> {
        self.outcomes
    }
}
