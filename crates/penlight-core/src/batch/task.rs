//! Named task thunks submitted to a batch.

use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;

use super::BatchError;

/// Future returned by a task thunk.
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// Zero-argument thunk producing a task future. Called once, after a permit is held.
pub type TaskFn<T> = Box<dyn FnOnce() -> TaskFuture<T> + Send>;

/// Tasks keyed by unique name, kept in insertion order.
///
/// Insertion order is the order tasks queue for permits.
pub struct TaskSet<T> {
    tasks: IndexMap<String, TaskFn<T>>,
}

impl<T: Send + 'static> TaskSet<T> {
    pub fn new() -> Self {
        Self {
            tasks: IndexMap::new(),
        }
    }

    /// Add a task. Fails if `name` is already present.
    pub fn add<F, Fut>(&mut self, name: impl Into<String>, task: F) -> Result<(), BatchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(BatchError::DuplicateTask(name));
        }

        let thunk: TaskFn<T> = Box::new(move || -> TaskFuture<T> { Box::pin(task()) });
        self.tasks.insert(name, thunk);
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with<F, Fut>(mut self, name: impl Into<String>, task: F) -> Result<Self, BatchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.add(name, task)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub(crate) fn into_tasks(self) -> impl Iterator<Item = (String, TaskFn<T>)> {
        self.tasks.into_iter()
    }
}

impl<T: Send + 'static> Default for TaskSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TaskSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSet")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}
