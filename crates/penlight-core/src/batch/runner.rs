//! Runs a [`TaskSet`] under a concurrency ceiling.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use indexmap::IndexMap;

use super::outcome::{BatchId, BatchResult, TaskFailure, TaskOutcome};
use super::task::{TaskFn, TaskSet};
use super::BatchError;
use crate::config::BatchConfig;
use crate::permit::PermitPool;

/// Executes batches of independent tasks, at most `max_concurrency` at a time.
///
/// All tasks of a batch are driven on the caller's task and interleave at
/// their await points. Tasks wait for permits in submission order. There is
/// no cancellation: a task that never completes holds its permit forever, so
/// thunks that talk to remote systems should carry their own timeouts.
pub struct BoundedConcurrencyRunner {
    pool: PermitPool,
}

impl BoundedConcurrencyRunner {
    pub fn new(max_concurrency: usize) -> Result<Self, BatchError> {
        let limit = NonZeroUsize::new(max_concurrency)
            .ok_or(BatchError::InvalidConcurrencyLimit(max_concurrency))?;
        Ok(Self::with_limit(limit))
    }

    pub fn with_limit(limit: NonZeroUsize) -> Self {
        Self {
            pool: PermitPool::new(limit),
        }
    }

    pub fn from_config(config: &BatchConfig) -> Result<Self, BatchError> {
        Self::new(config.max_concurrency)
    }

    pub fn max_concurrency(&self) -> usize {
        self.pool.capacity()
    }

    /// Permits not held by a running task.
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    /// Stop admitting tasks.
    ///
    /// Tasks already running finish normally. Tasks still waiting for a
    /// permit, in this or any later batch, are reported as
    /// [`TaskFailure::Unscheduled`].
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Run every task and collect one outcome per task.
    ///
    /// Never fails: task errors and panics are stored in the task's outcome.
    pub async fn run_all<T: Send + 'static>(&self, tasks: TaskSet<T>) -> BatchResult<T> {
        let batch_id = BatchId::new();
        let started = Instant::now();
        let total = tasks.len();

        tracing::info!(
            %batch_id,
            tasks = total,
            max_concurrency = self.max_concurrency(),
            "Batch started"
        );

        let runs = tasks
            .into_tasks()
            .map(|(name, task)| self.run_one(batch_id, name, task));
        let outcomes: IndexMap<String, TaskOutcome<T>> = join_all(runs)
            .await
            .into_iter()
            .map(|outcome| (outcome.name.clone(), outcome))
            .collect();

        let elapsed = started.elapsed();
        let failed = outcomes.values().filter(|o| o.is_failure()).count();
        tracing::info!(
            %batch_id,
            tasks = total,
            failed,
            elapsed_ms = millis(elapsed),
            "Batch finished"
        );

        BatchResult::new(batch_id, outcomes, elapsed)
    }

    async fn run_one<T>(&self, batch_id: BatchId, name: String, task: TaskFn<T>) -> TaskOutcome<T> {
        let queued_at = Instant::now();
        let permit = match self.pool.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!(%batch_id, task = %name, error = %e, "Task could not get a permit");
                return TaskOutcome {
                    name,
                    result: Err(e.into()),
                    elapsed: Duration::ZERO,
                    queued: queued_at.elapsed(),
                    slot: None,
                };
            }
        };

        let queued = queued_at.elapsed();
        let slot = permit.slot_id();
        tracing::debug!(%batch_id, task = %name, %slot, queued_ms = millis(queued), "Task started");

        let started = Instant::now();
        let result = AssertUnwindSafe(async move { task().await })
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();
        drop(permit);

        let result = match result {
            Ok(Ok(value)) => {
                tracing::debug!(%batch_id, task = %name, elapsed_ms = millis(elapsed), "Task succeeded");
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    %batch_id,
                    task = %name,
                    elapsed_ms = millis(elapsed),
                    error = %format!("{e:#}"),
                    "Task failed"
                );
                Err(TaskFailure::Failed(e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    %batch_id,
                    task = %name,
                    elapsed_ms = millis(elapsed),
                    panic = %message,
                    "Task panicked"
                );
                Err(TaskFailure::Panicked(message))
            }
        };

        TaskOutcome {
            name,
            result,
            elapsed,
            queued,
            slot: Some(slot),
        }
    }
}

impl std::fmt::Debug for BoundedConcurrencyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedConcurrencyRunner")
            .field("pool", &self.pool)
            .finish()
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use tokio::sync::oneshot;

    use super::*;
    use crate::permit::PermitError;

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not reached within 5s");
    }

    /// Give every runnable task a chance to make progress.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = BoundedConcurrencyRunner::new(0).unwrap_err();
        assert_eq!(err, BatchError::InvalidConcurrencyLimit(0));
    }

    #[test]
    fn from_config_uses_limit() {
        let runner = BoundedConcurrencyRunner::from_config(&BatchConfig::new(4)).unwrap();
        assert_eq!(runner.max_concurrency(), 4);
        assert_eq!(runner.available(), 4);
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_result() {
        let runner = BoundedConcurrencyRunner::new(3).unwrap();
        let result = runner.run_all(TaskSet::<u32>::new()).await;
        assert!(result.is_empty());
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn sequential_with_single_permit() {
        let runner = BoundedConcurrencyRunner::new(1).unwrap();
        let events = Arc::new(StdMutex::new(Vec::new()));

        let a_events = Arc::clone(&events);
        let b_events = Arc::clone(&events);
        let tasks = TaskSet::new()
            .with("a", move || async move {
                a_events.lock().unwrap().push("a-start");
                tokio::time::sleep(Duration::from_millis(10)).await;
                a_events.lock().unwrap().push("a-end");
                anyhow::Ok(10)
            })
            .and_then(|t| {
                t.with("b", move || async move {
                    b_events.lock().unwrap().push("b-start");
                    anyhow::Ok(20)
                })
            })
            .unwrap();

        let result = runner.run_all(tasks).await;

        assert_eq!(result.value("a"), Some(&10));
        assert_eq!(result.value("b"), Some(&20));
        assert_eq!(*events.lock().unwrap(), vec!["a-start", "a-end", "b-start"]);
        assert_eq!(runner.available(), 1);
    }

    #[tokio::test]
    async fn limit_holds_and_release_admits_one_waiter() {
        let runner = Arc::new(BoundedConcurrencyRunner::new(2).unwrap());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(StdMutex::new(Vec::<String>::new()));
        let mut releases = HashMap::new();

        let mut tasks = TaskSet::new();
        for i in 0..5u32 {
            let name = format!("t{i}");
            let (tx, rx) = oneshot::channel::<()>();
            releases.insert(name.clone(), tx);

            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let started = Arc::clone(&started);
            let task_name = name.clone();
            tasks
                .add(name, move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    started.lock().unwrap().push(task_name);
                    let _ = rx.await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    anyhow::Ok(i)
                })
                .unwrap();
        }

        let handle = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run_all(tasks).await })
        };

        wait_until(|| started.lock().unwrap().len() == 2).await;
        settle().await;
        assert_eq!(*started.lock().unwrap(), vec!["t0", "t1"]);
        assert_eq!(running.load(Ordering::SeqCst), 2);
        assert_eq!(runner.available(), 0);

        releases.remove("t0").unwrap().send(()).unwrap();
        wait_until(|| started.lock().unwrap().len() == 3).await;
        settle().await;
        assert_eq!(*started.lock().unwrap(), vec!["t0", "t1", "t2"]);
        assert_eq!(running.load(Ordering::SeqCst), 2);

        for (_, tx) in releases.drain() {
            let _ = tx.send(());
        }

        let result = handle.await.unwrap();
        assert_eq!(result.len(), 5);
        assert!(result.all_succeeded());
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(runner.available(), 2);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_task() {
        let runner = BoundedConcurrencyRunner::new(2).unwrap();
        let tasks = TaskSet::new()
            .with("ok-1", || async { anyhow::Ok("members") })
            .and_then(|t| {
                t.with("err", || async {
                    Err(anyhow::anyhow!("table not found"))
                })
            })
            .and_then(|t| t.with("ok-2", || async { anyhow::Ok("penlights") }))
            .and_then(|t| {
                t.with("panic", || async {
                    if true {
                        panic!("row decode blew up");
                    }
                    anyhow::Ok("unreachable")
                })
            })
            .unwrap();

        let result = runner.run_all(tasks).await;

        assert_eq!(result.len(), 4);
        assert_eq!(result.value("ok-1"), Some(&"members"));
        assert_eq!(result.value("ok-2"), Some(&"penlights"));

        let err = result.get("err").unwrap();
        assert!(err.is_failure());
        assert!(matches!(err.error(), Some(TaskFailure::Failed(e)) if e.to_string() == "table not found"));

        let panicked = result.get("panic").unwrap();
        assert!(matches!(
            panicked.error(),
            Some(TaskFailure::Panicked(msg)) if msg == "row decode blew up"
        ));

        assert_eq!(result.succeeded().count(), 2);
        assert_eq!(result.failed().count(), 2);
        assert_eq!(runner.available(), 2);
    }

    #[tokio::test]
    async fn outcomes_keep_submission_order() {
        let runner = BoundedConcurrencyRunner::new(3).unwrap();
        let mut tasks = TaskSet::new();
        for (name, delay) in [("slow", 20u64), ("fast", 1), ("medium", 10)] {
            tasks
                .add(name, move || async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    anyhow::Ok(delay)
                })
                .unwrap();
        }

        let result = runner.run_all(tasks).await;
        let names: Vec<&str> = result.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["slow", "fast", "medium"]);
    }

    #[tokio::test]
    async fn records_elapsed_and_queued_time() {
        let runner = BoundedConcurrencyRunner::new(1).unwrap();
        let tasks = TaskSet::new()
            .with("first", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                anyhow::Ok(())
            })
            .and_then(|t| t.with("second", || async { anyhow::Ok(()) }))
            .unwrap();

        let result = runner.run_all(tasks).await;
        let first = result.get("first").unwrap();
        let second = result.get("second").unwrap();

        assert!(first.elapsed >= Duration::from_millis(20));
        assert!(second.queued >= Duration::from_millis(10));
        assert!(result.elapsed() >= first.elapsed);
        // One permit, so both ran on the same slot.
        assert_eq!(first.slot, second.slot);
        assert!(first.slot.is_some());
    }

    #[tokio::test]
    async fn runner_is_reusable_across_batches() {
        let runner = BoundedConcurrencyRunner::new(2).unwrap();
        for round in 0..3u32 {
            let tasks = TaskSet::new()
                .with("x", move || async move { anyhow::Ok(round) })
                .unwrap();
            let result = runner.run_all(tasks).await;
            assert_eq!(result.value("x"), Some(&round));
        }
        assert_eq!(runner.available(), 2);
    }

    #[tokio::test]
    async fn close_leaves_waiting_tasks_unscheduled() {
        let runner = Arc::new(BoundedConcurrencyRunner::new(1).unwrap());
        let started = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first_started = Arc::clone(&started);
        let second_started = Arc::clone(&started);
        let tasks = TaskSet::new()
            .with("running", move || async move {
                first_started.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.await;
                anyhow::Ok(1)
            })
            .and_then(|t| {
                t.with("waiting", move || async move {
                    second_started.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(2)
                })
            })
            .unwrap();

        let handle = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run_all(tasks).await })
        };

        wait_until(|| started.load(Ordering::SeqCst) == 1).await;
        settle().await;
        runner.close();
        release_tx.send(()).unwrap();

        let result = handle.await.unwrap();
        assert_eq!(result.value("running"), Some(&1));

        let waiting = result.get("waiting").unwrap();
        assert!(matches!(
            waiting.error(),
            Some(TaskFailure::Unscheduled(PermitError::Closed))
        ));
        assert!(waiting.slot.is_none());
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Later batches are refused outright.
        assert!(runner.is_closed());
        let later = runner
            .run_all(TaskSet::new().with("late", || async { anyhow::Ok(3) }).unwrap())
            .await;
        assert!(matches!(
            later.get("late").and_then(TaskOutcome::error),
            Some(TaskFailure::Unscheduled(_))
        ));
    }

    #[test]
    fn panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
