//! Bounded worker pool for bulk operations.
//!
//! A command creates one [`WorkerPool`], submits a [`Task`] per matched
//! resource while it lists, then calls [`WorkerPool::wait`]. At most `jobs`
//! tasks run at once. Each task runs exactly once unless cancellation stops
//! it first. A failing task is logged and counted; it never stops the pool
//! and is never retried.

use crate::cancel::Cancellation;
use crate::constants::DEFAULT_QUEUE_CAPACITY;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A unit of work with a human-readable description.
pub struct Task {
    description: String,
    future: BoxFuture<'static, anyhow::Result<()>>,
}

impl Task {
    pub fn new<F>(description: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Task {
            description: description.into(),
            future: Box::pin(future),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.future.await
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
#[error("worker pool stopped; task {0:?} was not queued")]
pub struct PoolClosed(pub String);

/// Outcome counts reported by [`WorkerPool::wait`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks interrupted or never started because of cancellation.
    pub cancelled: usize,
}

impl PoolSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

#[derive(Default)]
struct Counters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Starts `jobs` workers (at least one) over a queue of the default capacity.
    pub fn new(jobs: usize, cancellation: &Cancellation) -> Self {
        Self::with_capacity(jobs, DEFAULT_QUEUE_CAPACITY, cancellation)
    }

    pub fn with_capacity(jobs: usize, capacity: usize, cancellation: &Cancellation) -> Self {
        let jobs = jobs.max(1);
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..jobs)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    receiver.clone(),
                    cancellation.clone(),
                    counters.clone(),
                ))
            })
            .collect();
        debug!(jobs, capacity, "started worker pool");

        WorkerPool {
            sender,
            workers,
            counters,
        }
    }

    pub fn jobs(&self) -> usize {
        self.workers.len()
    }

    /// Queues a task, waiting while the queue is full.
    ///
    /// Fails only once every worker has stopped because of cancellation.
    pub async fn submit(&self, task: Task) -> Result<(), PoolClosed> {
        self.sender
            .send(task)
            .await
            .map_err(|mpsc::error::SendError(task)| PoolClosed(task.description))
    }

    /// Closes the queue and waits for every worker to finish.
    pub async fn wait(self) -> PoolSummary {
        let WorkerPool {
            sender,
            workers,
            counters,
        } = self;
        drop(sender);
        for handle in workers {
            if let Err(err) = handle.await {
                error!("worker exited abnormally: {err}");
            }
        }
        PoolSummary {
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            cancelled: counters.cancelled.load(Ordering::SeqCst),
        }
    }
}

async fn worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    cancellation: Cancellation,
    counters: Arc<Counters>,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            cancellation.run(receiver.recv()).await
        };
        let task = match next {
            Some(Some(task)) => task,
            // Queue closed and drained.
            Some(None) => break,
            None => break,
        };
        if cancellation.is_cancelled() {
            counters.cancelled.fetch_add(1, Ordering::SeqCst);
            break;
        }

        let description = task.description.clone();
        debug!(worker = id, task = %description, "running");
        match cancellation.run(task.run()).await {
            Some(Ok(())) => {
                counters.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Some(Err(err)) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(task = %description, "{err:#}");
            }
            None => {
                counters.cancelled.fetch_add(1, Ordering::SeqCst);
                warn!(task = %description, "cancelled");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn run_counted(jobs: usize, n: usize) -> (Vec<usize>, PoolSummary) {
        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect());
        let pool = WorkerPool::new(jobs, &Cancellation::new());
        for i in 0..n {
            let runs = runs.clone();
            pool.submit(Task::new(format!("task {i}"), async move {
                runs[i].fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .await
            .unwrap();
        }
        let summary = pool.wait().await;
        let counts = runs.iter().map(|c| c.load(Ordering::SeqCst)).collect();
        (counts, summary)
    }

    #[tokio::test]
    async fn test_every_task_runs_exactly_once() {
        for jobs in [1, 4, 64] {
            let (counts, summary) = run_counted(jobs, 200).await;
            assert!(counts.iter().all(|c| *c == 1), "jobs={jobs}");
            assert_eq!(summary.succeeded, 200);
            assert_eq!(summary.total(), 200);
        }
    }

    #[tokio::test]
    async fn test_zero_jobs_is_clamped() {
        let pool = WorkerPool::new(0, &Cancellation::new());
        assert_eq!(pool.jobs(), 1);
        assert_eq!(pool.wait().await, PoolSummary::default());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::with_capacity(3, 2, &Cancellation::new());
        for i in 0..20 {
            let current = current.clone();
            let peak = peak.clone();
            pool.submit(Task::new(format!("sleep {i}"), async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }))
            .await
            .unwrap();
        }
        pool.wait().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pool() {
        let pool = WorkerPool::new(2, &Cancellation::new());
        for i in 0..10 {
            pool.submit(Task::new(format!("task {i}"), async move {
                if i % 3 == 0 {
                    anyhow::bail!("task {i} failed");
                }
                Ok(())
            }))
            .await
            .unwrap();
        }
        let summary = pool.wait().await;
        assert_eq!(summary.failed, 4);
        assert_eq!(summary.succeeded, 6);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_tasks() {
        let cancellation = Cancellation::new();
        let started = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(1, &cancellation);
        for i in 0..5 {
            let started = started.clone();
            let cancellation = cancellation.clone();
            // Submitting may fail once the lone worker has stopped.
            let _ = pool
                .submit(Task::new(format!("task {i}"), async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    cancellation.cancel();
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }))
                .await;
        }
        let summary = tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.cancelled, 1);
    }

    #[test]
    fn test_task_display() {
        let task = Task::new("label projects/p/locations/global/apis/a", async { Ok(()) });
        assert_eq!(task.to_string(), "label projects/p/locations/global/apis/a");
        assert_eq!(task.description(), task.to_string());
    }
}
