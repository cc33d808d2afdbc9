//! # pool: bounded-concurrency transfer engine
//!
//! A producer feeds tasks into a bounded submission queue, a fixed number of
//! workers pull from it, and every attempt posts exactly one [`TaskOutcome`]
//! to a bounded completion queue. The caller reads exactly as many outcomes
//! as it submitted, which is the join.
//!
//! ```text
//!   tasks ──▶ [submission queue] ──▶ worker 0..W ──▶ [completion queue] ──▶ report
//! ```
//!
//! A panic inside one task is caught and reported as [`TaskOutcome::Failed`];
//! the worker keeps pulling and the join count stays exact.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::SyncError;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Result of attempting one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Transferred,
    Skipped,
    Failed(String),
}

impl TaskOutcome {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        TaskOutcome::Failed(err.to_string())
    }
}

/// Tally of one [`TransferPool::run`]. Outcomes are in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub completed: usize,
    pub transferred: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<TaskOutcome>,
}

impl PoolReport {
    fn record(&mut self, outcome: TaskOutcome) {
        self.completed += 1;
        match &outcome {
            TaskOutcome::Transferred => self.transferred += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone)]
pub struct TransferPool {
    workers: usize,
    queue_capacity: usize,
}

impl TransferPool {
    pub fn new(workers: usize) -> Self {
        TransferPool {
            workers: workers.max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Attempts every task exactly once and returns when all have settled.
    ///
    /// Never fails: task errors and panics come back as outcomes.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<T>, handler: F) -> PoolReport
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        let total = tasks.len();
        let mut report = PoolReport::default();
        if total == 0 {
            return report;
        }

        let (submit_tx, submit_rx) = mpsc::channel::<T>(self.queue_capacity);
        let (done_tx, mut done_rx) = mpsc::channel::<TaskOutcome>(self.queue_capacity);
        let submit_rx = Arc::new(Mutex::new(submit_rx));
        let handler = Arc::new(handler);

        for worker_id in 0..self.workers.min(total) {
            let submit_rx = Arc::clone(&submit_rx);
            let done_tx = done_tx.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let next = submit_rx.lock().await.recv().await;
                    let Some(task) = next else {
                        break;
                    };
                    let attempt = AssertUnwindSafe(async { handler(task).await }).catch_unwind();
                    let outcome = match attempt.await {
                        Ok(outcome) => outcome,
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!(worker_id, panic = %message, "Transfer task panicked");
                            TaskOutcome::failed(SyncError::TaskPanicked(message))
                        }
                    };
                    if done_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Transfer worker finished");
            });
        }
        drop(done_tx);

        // The producer runs on its own task so a full submission queue never
        // blocks the collector below.
        tokio::spawn(async move {
            for task in tasks {
                if submit_tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        for _ in 0..total {
            match done_rx.recv().await {
                Some(outcome) => report.record(outcome),
                None => break,
            }
        }
        if report.completed < total {
            warn!(
                expected = total,
                completed = report.completed,
                "Transfer workers stopped before every task completed"
            );
            for _ in report.completed..total {
                report.record(TaskOutcome::Failed("task was never attempted".into()));
            }
        }
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
