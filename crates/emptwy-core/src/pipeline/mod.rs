//! ============================================================================
//! Deletion Pipeline - Concurrent Status Deletion with Retry
//! ============================================================================
//! Deletes every status of one timeline page using a fixed pool of workers:
//!
//! ```text
//! fetch_timeline ──> JoinableQueue ──> worker 1..N ──> destroy_status
//!                         ^                 │
//!                         └── re-queue on ──┘ transient failure
//! ```
//!
//! The caller blocks on the queue's join barrier. A failed delete puts the
//! status back before marking the first dequeue done, so the unfinished
//! count never drops while a retry is pending. With the default RetryPolicy a
//! status that never deletes keeps the pipeline running indefinitely.
//! ============================================================================

mod queue;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument, Span};

use crate::executor::StatusApi;
use crate::retry::RetryPolicy;
use crate::types::{EmptwyError, Result, StatusId, TimelineQuery};

pub use queue::JoinableQueue;

pub const DEFAULT_NUM_WORKERS: usize = 5;

/// Pipeline sizing and retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_num_workers() -> usize {
    DEFAULT_NUM_WORKERS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject configurations that could never drain the queue
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(EmptwyError::Validation(
                "num_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A status id in flight, with the number of failed attempts so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionTask {
    pub id: StatusId,
    pub failures: u32,
}

impl DeletionTask {
    pub fn new(id: StatusId) -> Self {
        Self { id, failures: 0 }
    }
}

/// Outcome of a completed pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    /// Ids put on the queue initially
    pub queued: usize,
    /// Ids whose delete succeeded, in completion order
    pub deleted: Vec<StatusId>,
    /// Ids dropped after exhausting a retry cap
    pub abandoned: Vec<StatusId>,
    /// Transient failures seen across all ids
    pub failed_attempts: u64,
}

/// Bounded worker pool draining a JoinableQueue through `destroy_status`.
///
/// `builder` produces a fresh API client; it is called once for the
/// timeline fetch and once per worker.
pub struct DeletionPipeline<F> {
    builder: Arc<F>,
    config: PipelineConfig,
    span: Span,
}

impl<F, A> DeletionPipeline<F>
where
    F: Fn() -> A + Send + Sync + 'static,
    A: StatusApi + 'static,
{
    pub fn new(builder: F, config: PipelineConfig) -> Self {
        Self {
            builder: Arc::new(builder),
            config,
            span: tracing::info_span!("deletion_pipeline"),
        }
    }

    /// Logging context for the pipeline and its workers
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch one timeline page and delete every status on it.
    ///
    /// A fetch failure aborts the run without retry. Returns only once every
    /// fetched id has been deleted (or abandoned under a retry cap).
    pub async fn run(&self, query: &TimelineQuery) -> Result<DeletionReport> {
        self.config.validate()?;

        async move {
            let api = (*self.builder)();
            let statuses = api.fetch_timeline(query).await?;
            let ids: Vec<StatusId> = statuses.into_iter().map(|s| s.id).collect();

            info!(
                "Queueing {} statuses of {} for deletion with {} workers",
                ids.len(),
                query.screen_name,
                self.config.num_workers
            );
            self.drain(ids).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete an explicit list of ids with the same worker pool
    pub async fn delete_ids(&self, ids: Vec<StatusId>) -> Result<DeletionReport> {
        self.config.validate()?;
        self.drain(ids).instrument(self.span.clone()).await
    }

    async fn drain(&self, ids: Vec<StatusId>) -> Result<DeletionReport> {
        let queue = Arc::new(JoinableQueue::with_capacity(ids.len()));
        let report = Arc::new(Mutex::new(DeletionReport {
            queued: ids.len(),
            ..Default::default()
        }));

        for id in ids {
            queue.put(DeletionTask::new(id));
        }

        let mut workers = JoinSet::new();
        for n in 0..self.config.num_workers {
            let worker = Worker {
                queue: Arc::clone(&queue),
                builder: Arc::clone(&self.builder),
                retry: self.config.retry.clone(),
                report: Arc::clone(&report),
            };
            workers.spawn(worker.run().instrument(tracing::debug_span!("worker", n)));
        }

        let outcome = tokio::select! {
            _ = queue.join() => Ok(()),
            Some(joined) = workers.join_next() => Err(match joined {
                Ok(Err(e)) => e,
                Ok(Ok(())) => EmptwyError::Worker("worker exited while tasks were pending".into()),
                Err(e) => EmptwyError::Worker(e.to_string()),
            }),
        };

        // Remaining workers are parked on an empty queue
        workers.abort_all();

        if let Err(e) = outcome {
            error!("Deletion pipeline aborted: {}", e);
            return Err(e);
        }

        let report = report.lock().clone();
        info!(
            deleted = report.deleted.len(),
            abandoned = report.abandoned.len(),
            failed_attempts = report.failed_attempts,
            "Deletion pipeline finished"
        );
        Ok(report)
    }
}

struct Worker<F> {
    queue: Arc<JoinableQueue<DeletionTask>>,
    builder: Arc<F>,
    retry: RetryPolicy,
    report: Arc<Mutex<DeletionReport>>,
}

impl<F, A> Worker<F>
where
    F: Fn() -> A + Send + Sync + 'static,
    A: StatusApi + 'static,
{
    /// Loops until a non-transient error; the pipeline aborts it otherwise
    async fn run(self) -> Result<()> {
        let api = (*self.builder)();

        loop {
            let task = self.queue.get().await;
            let outcome = self.attempt(&api, task).await;
            self.queue.task_done()?;
            outcome?;
        }
    }

    async fn attempt(&self, api: &A, task: DeletionTask) -> Result<()> {
        match api.destroy_status(task.id).await {
            Ok(()) => {
                info!("Deleted tweet {}", task.id);
                self.report.lock().deleted.push(task.id);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                let failures = task.failures + 1;
                self.report.lock().failed_attempts += 1;

                if !self.retry.should_retry(failures) {
                    warn!(
                        "Giving up on tweet {} after {} failed attempts: {}",
                        task.id, failures, e
                    );
                    self.report.lock().abandoned.push(task.id);
                    return Ok(());
                }

                error!("Failed to delete tweet {} ({}), queueing again", task.id, e);
                let delay = self.retry.delay_for(failures);
                if delay.is_zero() {
                    // Let other tasks run between immediate retries
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }

                self.queue.put(DeletionTask {
                    id: task.id,
                    failures,
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
