//! Wires the generator, the work queue and the worker pool together.
//!
//! [`Dispatcher::run`] is the single blocking call that represents "the whole
//! job is done": it spawns the workers, feeds the queue from the caller's
//! task, then waits on every worker handle before returning a
//! [`RunSummary`].

use crate::{
    BatchRunner, Error, PipelineConfig, Result,
    generator::generate_batches,
    queue::work_queue,
    worker::{WorkerExit, WorkerReport, run_worker},
};
use core::time::Duration;
use std::sync::Arc;
use tokio::{task::JoinHandle, time::Instant};

/// Totals for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches pushed by the generator.
    pub generated: u64,
    /// Batches handed to the runner, whatever the outcome.
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed: Duration,
    /// One report per worker, ordered by worker index.
    pub workers: Vec<WorkerReport>,
}

impl RunSummary {
    fn from_reports(generated: u64, elapsed: Duration, workers: Vec<WorkerReport>) -> Self {
        let succeeded = workers.iter().map(|w| w.succeeded).sum();
        let failed = workers.iter().map(|w| w.failed).sum();
        Self {
            generated,
            attempted: succeeded + failed,
            succeeded,
            failed,
            elapsed,
            workers,
        }
    }

    /// Batches that were generated but never reached a runner.
    ///
    /// Only non-zero if workers idled out while batches were still queued.
    pub const fn unattempted(&self) -> u64 {
        self.generated.saturating_sub(self.attempted)
    }

    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.unattempted() == 0
    }

    /// Workers that stopped on the idle timeout rather than on queue close.
    pub fn idle_exits(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| matches!(w.exit, WorkerExit::IdleTimeout { .. }))
            .count()
    }
}

/// Runs one configured job across a pool of workers.
pub struct Dispatcher<R> {
    config: PipelineConfig,
    runner: Arc<R>,
}

impl<R: BatchRunner> Dispatcher<R> {
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self {
            config,
            runner: Arc::new(runner),
        }
    }

    /// Runs the whole pipeline and waits for every worker to terminate.
    ///
    /// - Spawns `worker_count` workers on the shared queue.
    /// - Generates all batches on the current task, suspending whenever the
    ///   queue is full, then closes the queue.
    /// - Waits until every worker has exited (barrier), then aggregates
    ///   their reports.
    ///
    /// Batch-level failures never fail the run; they are counted in the
    /// returned summary.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A worker task panicked or was cancelled ([`Error::WorkerJoin`]).
    /// - The generator could not push a batch because every worker had
    ///   already stopped ([`Error::QueueClosed`]).
    ///
    /// In both cases the error is only returned after all workers stopped.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(
        start = self.config.starting_index(),
        total = self.config.total_count(),
        batch_size = self.config.batch_size(),
        workers = self.config.worker_count(),
    )))]
    pub async fn run(self) -> Result<RunSummary> {
        let started = Instant::now();
        let config = &self.config;
        let (tx, rx) = work_queue(config.queue_capacity());

        let handles: Vec<JoinHandle<WorkerReport>> = (0..config.worker_count())
            .map(|worker_index| {
                let fut = run_worker(
                    worker_index,
                    rx.clone(),
                    Arc::clone(&self.runner),
                    config.idle_timeout(),
                    config.batch_timeout(),
                );
                #[cfg(feature = "tracing")]
                let fut = {
                    use tracing::Instrument;
                    fut.instrument(tracing::info_span!("worker", index = worker_index))
                };
                tokio::spawn(fut)
            })
            .collect();
        // Workers hold the only receivers now, so a push fails once all of
        // them have exited.
        drop(rx);

        #[cfg(feature = "tracing")]
        tracing::info!("All {} workers online", handles.len());

        let generated = generate_batches(
            config.starting_index(),
            config.batch_size(),
            config.total_count(),
            &tx,
        )
        .await;
        drop(tx);

        let workers = join_workers(handles).await?;
        let generated = generated?;

        let summary = RunSummary::from_reports(generated, started.elapsed(), workers);

        #[cfg(feature = "tracing")]
        tracing::info!(
            "It is all finished: {} batches, {} succeeded, {} failed in {:?}",
            summary.generated,
            summary.succeeded,
            summary.failed,
            summary.elapsed
        );

        Ok(summary)
    }
}

/// Waits for every worker handle, in index order.
async fn join_workers(handles: Vec<JoinHandle<WorkerReport>>) -> Result<Vec<WorkerReport>> {
    futures::future::join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(worker_index, joined)| {
            joined.map_err(|e| Error::WorkerJoin {
                worker_index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Runs `config` with `runner` and blocks until the pool has fully stopped.
///
/// Shorthand for `Dispatcher::new(config, runner).run()`.
pub async fn start<R: BatchRunner>(config: PipelineConfig, runner: R) -> Result<RunSummary> {
    Dispatcher::new(config, runner).run().await
}
