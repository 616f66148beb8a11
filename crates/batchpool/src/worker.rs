use crate::{
    Batch, BatchRunner, Error,
    queue::{BatchReceiver, Dequeue},
};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{Instant, timeout};

/// Lifecycle of a single worker.
///
/// `Waiting -> Running -> Waiting` repeats once per batch. A worker leaves
/// `Waiting` for `Terminated` when the queue is closed and drained, or when
/// nothing arrives within the idle timeout. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Waiting,
    Running,
    Terminated,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The generator closed the queue and it was fully drained.
    QueueClosed,
    /// No batch arrived for `idle_for` while the queue was still open.
    IdleTimeout { idle_for: Duration },
}

/// Result of running one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded,
    /// The runner ran and reported failure.
    Failed,
    /// The runner could not be invoked, or exceeded the per-batch timeout
    /// ([`Error::BatchTimeout`]) and was dropped.
    Errored(Error),
}

impl BatchOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What a worker did before it terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_index: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub exit: WorkerExit,
}

impl WorkerReport {
    pub const fn attempted(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Per-worker bookkeeping. Never shared across tasks.
struct Worker {
    worker_index: usize,
    idle_since: Instant,
    state: WorkerState,
    succeeded: u64,
    failed: u64,
}

impl Worker {
    fn new(worker_index: usize) -> Self {
        Self {
            worker_index,
            idle_since: Instant::now(),
            state: WorkerState::Waiting,
            succeeded: 0,
            failed: 0,
        }
    }

    fn start(&mut self) {
        self.state = WorkerState::Running;
    }

    fn finish(&mut self, outcome: &BatchOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.state = WorkerState::Waiting;
        self.idle_since = Instant::now();
    }

    fn terminate(mut self, exit: WorkerExit) -> WorkerReport {
        debug_assert!(matches!(self.state, WorkerState::Waiting));
        self.state = WorkerState::Terminated;
        WorkerReport {
            worker_index: self.worker_index,
            succeeded: self.succeeded,
            failed: self.failed,
            exit,
        }
    }
}

/// Pulls batches from `rx` and runs them until the worker terminates.
///
/// Designed to be spawned as a Tokio task, one per worker. A batch in
/// progress is never interrupted by the idle timeout; the idle window only
/// starts counting once the worker is back in `Waiting`.
///
/// # Arguments
///
/// - `worker_index`: Identifier used in logs and passed to the runner.
/// - `rx`: This worker's handle on the shared work queue.
/// - `runner`: Performs the work for each batch.
/// - `idle_timeout`: How long to wait on an open, empty queue before exiting.
/// - `batch_timeout`: Optional bound on a single runner invocation.
///
/// # Failures
///
/// A failed, errored or timed-out batch is logged with the worker index and
/// batch start, then dropped. It is not retried or requeued and the worker
/// keeps going.
pub async fn run_worker<R: BatchRunner>(
    worker_index: usize,
    rx: BatchReceiver,
    runner: Arc<R>,
    idle_timeout: Duration,
    batch_timeout: Option<Duration>,
) -> WorkerReport {
    #[cfg(feature = "tracing")]
    tracing::info!("Worker {worker_index} online");

    let mut worker = Worker::new(worker_index);

    let exit = loop {
        match rx.pop(idle_timeout).await {
            Dequeue::Batch(batch) => {
                worker.start();

                #[cfg(feature = "tracing")]
                tracing::info!("[{worker_index}] Starting batch ({batch})");

                let outcome = execute(&*runner, worker_index, batch, batch_timeout).await;
                log_outcome(worker_index, batch, &outcome);
                worker.finish(&outcome);
            }
            Dequeue::Closed => break WorkerExit::QueueClosed,
            Dequeue::Idle => {
                break WorkerExit::IdleTimeout {
                    idle_for: worker.idle_since.elapsed(),
                };
            }
        }
    };

    #[cfg(feature = "tracing")]
    match exit {
        WorkerExit::QueueClosed => {
            tracing::info!("({worker_index}) FINISH: queue closed and drained");
        }
        WorkerExit::IdleTimeout { idle_for } => {
            tracing::info!("({worker_index}) FINISH: no work for {idle_for:?}, stopping");
        }
    }

    worker.terminate(exit)
}

async fn execute<R: BatchRunner>(
    runner: &R,
    worker_index: usize,
    batch: Batch,
    batch_timeout: Option<Duration>,
) -> BatchOutcome {
    let run = runner.run_batch(worker_index, batch);
    let result = match batch_timeout {
        Some(limit) => match timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => {
                return BatchOutcome::Errored(Error::BatchTimeout {
                    worker_index,
                    start_index: batch.start_index(),
                    timeout: limit,
                });
            }
        },
        None => run.await,
    };

    match result {
        Ok(true) => BatchOutcome::Succeeded,
        Ok(false) => BatchOutcome::Failed,
        Err(e) => BatchOutcome::Errored(e),
    }
}

#[allow(clippy::used_underscore_binding)]
fn log_outcome(_worker_index: usize, _batch: Batch, _outcome: &BatchOutcome) {
    #[cfg(feature = "tracing")]
    match _outcome {
        BatchOutcome::Succeeded => {
            tracing::info!("[{_worker_index}] Finished batch ({})", _batch.start_index());
        }
        BatchOutcome::Failed => {
            tracing::warn!("[{_worker_index}] Failed at batch ({})", _batch.start_index());
        }
        BatchOutcome::Errored(e @ Error::BatchTimeout { .. }) => {
            tracing::warn!("[{_worker_index}] Failed at batch ({}): {e}", _batch.start_index());
        }
        BatchOutcome::Errored(e) => {
            tracing::error!("[{_worker_index}] Failed at batch ({}): {e}", _batch.start_index());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnRunner, Result, queue::work_queue};
    use tokio::sync::Mutex;

    const IDLE: Duration = Duration::from_secs(10);

    fn recording_runner(
        seen: Arc<Mutex<Vec<(usize, Batch)>>>,
        ok: bool,
    ) -> Arc<impl BatchRunner> {
        Arc::new(FnRunner::new(move |worker_index: usize, batch: Batch| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().await.push((worker_index, batch));
                Ok::<_, Error>(ok)
            }
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn drains_queue_then_stops_on_close() {
        let (tx, rx) = work_queue(4);
        for batch in [Batch::new(0, 5), Batch::new(5, 5), Batch::new(10, 2)] {
            tx.push(batch).await.unwrap();
        }
        tx.close();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let report = run_worker(7, rx, recording_runner(seen.clone(), true), IDLE, None).await;

        assert_eq!(report.worker_index, 7);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.exit, WorkerExit::QueueClosed);
        let starts: Vec<_> = seen.lock().await.iter().map(|(_, b)| b.start_index()).collect();
        assert_eq!(starts, vec![0, 5, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn terminates_after_idle_timeout_on_open_queue() {
        let (tx, rx) = work_queue(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let report = run_worker(
            0,
            rx.clone(),
            recording_runner(seen.clone(), true),
            IDLE,
            None,
        )
        .await;

        assert!(started.elapsed() >= IDLE);
        assert!(matches!(
            report.exit,
            WorkerExit::IdleTimeout { idle_for } if idle_for >= IDLE
        ));
        assert_eq!(report.attempted(), 0);

        // A terminated worker never picks up later work.
        tx.push(Batch::new(0, 1)).await.unwrap();
        tokio::time::sleep(IDLE).await;
        assert!(seen.lock().await.is_empty());
        assert_eq!(rx.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_window_restarts_after_each_batch() {
        let (tx, rx) = work_queue(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(run_worker(
            0,
            rx,
            recording_runner(seen.clone(), true),
            IDLE,
            None,
        ));

        // Each batch arrives just inside the idle window.
        for i in 0..3 {
            tokio::time::sleep(IDLE - Duration::from_secs(1)).await;
            tx.push(Batch::new(i, 1)).await.unwrap();
        }

        let report = handle.await.unwrap();
        assert_eq!(report.succeeded, 3);
        assert!(matches!(report.exit, WorkerExit::IdleTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_and_not_retried() {
        let (tx, rx) = work_queue(4);
        for batch in [Batch::new(0, 1), Batch::new(1, 1)] {
            tx.push(batch).await.unwrap();
        }
        tx.close();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let report = run_worker(1, rx, recording_runner(seen.clone(), false), IDLE, None).await;

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(seen.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_errors_do_not_stop_the_worker() {
        let (tx, rx) = work_queue(4);
        for batch in [Batch::new(0, 1), Batch::new(1, 1), Batch::new(2, 1)] {
            tx.push(batch).await.unwrap();
        }
        tx.close();

        let runner = Arc::new(FnRunner::new(|worker_index: usize, batch: Batch| async move {
            if batch.start_index() == 1 {
                return Err(Error::Runner {
                    worker_index,
                    start_index: batch.start_index(),
                    reason: "boom".into(),
                });
            }
            Result::Ok(true)
        }));
        let report = run_worker(0, rx, runner, IDLE, None).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.exit, WorkerExit::QueueClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_batch_times_out_and_worker_moves_on() {
        let (tx, rx) = work_queue(4);
        for batch in [Batch::new(0, 1), Batch::new(1, 1)] {
            tx.push(batch).await.unwrap();
        }
        tx.close();

        let runner = Arc::new(FnRunner::new(|_: usize, batch: Batch| async move {
            if batch.start_index() == 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Result::Ok(true)
        }));
        let limit = Duration::from_secs(5);

        assert_eq!(
            execute(&*runner, 3, Batch::new(0, 1), Some(limit)).await,
            BatchOutcome::Errored(Error::BatchTimeout {
                worker_index: 3,
                start_index: 0,
                timeout: limit,
            })
        );
        assert_eq!(
            execute(&*runner, 3, Batch::new(1, 1), Some(limit)).await,
            BatchOutcome::Succeeded
        );

        let report = run_worker(0, rx, runner, IDLE, Some(limit)).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.exit, WorkerExit::QueueClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn long_batch_is_not_cut_by_idle_timeout() {
        let (tx, rx) = work_queue(1);
        tx.push(Batch::new(0, 1)).await.unwrap();
        tx.close();

        let runner = Arc::new(FnRunner::new(|_: usize, _: Batch| async move {
            tokio::time::sleep(IDLE * 3).await;
            Result::Ok(true)
        }));
        let report = run_worker(0, rx, runner, IDLE, None).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.exit, WorkerExit::QueueClosed);
    }

    #[cfg(feature = "tracing")]
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    #[cfg(feature = "tracing")]
    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(feature = "tracing")]
    #[tokio::test]
    async fn worker_online_is_logged_at_info() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (tx, rx) = work_queue(1);
        tx.close();
        let runner = recording_runner(Arc::new(Mutex::new(Vec::new())), true);
        run_worker(4, rx, runner, IDLE, None).await;

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("Worker 4 online"), "{out}");
        assert!(out.contains("(4) FINISH: queue closed and drained"), "{out}");
    }

    #[tokio::test]
    async fn execute_maps_runner_results() {
        let ok = FnRunner::new(|_: usize, _: Batch| async { Result::Ok(true) });
        let bad = FnRunner::new(|_: usize, _: Batch| async { Result::Ok(false) });
        let batch = Batch::new(0, 1);
        assert_eq!(execute(&ok, 0, batch, None).await, BatchOutcome::Succeeded);
        assert_eq!(execute(&bad, 0, batch, None).await, BatchOutcome::Failed);
    }
}
