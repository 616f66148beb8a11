use batchpool::{
    Batch, BatchRunner, Dispatcher, Error, FnRunner, Partition, PipelineConfig, Result,
    WorkerExit, generate_batches,
    queue::work_queue,
    run_worker,
};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

const IDLE: Duration = Duration::from_secs(10);

fn collecting_runner(seen: Arc<Mutex<Vec<Batch>>>) -> impl BatchRunner {
    FnRunner::new(move |_: usize, batch: Batch| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().await.push(batch);
            Ok::<_, Error>(true)
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_index_alone_is_one_batch() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = PipelineConfig::builder()
        .starting_index(9999)
        .batch_size(100)
        .worker_count(4)
        .total_count(10_000)
        .build()?;

    let summary = Dispatcher::new(config, collecting_runner(seen.clone()))
        .run()
        .await?;

    assert_eq!(summary.generated, 1);
    let seen: Vec<_> = seen
        .lock()
        .await
        .iter()
        .map(|b| (b.start_index(), b.count()))
        .collect();
    assert_eq!(seen, vec![(9999, 1)]);
    assert!(
        summary
            .workers
            .iter()
            .all(|w| w.exit == WorkerExit::QueueClosed)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_range_starts_and_stops_the_pool() -> Result<()> {
    let (tx, rx) = work_queue(2);
    let runner = Arc::new(collecting_runner(Arc::new(Mutex::new(Vec::new()))));
    let workers: Vec<_> = (0..2)
        .map(|i| tokio::spawn(run_worker(i, rx.clone(), Arc::clone(&runner), IDLE, None)))
        .collect();

    assert_eq!(generate_batches(10_000, 500, 10_000, &tx).await?, 0);

    for handle in workers {
        let report = handle.await.expect("worker panicked");
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.exit, WorkerExit::QueueClosed);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_producer_lets_workers_idle_out() {
    // The producer never closes the queue, so only the idle timeout can stop
    // the workers.
    let (tx, rx) = work_queue(1);
    let runner = Arc::new(collecting_runner(Arc::new(Mutex::new(Vec::new()))));
    let mut batches = Partition::new(0, 10, 20);
    tx.push(batches.next().unwrap()).await.unwrap();

    let workers: Vec<_> = (0..3)
        .map(|i| tokio::spawn(run_worker(i, rx.clone(), Arc::clone(&runner), IDLE, None)))
        .collect();
    drop(rx);

    let mut attempted = 0;
    for handle in workers {
        let report = handle.await.unwrap();
        attempted += report.attempted();
        assert!(matches!(report.exit, WorkerExit::IdleTimeout { .. }));
    }
    assert_eq!(attempted, 1);

    // Nobody is left to receive.
    let err = tx.push(batches.next().unwrap()).await.unwrap_err();
    assert!(matches!(err, Error::QueueClosed { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generator_waits_for_slow_workers() -> Result<()> {
    // Capacity 1 with slow runners: the generator must stall rather than
    // overrun, and nothing is lost.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runner = {
        let seen = Arc::clone(&seen);
        FnRunner::new(move |_: usize, batch: Batch| {
            let seen = Arc::clone(&seen);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                seen.lock().await.push(batch.start_index());
                Ok::<_, Error>(true)
            }
        })
    };
    let config = PipelineConfig::builder()
        .batch_size(10)
        .worker_count(2)
        .queue_capacity(1)
        .total_count(200)
        .build()?;

    let summary = batchpool::start(config, runner).await?;

    let mut starts = seen.lock().await.clone();
    starts.sort_unstable();
    assert_eq!(starts, (0..200).step_by(10).collect::<Vec<u64>>());
    assert_eq!(summary.succeeded, 20);
    assert_eq!(summary.unattempted(), 0);
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_runner_end_to_end() -> Result<()> {
    // Fails unless the batch arrives on stdin as "start,count" and matches
    // the environment.
    let runner = batchpool::CommandRunner::shell(
        r#"read line; test "$line" = "$BATCH_START,$BATCH_COUNT" && echo "job $BATCH_START on $CONSUMER_WORKER""#,
    );
    let config = PipelineConfig::builder()
        .batch_size(25)
        .worker_count(1)
        .total_count(100)
        .build()?;

    let summary = batchpool::start(config, runner).await?;

    assert_eq!(summary.generated, 4);
    assert_eq!(summary.succeeded, 4);
    Ok(())
}
