use crate::{Partition, Result, queue::BatchSender};

/// Partitions `[start, total)` into batches of `batch_size` and pushes them,
/// in order, onto the work queue.
///
/// Each push waits while the queue is full, so the generator never runs more
/// than the queue capacity ahead of the workers. Once the last batch is
/// queued the queue is closed; workers drain what is left and stop.
///
/// An empty range (`start >= total`) pushes nothing and closes the queue
/// immediately.
///
/// Returns the number of batches pushed.
///
/// # Errors
///
/// Returns [`crate::Error::QueueClosed`] if every worker has already
/// terminated, leaving nobody to receive the next batch. The queue is closed
/// in that case as well.
pub async fn generate_batches(
    start: u64,
    batch_size: u64,
    total: u64,
    tx: &BatchSender,
) -> Result<u64> {
    let mut pushed = 0;

    for batch in Partition::new(start, batch_size, total) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Putting batch in: {}", batch.start_index());

        if let Err(e) = tx.push(batch).await {
            tx.close();
            return Err(e);
        }
        pushed += 1;

        #[cfg(feature = "tracing")]
        tracing::info!("Put samples ({} to {}) in queue", batch.start_index(), batch.end());
    }

    tx.close();

    #[cfg(feature = "tracing")]
    tracing::info!("Finished loading {pushed} batches to queue");

    Ok(pushed)
}
