//! Bounded FIFO work queue shared by the generator and the worker pool.
//!
//! The queue is a thin wrapper over [`async_channel::bounded`]. Unlike
//! `tokio::sync::mpsc`, its receiver is `Clone`, so every worker pulls from
//! the same queue directly and a batch is handed to exactly one of them.
//!
//! The producer half closes the queue once generation is done. Receivers keep
//! draining whatever is still buffered and only then observe the close.

use crate::{Batch, Error, Result};
use core::time::Duration;

/// Creates a work queue holding at most `capacity` batches.
///
/// # Panics
///
/// Panics if `capacity` is zero. [`crate::PipelineConfig`] never allows that.
pub fn work_queue(capacity: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = async_channel::bounded(capacity);
    (BatchSender { tx }, BatchReceiver { rx })
}

/// What a worker observed while waiting on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dequeue {
    /// A batch was handed to this receiver.
    Batch(Batch),
    /// The queue is closed and fully drained.
    Closed,
    /// Nothing arrived within the idle window.
    Idle,
}

/// Producer half of the work queue.
#[derive(Debug)]
pub struct BatchSender {
    tx: async_channel::Sender<Batch>,
}

impl BatchSender {
    /// Pushes a batch, suspending while the queue is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if every receiver has been dropped, for
    /// example because all workers already terminated.
    pub async fn push(&self, batch: Batch) -> Result<()> {
        self.tx.send(batch).await.map_err(|e| Error::QueueClosed {
            context: format!("no workers left to receive batch {}", e.into_inner()),
        })
    }

    /// Marks the end of the stream. Already queued batches stay deliverable.
    pub fn close(&self) {
        self.tx.close();
    }

    /// Batches currently buffered.
    pub(crate) fn len(&self) -> usize {
        self.tx.len()
    }
}

impl Drop for BatchSender {
    fn drop(&mut self) {
        self.tx.close();
    }
}

/// Consumer half of the work queue. Clone one per worker.
#[derive(Debug, Clone)]
pub struct BatchReceiver {
    rx: async_channel::Receiver<Batch>,
}

impl BatchReceiver {
    /// Waits up to `idle` for the next batch.
    pub async fn pop(&self, idle: Duration) -> Dequeue {
        match tokio::time::timeout(idle, self.rx.recv()).await {
            Ok(Ok(batch)) => Dequeue::Batch(batch),
            Ok(Err(_)) => Dequeue::Closed,
            Err(_) => Dequeue::Idle,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
