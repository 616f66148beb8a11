//! Error types for the batch dispatcher.
//!
//! This module defines the central `Error` enum. Only plumbing failures ever
//! surface from [`crate::Dispatcher::run`]; batch-level failures are logged
//! and counted in the [`crate::RunSummary`] instead.
//!
//! ## Error Cases
//! - `InvalidConfig`: The pipeline configuration failed validation.
//! - `QueueClosed`: A batch could not be pushed because every consumer is
//!   gone.
//! - `WorkerJoin`: A worker task panicked or was aborted.
//! - `Runner`: The batch runner could not be invoked for a batch.
//! - `BatchTimeout`: The batch runner exceeded the per-batch timeout.

use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the batch dispatcher.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The configuration was rejected before the pipeline started.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Internal queue send failure (all receivers dropped).
    #[error("Queue closed: {context}")]
    QueueClosed { context: String },

    /// A worker task did not finish cleanly.
    #[error("Worker {worker_index} failed to join: {reason}")]
    WorkerJoin { worker_index: usize, reason: String },

    /// The batch runner could not be invoked.
    #[error("Worker {worker_index} could not run batch at {start_index}: {reason}")]
    Runner {
        worker_index: usize,
        start_index: u64,
        reason: String,
    },

    /// The batch runner did not finish within the per-batch timeout.
    #[error("Worker {worker_index} timed out after {timeout:?} on batch at {start_index}")]
    BatchTimeout {
        worker_index: usize,
        start_index: u64,
        timeout: Duration,
    },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
