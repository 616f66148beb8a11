use crate::{Error, Result};
use core::time::Duration;

/// How long a worker waits on an empty queue before terminating itself.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated settings for one pipeline run.
///
/// Obtain one through [`PipelineConfig::builder`]; every instance has passed
/// validation, so the dispatcher never re-checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    starting_index: u64,
    batch_size: u64,
    worker_count: usize,
    total_count: u64,
    queue_capacity: usize,
    idle_timeout: Duration,
    batch_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub const fn starting_index(&self) -> u64 {
        self.starting_index
    }

    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Capacity of the shared work queue. Defaults to `worker_count`, so
    /// each worker can have one batch ready without unbounded buffering.
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Upper bound on a single batch-runner invocation, if any.
    pub const fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout
    }

    /// Number of batches the generator will produce for this config.
    pub const fn batch_count(&self) -> u64 {
        (self.total_count - self.starting_index).div_ceil(self.batch_size)
    }
}

/// Builder for [`PipelineConfig`].
///
/// `batch_size`, `worker_count` and `total_count` are required. Everything
/// else has a default.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    starting_index: u64,
    batch_size: Option<u64>,
    worker_count: Option<usize>,
    total_count: Option<u64>,
    queue_capacity: Option<usize>,
    idle_timeout: Option<Duration>,
    batch_timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub const fn starting_index(mut self, starting_index: u64) -> Self {
        self.starting_index = starting_index;
        self
    }

    #[must_use]
    pub const fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub const fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = Some(worker_count);
        self
    }

    #[must_use]
    pub const fn total_count(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }

    #[must_use]
    pub const fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = Some(queue_capacity);
        self
    }

    #[must_use]
    pub const fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    #[must_use]
    pub const fn batch_timeout(mut self, batch_timeout: Option<Duration>) -> Self {
        self.batch_timeout = batch_timeout;
        self
    }

    /// Validates the collected values and freezes them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `batch_size`, `worker_count` or `total_count` was never set.
    /// - `batch_size` or `worker_count` is zero.
    /// - `starting_index` is not below `total_count`.
    /// - `queue_capacity`, `idle_timeout` or `batch_timeout` is zero.
    pub fn build(self) -> Result<PipelineConfig> {
        let batch_size = self
            .batch_size
            .ok_or_else(|| Error::invalid_config("batch size is required"))?;
        let worker_count = self
            .worker_count
            .ok_or_else(|| Error::invalid_config("worker count is required"))?;
        let total_count = self
            .total_count
            .ok_or_else(|| Error::invalid_config("total count is required"))?;

        if batch_size == 0 {
            return Err(Error::invalid_config("batch size must be greater than 0"));
        }
        if worker_count == 0 {
            return Err(Error::invalid_config(
                "worker count must be greater than 0",
            ));
        }
        if self.starting_index >= total_count {
            return Err(Error::invalid_config(format!(
                "starting index ({}) must be less than total count ({})",
                self.starting_index, total_count
            )));
        }

        let queue_capacity = self.queue_capacity.unwrap_or(worker_count);
        if queue_capacity == 0 {
            return Err(Error::invalid_config(
                "queue capacity must be greater than 0",
            ));
        }

        let idle_timeout = self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        if idle_timeout.is_zero() {
            return Err(Error::invalid_config(
                "idle timeout must be greater than 0",
            ));
        }
        if self.batch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config(
                "batch timeout must be greater than 0",
            ));
        }

        Ok(PipelineConfig {
            starting_index: self.starting_index,
            batch_size,
            worker_count,
            total_count,
            queue_capacity,
            idle_timeout,
            batch_timeout: self.batch_timeout,
        })
    }
}
