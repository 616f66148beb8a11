use core::fmt;

/// A contiguous range of indices handed to one worker as a single unit of
/// work.
///
/// Covers `[start_index, start_index + count)`. Batches are produced only by
/// the generator, and `count` is never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Batch {
    start_index: u64,
    count: u64,
}

impl Batch {
    pub(crate) const fn new(start_index: u64, count: u64) -> Self {
        Self { start_index, count }
    }

    pub const fn start_index(&self) -> u64 {
        self.start_index
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    /// One past the last index in the batch. Never exceeds the partition's
    /// `total`, so it cannot overflow.
    pub const fn end(&self) -> u64 {
        self.start_index + self.count
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_index, self.end())
    }
}

/// Ordered partition of `[start, total)` into batches of `batch_size`.
///
/// Every batch except the last holds exactly `batch_size` indices; the last
/// one holds whatever remains (at most `batch_size`, never zero). An empty
/// range (`start >= total`) or a zero `batch_size` yields nothing.
#[derive(Clone, Debug)]
pub struct Partition {
    cursor: u64,
    batch_size: u64,
    total: u64,
}

impl Partition {
    pub const fn new(start: u64, batch_size: u64, total: u64) -> Self {
        Self {
            cursor: start,
            batch_size,
            total,
        }
    }

    const fn remaining(&self) -> u64 {
        if self.batch_size == 0 || self.cursor >= self.total {
            return 0;
        }
        (self.total - self.cursor).div_ceil(self.batch_size)
    }
}

impl Iterator for Partition {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.batch_size == 0 || self.cursor >= self.total {
            return None;
        }

        let left = self.total - self.cursor;
        let batch = if left > self.batch_size {
            Batch::new(self.cursor, self.batch_size)
        } else {
            // Final batch: truncated to the remainder.
            Batch::new(self.cursor, left)
        };
        self.cursor += batch.count();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Partition {}

impl core::iter::FusedIterator for Partition {}
