//! Simulated download workers and the range partitioning they rely on.

use std::ops::Range;
use std::time::Duration;

/// Splits `total_units` into `worker_count` contiguous ranges.
///
/// Worker `i` receives `total_units / worker_count` units, plus one extra
/// when `i < total_units % worker_count`. Ranges are laid out consecutively
/// from 0, so concatenating them in index order covers `0..total_units`
/// exactly. Workers beyond `total_units` receive empty ranges.
///
/// A `worker_count` of zero is treated as one.
pub fn partition(total_units: usize, worker_count: usize) -> Vec<Range<usize>> {
    let worker_count = worker_count.max(1);
    let base = total_units / worker_count;
    let remainder = total_units % worker_count;

    let mut ranges = Vec::with_capacity(worker_count);
    let mut start = 0;
    for i in 0..worker_count {
        let len = base + usize::from(i < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// A simulated download worker.
///
/// Each worker owns a fixed range of the grid and downloads it one block at
/// a time, in order. It never takes blocks from another worker's range.
#[derive(Debug, Clone)]
pub struct Worker {
    /// Worker index (0..worker_count)
    pub id: usize,

    /// Assigned half-open block range
    pub range: Range<usize>,

    /// Whether the worker still has a block in progress
    pub active: bool,

    /// Block currently in progress
    pub current: Option<usize>,

    /// When the current block started (context clock)
    pub started_at: Duration,

    /// How long the current block should take
    pub target: Duration,
}

impl Worker {
    /// Creates an inactive worker for `range`.
    pub fn new(id: usize, range: Range<usize>) -> Self {
        Self {
            id,
            range,
            active: false,
            current: None,
            started_at: Duration::ZERO,
            target: Duration::ZERO,
        }
    }

    /// Returns true if `index` falls inside this worker's range.
    pub fn owns(&self, index: usize) -> bool {
        self.range.contains(&index)
    }

    /// Puts `block` in progress with the given target duration.
    pub(crate) fn begin_block(&mut self, block: usize, now: Duration, target: Duration) {
        debug_assert!(self.owns(block), "worker {} given block {block} outside its range", self.id);
        self.active = true;
        self.current = Some(block);
        self.started_at = now;
        self.target = target;
    }

    /// Marks the worker as permanently idle.
    pub(crate) fn retire(&mut self) {
        self.active = false;
        self.current = None;
        self.target = Duration::ZERO;
    }

    /// Time spent on the current block.
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_remainder_goes_to_lowest_workers() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn test_partition_more_workers_than_units() {
        let ranges = partition(2, 5);
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2, 2..2]);
    }

    #[test]
    fn test_partition_zero_units() {
        let ranges = partition(0, 3);
        assert!(ranges.iter().all(|r| r.is_empty()));
        assert_eq!(ranges.len(), 3);
    }

    #[test]
    fn test_partition_zero_workers_treated_as_one() {
        assert_eq!(partition(7, 0), vec![0..7]);
    }

    #[test]
    fn test_worker_lifecycle() {
        let mut worker = Worker::new(1, 4..7);
        assert!(!worker.active);
        assert!(worker.owns(4));
        assert!(!worker.owns(7));

        worker.begin_block(4, Duration::from_secs(1), Duration::from_secs(2));
        assert!(worker.active);
        assert_eq!(worker.current, Some(4));
        assert_eq!(worker.elapsed(Duration::from_secs(3)), Duration::from_secs(2));

        worker.retire();
        assert!(!worker.active);
        assert_eq!(worker.current, None);
    }
}
