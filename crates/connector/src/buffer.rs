use std::collections::VecDeque;
use std::time::{Duration, Instant};

use obrec_book::Snapshot;

/// Bounded, in-order queue of snapshots waiting to be persisted.
///
/// When full, the oldest entry is dropped to make room and counted in
/// [`SnapshotBuffer::dropped`]. A flush is due once `batch_size` entries are
/// queued or `flush_interval` has passed since the last successful flush.
#[derive(Debug)]
pub struct SnapshotBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
    dropped: u64,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize, batch_size: usize, flush_interval: Duration) -> Self {
        Self::starting_at(capacity, batch_size, flush_interval, Instant::now())
    }

    /// Like [`SnapshotBuffer::new`] with an explicit flush clock origin
    pub fn starting_at(
        capacity: usize,
        batch_size: usize,
        flush_interval: Duration,
        now: Instant,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(batch_size.max(1))),
            capacity,
            batch_size: batch_size.max(1),
            flush_interval,
            last_flush: now,
            dropped: 0,
        }
    }

    /// Append a snapshot. Returns `true` if the oldest entry was evicted.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
            true
        } else {
            false
        };
        self.entries.push_back(snapshot);
        evicted
    }

    pub fn should_flush(&self, now: Instant) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.entries.len() >= self.batch_size
            || now.saturating_duration_since(self.last_flush) >= self.flush_interval
    }

    /// Copy of the pending entries in arrival order. The buffer keeps them
    /// until [`SnapshotBuffer::mark_flushed`] is called.
    pub fn pending(&self) -> Vec<Snapshot> {
        self.entries.iter().cloned().collect()
    }

    /// Drop the first `count` entries after they were persisted and restart
    /// the flush clock.
    pub fn mark_flushed(&mut self, count: usize, now: Instant) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
        self.last_flush = now;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
