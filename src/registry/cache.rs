//! Replay cache
//!
//! A bounded time-window buffer of recently published frames, kept per
//! stream so late callers can query the last few minutes of data without a
//! live subscription. Entries hold the already-encoded frame payload, so a
//! replay is a sequence of cheap `Bytes` clones.
//!
//! Retention is a sliding window over data timestamps, not an LRU: after
//! every append, entries older than `newest - window` are popped from the
//! front. Timestamps are monotonic per stream (derived from the sample
//! counter), so the deque stays ordered by construction.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;

/// One cached frame
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Derived data timestamp in microseconds
    pub timestamp: u64,
    /// Encoded PublishFrame payload
    pub payload: Bytes,
}

/// Sliding-window frame cache, oldest first
#[derive(Debug)]
pub struct ReplayCache {
    /// Retention window in microseconds
    window_us: u64,
    entries: VecDeque<CacheEntry>,
    total_bytes: usize,
}

impl ReplayCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window_us: window.as_micros() as u64,
            entries: VecDeque::new(),
            total_bytes: 0,
        }
    }

    /// Append an entry, then trim everything older than the window
    pub fn push(&mut self, timestamp: u64, payload: Bytes) {
        self.total_bytes += payload.len();
        self.entries.push_back(CacheEntry { timestamp, payload });

        let threshold = timestamp.saturating_sub(self.window_us);
        self.evict_older_than(threshold);
    }

    /// Pop from the front while the front's timestamp is below `threshold`
    fn evict_older_than(&mut self, threshold: u64) {
        while let Some(front) = self.entries.front() {
            if front.timestamp >= threshold {
                break;
            }
            if let Some(old) = self.entries.pop_front() {
                self.total_bytes -= old.payload.len();
            }
        }
    }

    /// Cached entries in ascending timestamp order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }

    /// Number of cached entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total cached payload bytes
    pub fn size(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamp of the newest entry
    pub fn newest_timestamp(&self) -> Option<u64> {
        self.entries.back().map(|e| e.timestamp)
    }

    /// Timestamp of the oldest retained entry
    pub fn oldest_timestamp(&self) -> Option<u64> {
        self.entries.front().map(|e| e.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE_US: u64 = 60 * 1_000_000;

    fn cache_10min() -> ReplayCache {
        ReplayCache::new(Duration::from_secs(600))
    }

    fn payload(n: usize) -> Bytes {
        Bytes::from(vec![0u8; n])
    }

    #[test]
    fn test_push_and_iterate() {
        let mut cache = cache_10min();
        cache.push(100, payload(4));
        cache.push(200, payload(4));
        cache.push(300, payload(4));

        let timestamps: Vec<u64> = cache.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
        assert_eq!(cache.entry_count(), 3);
    }

    #[test]
    fn test_window_eviction() {
        let mut cache = cache_10min();
        cache.push(0, payload(8));
        cache.push(5 * MINUTE_US, payload(8));
        assert_eq!(cache.entry_count(), 2);

        // 11 minutes after the first entry: the first falls out
        cache.push(11 * MINUTE_US, payload(8));
        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.oldest_timestamp(), Some(5 * MINUTE_US));
    }

    #[test]
    fn test_entry_exactly_at_threshold_is_kept() {
        let mut cache = cache_10min();
        cache.push(0, payload(1));
        cache.push(10 * MINUTE_US, payload(1));

        // threshold == newest - window == 0; the entry at 0 stays
        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.oldest_timestamp(), Some(0));
    }

    #[test]
    fn test_size_accounting() {
        let mut cache = cache_10min();
        cache.push(0, payload(100));
        cache.push(MINUTE_US, payload(50));
        assert_eq!(cache.size(), 150);

        cache.push(12 * MINUTE_US, payload(25));
        assert_eq!(cache.size(), 25 + 50);
    }

    #[test]
    fn test_burst_eviction() {
        let mut cache = cache_10min();
        for i in 0..20 {
            cache.push(i * MINUTE_US, payload(2));
        }
        // Only entries within [newest - 10min, newest] survive
        assert_eq!(cache.oldest_timestamp(), Some(9 * MINUTE_US));
        assert_eq!(cache.newest_timestamp(), Some(19 * MINUTE_US));
        assert_eq!(cache.entry_count(), 11);
    }

    #[test]
    fn test_empty_cache() {
        let cache = cache_10min();
        assert!(cache.is_empty());
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.newest_timestamp(), None);
        assert_eq!(cache.iter().count(), 0);
    }
}
