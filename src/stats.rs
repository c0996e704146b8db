//! Stream statistics snapshots

/// Point-in-time statistics for one stream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Number of live-frame subscribers
    pub subscriber_count: usize,
    /// Samples received since the current open
    pub received_samples: u64,
    /// Frames held in the replay cache
    pub cached_entries: usize,
    /// Replay cache payload bytes
    pub cached_bytes: usize,
    /// Whether a producer currently holds an open archive file
    pub has_sink: bool,
}
