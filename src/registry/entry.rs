//! Per-stream state stored in the registry

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;

use crate::archive::SampleSink;
use crate::protocol::{Envelope, StreamInfo};
use crate::session::SessionId;

use super::cache::ReplayCache;

/// Server-side record of one named stream
///
/// The record outlives its producer: closing or losing the connection
/// finalizes the file sink but keeps subscribers and the replay cache, and
/// a later OpenStream of the same name carries both over into the new
/// record.
pub struct StreamEntry {
    /// Descriptor from the most recent open
    pub info: StreamInfo,

    /// Session that opened this record
    pub owner: SessionId,

    /// Sessions receiving live frames
    pub subscribers: HashSet<SessionId>,

    /// Monotonic count of samples received since the open
    pub received_samples: u64,

    /// Bytes per sample, derived from `info.bits`
    pub byte_depth: usize,

    /// Active archive file, present iff a producer is writing
    pub sink: Option<SampleSink>,

    /// Recent frames for replay queries
    pub cache: ReplayCache,

    /// Encoded PublishStream announcement for this record's info
    announcement: Bytes,

    /// Encoded ResultDone sentinel for replay queries
    replay_done: Bytes,
}

impl StreamEntry {
    /// Build a fresh record for `info`
    ///
    /// The announcement and replay-done payloads are encoded once here;
    /// they only change when the record is replaced by a new open.
    pub fn new(info: StreamInfo, owner: SessionId, replay_window: Duration) -> Self {
        let byte_depth = info.byte_depth();
        let announcement = Envelope::PublishStream { info: info.clone() }.encode();
        let replay_done = Envelope::ResultDone {
            name: info.name.clone(),
        }
        .encode();

        Self {
            info,
            owner,
            subscribers: HashSet::new(),
            received_samples: 0,
            byte_depth,
            sink: None,
            cache: ReplayCache::new(replay_window),
            announcement,
            replay_done,
        }
    }

    /// Encoded stream announcement
    pub fn announcement(&self) -> Bytes {
        self.announcement.clone()
    }

    /// Encoded end-of-replay sentinel
    pub fn replay_done(&self) -> Bytes {
        self.replay_done.clone()
    }

    /// Wall time of the stream's write position, in microseconds
    ///
    /// `base timestamp + received samples / frequency`. A zero frequency
    /// pins the clock to the base instead of faulting.
    pub fn current_timestamp(&self) -> u64 {
        if self.info.frequency == 0 {
            return self.info.timestamp;
        }
        self.info.timestamp + self.received_samples * 1_000_000 / self.info.frequency as u64
    }

    /// Whether a producer currently holds an open file for this stream
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }
}
