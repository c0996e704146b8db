//! Stream registry implementation
//!
//! The central table of named streams. All stream mutation goes through
//! the registry's own operations so the lifecycle invariants (one writable
//! instance per name, subscriber/cache continuity across re-opens, no
//! dangling session ids) hold at a single place.
//!
//! Locking: the table itself sits behind a `RwLock`; each entry behind its
//! own `Arc<RwLock<_>>`, so operations on distinct stream names proceed in
//! parallel while writes to one stream serialize. Frame broadcast happens
//! while the entry's write lock is held, which is what guarantees
//! subscribers see one stream's frames in write order. Session-registry
//! locks are leaves: they are only ever taken with no lock held or while
//! holding an entry lock, never the other way around.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::archive::{wav, SampleSink};
use crate::auth::AccessTable;
use crate::error::{Result, StreamError};
use crate::fanout::Broadcaster;
use crate::protocol::{Envelope, StreamInfo};
use crate::session::{SessionId, SessionRegistry};
use crate::stats::StreamStats;

use super::cache::ReplayCache;
use super::config::RegistryConfig;
use super::entry::StreamEntry;

/// Registry of all named streams
///
/// The stream table is ordered by name so announcement iteration order is
/// deterministic.
pub struct StreamRegistry {
    streams: RwLock<BTreeMap<String, Arc<RwLock<StreamEntry>>>>,
    sessions: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
    access: AccessTable,
    config: RegistryConfig,
}

impl StreamRegistry {
    pub fn new(sessions: Arc<SessionRegistry>, access: AccessTable, config: RegistryConfig) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&sessions));
        Self {
            streams: RwLock::new(BTreeMap::new()),
            sessions,
            broadcaster,
            access,
            config,
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Open (or replace) the stream named by `info.name`
    ///
    /// Replacing an existing record finalizes its file and carries its
    /// subscriber set and replay cache into the new record. On success the
    /// caller's session gets `alias -> name` bound and every list-subscribed
    /// session receives the new announcement.
    pub async fn open_stream(
        &self,
        session: SessionId,
        alias: u32,
        password: &str,
        info: StreamInfo,
    ) -> Result<()> {
        self.access.check(&info.name, password)?;
        if !(1..=32).contains(&info.bits) {
            return Err(StreamError::BadBitDepth(info.bits as u32).into());
        }

        let name = info.name.clone();
        let mut entry = StreamEntry::new(info, session, self.config.replay_window);
        let announcement = entry.announcement();

        {
            let mut streams = self.streams.write().await;

            if let Some(prev_arc) = streams.remove(&name) {
                let mut prev = prev_arc.write().await;
                if let Some(sink) = prev.sink.take() {
                    if let Err(e) = sink.finalize().await {
                        tracing::warn!(stream = %name, error = %e, "Failed to finalize replaced archive");
                    }
                }
                // Continuity across producer reconnects
                entry.subscribers = std::mem::take(&mut prev.subscribers);
                entry.cache = std::mem::replace(
                    &mut prev.cache,
                    ReplayCache::new(self.config.replay_window),
                );
            }

            let sink = SampleSink::create(
                &self.config.storage_dir,
                &name,
                entry.info.timestamp,
                entry.info.channels,
                entry.info.frequency,
                entry.byte_depth,
            )
            .await?;
            entry.sink = Some(sink);

            tracing::info!(
                stream = %name,
                session_id = %session,
                channels = entry.info.channels,
                frequency = entry.info.frequency,
                bits = entry.info.bits,
                subscribers = entry.subscribers.len(),
                "Stream opened"
            );

            streams.insert(name.clone(), Arc::new(RwLock::new(entry)));
        }

        self.sessions.bind_alias(session, alias, &name).await;
        self.broadcaster.publish_list(&announcement).await;
        Ok(())
    }

    /// Append one frame of samples to the stream bound to `alias`
    ///
    /// Interleaves and persists the samples, advances the sample counter,
    /// broadcasts the frame to subscribers, and caches it for replay.
    pub async fn write_frame(
        &self,
        session: SessionId,
        alias: u32,
        channels: Vec<Vec<i32>>,
    ) -> Result<()> {
        let name = self
            .sessions
            .resolve_alias(session, alias)
            .await
            .ok_or(StreamError::UnknownAlias(alias))?;
        let entry_arc = self
            .streams
            .read()
            .await
            .get(&name)
            .cloned()
            .ok_or(StreamError::UnknownAlias(alias))?;

        let mut entry = entry_arc.write().await;

        if channels.is_empty() || channels[0].is_empty() {
            return Err(StreamError::EmptyFrame.into());
        }
        if channels.len() != entry.info.channels as usize {
            return Err(StreamError::ChannelCountMismatch {
                expected: entry.info.channels,
                got: channels.len(),
            }
            .into());
        }
        let samples = channels[0].len();
        for (i, channel) in channels.iter().enumerate().skip(1) {
            if channel.len() != samples {
                return Err(StreamError::RaggedChannels {
                    channel: i,
                    expected: samples,
                    got: channel.len(),
                }
                .into());
            }
        }

        let interleaved = wav::interleave(&channels, entry.byte_depth);
        if let Some(sink) = entry.sink.as_mut() {
            sink.append(&interleaved).await?;
        }

        let offset = entry.received_samples;
        entry.received_samples += samples as u64;
        let timestamp = entry.current_timestamp();

        let payload = Envelope::PublishFrame {
            name: name.clone(),
            timestamp,
            offset,
            channels,
        }
        .encode();

        entry.cache.push(timestamp, payload.clone());

        // Broadcast under the entry lock so subscribers observe this
        // stream's frames in write order.
        let subscribers: Vec<SessionId> = entry.subscribers.iter().copied().collect();
        self.broadcaster.publish_to(subscribers, &payload).await;
        Ok(())
    }

    /// Finish writing the stream bound to `alias`
    ///
    /// Only the recorded owner finalizes the file; the alias binding is
    /// dropped from the caller's session either way.
    pub async fn close_stream(&self, session: SessionId, alias: u32) -> Result<()> {
        let name = self
            .sessions
            .resolve_alias(session, alias)
            .await
            .ok_or(StreamError::UnknownAlias(alias))?;

        if let Some(entry_arc) = self.streams.read().await.get(&name).cloned() {
            let mut entry = entry_arc.write().await;
            if entry.owner == session {
                if let Some(sink) = entry.sink.take() {
                    match sink.finalize().await {
                        Ok(path) => {
                            tracing::info!(stream = %name, path = %path.display(), "Stream closed")
                        }
                        Err(e) => {
                            tracing::warn!(stream = %name, error = %e, "Failed to finalize archive on close")
                        }
                    }
                }
            }
        }

        self.sessions.unbind_alias(session, alias).await;
        Ok(())
    }

    /// Add the session to a stream's live subscriber set
    ///
    /// Unknown names are ignored; subscribing is not how a client learns
    /// whether a stream exists.
    pub async fn subscribe(&self, session: SessionId, name: &str) {
        match self.streams.read().await.get(name).cloned() {
            Some(entry_arc) => {
                let mut entry = entry_arc.write().await;
                entry.subscribers.insert(session);
                tracing::debug!(
                    stream = %name,
                    session_id = %session,
                    subscribers = entry.subscribers.len(),
                    "Subscriber added"
                );
            }
            None => {
                tracing::debug!(stream = %name, session_id = %session, "Subscribe to unknown stream ignored")
            }
        }
    }

    /// Remove the session from a stream's live subscriber set
    pub async fn unsubscribe(&self, session: SessionId, name: &str) {
        if let Some(entry_arc) = self.streams.read().await.get(name).cloned() {
            let mut entry = entry_arc.write().await;
            entry.subscribers.remove(&session);
            tracing::debug!(
                stream = %name,
                session_id = %session,
                subscribers = entry.subscribers.len(),
                "Subscriber removed"
            );
        }
    }

    /// Opt the session into announcements and send it the current snapshot
    ///
    /// Announcements go out in stream-name order.
    pub async fn subscribe_stream_list(&self, session: SessionId) {
        self.sessions.set_list_subscribed(session, true).await;

        let announcements: Vec<_> = {
            let streams = self.streams.read().await;
            let mut out = Vec::with_capacity(streams.len());
            for entry_arc in streams.values() {
                out.push(entry_arc.read().await.announcement());
            }
            out
        };

        for announcement in announcements {
            self.sessions.send(session, announcement).await;
        }
    }

    /// Send the session every cached frame of `name`, then the done sentinel
    ///
    /// Unknown names are ignored entirely: no frames, no sentinel.
    pub async fn query_cache(&self, session: SessionId, name: &str) {
        let entry_arc = match self.streams.read().await.get(name).cloned() {
            Some(arc) => arc,
            None => {
                tracing::debug!(stream = %name, session_id = %session, "Query for unknown stream ignored");
                return;
            }
        };

        let (frames, done) = {
            let entry = entry_arc.read().await;
            let frames: Vec<_> = entry.cache.iter().map(|e| e.payload.clone()).collect();
            (frames, entry.replay_done())
        };

        tracing::debug!(stream = %name, session_id = %session, frames = frames.len(), "Replay query");
        for frame in frames {
            self.sessions.send(session, frame).await;
        }
        self.sessions.send(session, done).await;
    }

    /// Tear down everything a departing session touched
    ///
    /// Removes the session record (aliases, list flag, outbound queue),
    /// strips its id from every subscriber set, and finalizes any archive
    /// it owned. Safe to call concurrently with in-flight messages from
    /// the same session; those degrade to no-ops.
    pub async fn drop_session(&self, session: SessionId) {
        self.sessions.remove(session).await;

        let entries: Vec<(String, Arc<RwLock<StreamEntry>>)> = self
            .streams
            .read()
            .await
            .iter()
            .map(|(name, arc)| (name.clone(), Arc::clone(arc)))
            .collect();

        for (name, entry_arc) in entries {
            let mut entry = entry_arc.write().await;
            entry.subscribers.remove(&session);
            if entry.owner == session {
                if let Some(sink) = entry.sink.take() {
                    match sink.finalize().await {
                        Ok(path) => tracing::info!(
                            stream = %name,
                            session_id = %session,
                            path = %path.display(),
                            "Owner disconnected, archive finalized"
                        ),
                        Err(e) => tracing::warn!(
                            stream = %name,
                            error = %e,
                            "Failed to finalize archive on disconnect"
                        ),
                    }
                }
            }
        }
    }

    /// Rotate every active archive file
    ///
    /// Each open sink is finalized and a new one opened for the same
    /// stream at the current derived timestamp. The sample counter is
    /// untouched: the file restarts, the stream does not. Returns the
    /// paths of the freshly opened files so the caller can tell them apart
    /// from rotation leftovers when scanning the storage directory.
    pub async fn rotate(&self) -> Vec<PathBuf> {
        let entries: Vec<(String, Arc<RwLock<StreamEntry>>)> = self
            .streams
            .read()
            .await
            .iter()
            .map(|(name, arc)| (name.clone(), Arc::clone(arc)))
            .collect();

        let mut current = Vec::new();
        for (name, entry_arc) in entries {
            let mut entry = entry_arc.write().await;
            let Some(sink) = entry.sink.take() else {
                continue;
            };

            match sink.finalize().await {
                Ok(path) => {
                    tracing::info!(stream = %name, path = %path.display(), "Archive rotated out")
                }
                Err(e) => {
                    tracing::warn!(stream = %name, error = %e, "Failed to finalize archive on rotation")
                }
            }

            let window_start = entry.current_timestamp();
            match SampleSink::create(
                &self.config.storage_dir,
                &name,
                window_start,
                entry.info.channels,
                entry.info.frequency,
                entry.byte_depth,
            )
            .await
            {
                Ok(sink) => {
                    current.push(sink.path().to_path_buf());
                    entry.sink = Some(sink);
                }
                Err(e) => {
                    tracing::error!(stream = %name, error = %e, "Failed to reopen archive after rotation");
                }
            }
        }
        current
    }

    /// Statistics snapshot for one stream
    pub async fn stream_stats(&self, name: &str) -> Option<StreamStats> {
        let entry_arc = self.streams.read().await.get(name).cloned()?;
        let entry = entry_arc.read().await;
        Some(StreamStats {
            subscriber_count: entry.subscribers.len(),
            received_samples: entry.received_samples,
            cached_entries: entry.cache.entry_count(),
            cached_bytes: entry.cache.size(),
            has_sink: entry.has_sink(),
        })
    }

    /// Number of known streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}
