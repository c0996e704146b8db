//! Periodic archive rotation
//!
//! A recurring timer closes every stream's active file and opens a fresh
//! one for the next window, then scans the storage directory and feeds
//! completed files to the compression queue. A file that survives a scan
//! it was already enqueued on has a failed compression behind it; it is
//! left alone for the operator instead of being retried forever.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::registry::StreamRegistry;

use super::compress::CompressQueue;
use super::sink::ARCHIVE_EXT;

/// Spawn the rotation timer task
///
/// The first rotation happens one full `period` after spawn. Returns a
/// handle the server aborts on shutdown.
pub fn spawn_rotation_task(
    registry: Arc<StreamRegistry>,
    queue: CompressQueue,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // interval fires immediately; consume that so rotation waits a full period
        ticker.tick().await;

        let mut enqueued = HashSet::new();
        loop {
            ticker.tick().await;
            sweep(&registry, &queue, &mut enqueued).await;
        }
    })
}

/// One rotation cycle: rotate sinks, then enqueue completed files
///
/// `enqueued` remembers what was already handed to compression so a failed
/// encode is not re-enqueued on the next cycle.
pub async fn sweep(
    registry: &StreamRegistry,
    queue: &CompressQueue,
    enqueued: &mut HashSet<PathBuf>,
) {
    let current: HashSet<PathBuf> = registry.rotate().await.into_iter().collect();

    let dir = &registry.config().storage_dir;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to scan storage directory");
            return;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(dirent)) => {
                let path = dirent.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXT) {
                    continue;
                }
                if current.contains(&path) {
                    continue;
                }
                if !enqueued.insert(path.clone()) {
                    tracing::warn!(
                        path = %path.display(),
                        "Archive still present after earlier compression attempt, leaving for operator"
                    );
                    continue;
                }
                tracing::info!(path = %path.display(), "Enqueueing archive for compression");
                queue.enqueue(path);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Storage directory scan failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessTable;
    use crate::protocol::StreamInfo;
    use crate::registry::RegistryConfig;
    use crate::session::SessionRegistry;
    use tokio::sync::mpsc;

    fn info(name: &str) -> StreamInfo {
        StreamInfo {
            name: name.into(),
            description: String::new(),
            sensor: 2,
            hardware: "probe".into(),
            unit: 2,
            channel_descriptions: vec!["ch0".into()],
            channels: 1,
            frequency: 10,
            bits: 16,
            zero_offsets: vec![0],
            scale: 1.0,
            timestamp: 0,
            zoom: 1.0,
        }
    }

    async fn registry_with_stream(
        dir: &std::path::Path,
    ) -> (Arc<StreamRegistry>, crate::session::SessionId) {
        let sessions = Arc::new(SessionRegistry::new());
        let access = AccessTable::from_pairs([("temp1", "x")]);
        let config = RegistryConfig::default().storage_dir(dir);
        let registry = Arc::new(StreamRegistry::new(sessions.clone(), access, config));

        let (tx, _rx) = mpsc::unbounded_channel();
        let producer = sessions.create(tx).await;
        registry
            .open_stream(producer, 1, "x", info("temp1"))
            .await
            .unwrap();
        (registry, producer)
    }

    #[tokio::test]
    async fn test_sweep_enqueues_rotated_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, producer) = registry_with_stream(dir.path()).await;

        registry
            .write_frame(producer, 1, vec![vec![1, 2, 3]])
            .await
            .unwrap();

        let (queue, mut jobs) = CompressQueue::channel();
        let mut enqueued = HashSet::new();

        sweep(&registry, &queue, &mut enqueued).await;

        let job = jobs.try_recv().unwrap();
        assert!(job.to_string_lossy().ends_with("temp1_0.wav"));
        assert!(jobs.try_recv().is_err(), "current file is not enqueued");

        // The job was never compressed (no worker): a later sweep must not
        // hand it out again.
        sweep(&registry, &queue, &mut enqueued).await;
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _producer) = registry_with_stream(dir.path()).await;

        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
        std::fs::write(dir.path().join("old.flac"), b"already done").unwrap();

        let (queue, mut jobs) = CompressQueue::channel();
        let mut enqueued = HashSet::new();
        sweep(&registry, &queue, &mut enqueued).await;

        // Only the rotated .wav may appear, never the others
        while let Ok(job) = jobs.try_recv() {
            assert_eq!(job.extension().unwrap(), "wav");
        }
        assert!(dir.path().join("notes.txt").exists());
    }
}
