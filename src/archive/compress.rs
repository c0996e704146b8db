//! Background compression pipeline
//!
//! Finished archive files are handed to a single sequential worker that
//! invokes an external encoder as a child process, one file at a time. On
//! a zero exit status the original is deleted; on any other outcome the
//! original stays in place for the operator and no retry is attempted.
//! The queue is a single-writer single-reader mpsc hand-off: rotation
//! enqueues, the worker dequeues.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// External encoder invocation
///
/// The encoder is run as `program [args..] <file>` and must produce its
/// compressed sibling itself (the default, `flac`, writes `<file>.flac`
/// next to the input).
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Encoder executable
    pub program: String,
    /// Arguments placed before the file path
    pub args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "flac".to_owned(),
            args: vec!["--best".to_owned(), "-f".to_owned()],
        }
    }
}

/// Producer side of the compression job queue
#[derive(Clone)]
pub struct CompressQueue {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl CompressQueue {
    /// Build a queue without a worker; the receiver drains it
    ///
    /// Used by tests and by callers that want custom job handling.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a file for compression
    ///
    /// A send after the worker stopped is dropped silently; the file is
    /// picked up by the operator like any other failed job.
    pub fn enqueue(&self, path: PathBuf) {
        if self.tx.send(path).is_err() {
            tracing::warn!("Compression worker gone, dropping job");
        }
    }
}

/// Spawn the sequential compression worker
///
/// Exactly one encoder subprocess runs at a time; the worker re-arms after
/// every job, success or not, until the queue sender is dropped.
pub fn spawn_worker(config: EncoderConfig) -> (CompressQueue, JoinHandle<()>) {
    let (queue, mut rx) = CompressQueue::channel();

    let handle = tokio::spawn(async move {
        while let Some(path) = rx.recv().await {
            run_job(&config, &path).await;
        }
    });

    (queue, handle)
}

async fn run_job(config: &EncoderConfig, path: &PathBuf) {
    tracing::info!(path = %path.display(), encoder = %config.program, "Compressing archive");

    let status = Command::new(&config.program)
        .args(&config.args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete compressed original");
            } else {
                tracing::info!(path = %path.display(), "Archive compressed, original deleted");
            }
        }
        Ok(status) => {
            tracing::warn!(
                path = %path.display(),
                status = %status,
                "Encoder failed, keeping original"
            );
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                encoder = %config.program,
                error = %e,
                "Failed to spawn encoder, keeping original"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"payload").unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_deletes_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.wav");

        let config = EncoderConfig {
            program: "true".into(),
            args: vec![],
        };
        run_job(&config, &path).await;

        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.wav");

        let config = EncoderConfig {
            program: "false".into(),
            args: vec![],
        };
        run_job(&config, &path).await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_encoder_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.wav");

        let config = EncoderConfig {
            program: "samplecast-no-such-encoder".into(),
            args: vec![],
        };
        run_job(&config, &path).await;

        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.wav");
        let b = touch(dir.path(), "b.wav");

        let (queue, handle) = spawn_worker(EncoderConfig {
            program: "true".into(),
            args: vec![],
        });
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        drop(queue);

        handle.await.unwrap();
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
