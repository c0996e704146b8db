//! Archive file sink
//!
//! One sink exists per stream while a producer is actively writing. The
//! sink owns the open file handle; it is touched only by the write,
//! rotation, close, and owner-disconnect paths.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::wav;

/// File extension of uncompressed archive files
pub const ARCHIVE_EXT: &str = "wav";

/// Replace characters unsafe in file names
///
/// Anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archive file name for a stream and rotation-window start
pub fn file_name(stream_name: &str, window_start_us: u64) -> String {
    format!(
        "{}_{}.{}",
        sanitize_name(stream_name),
        window_start_us,
        ARCHIVE_EXT
    )
}

/// Open WAV file a stream is currently appending to
///
/// Created with zeroed size fields; [`SampleSink::finalize`] patches them.
/// A sink abandoned without finalize (process death) leaves a file whose
/// header claims zero data, which the encoder rejects and the operator can
/// still salvage.
pub struct SampleSink {
    file: File,
    path: PathBuf,
    data_bytes: u64,
}

impl SampleSink {
    /// Create the archive file and write its header
    pub async fn create(
        dir: &Path,
        stream_name: &str,
        window_start_us: u64,
        channels: u16,
        sample_rate: u32,
        byte_depth: usize,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(file_name(stream_name, window_start_us));
        let mut file = File::create(&path).await?;
        file.write_all(&wav::header(channels, sample_rate, byte_depth, 0))
            .await?;

        tracing::debug!(path = %path.display(), "Archive sink created");
        Ok(Self {
            file,
            path,
            data_bytes: 0,
        })
    }

    /// Append interleaved sample bytes
    pub async fn append(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all(data).await?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of sample data written so far
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Patch the header size fields, flush, and close the file
    ///
    /// Returns the finalized path so rotation can hand it to compression.
    pub async fn finalize(mut self) -> std::io::Result<PathBuf> {
        let data_len = u32::try_from(self.data_bytes).unwrap_or(u32::MAX);

        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(wav::RIFF_SIZE_OFFSET)).await?;
        self.file
            .write_all(&wav::riff_size(data_len).to_le_bytes())
            .await?;
        self.file.seek(SeekFrom::Start(wav::DATA_SIZE_OFFSET)).await?;
        self.file.write_all(&data_len.to_le_bytes()).await?;
        self.file.flush().await?;
        self.file.sync_all().await?;

        tracing::debug!(
            path = %self.path.display(),
            data_bytes = self.data_bytes,
            "Archive sink finalized"
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("temp1"), "temp1");
        assert_eq!(sanitize_name("lab/probe 3"), "lab_probe_3");
        assert_eq!(sanitize_name("a-b_c"), "a-b_c");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("lab/temp", 1_700_000_000_000_000),
            "lab_temp_1700000000000000.wav"
        );
    }

    #[tokio::test]
    async fn test_create_append_finalize() {
        let dir = tempfile::tempdir().unwrap();

        let mut sink = SampleSink::create(dir.path(), "temp1", 42, 1, 10, 2)
            .await
            .unwrap();
        sink.append(&[0x01, 0x02, 0x03, 0x04]).await.unwrap();
        assert_eq!(sink.data_bytes(), 4);

        let path = sink.finalize().await.unwrap();
        assert_eq!(path.file_name().unwrap(), "temp1_42.wav");

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents.len(), wav::HEADER_LEN + 4);
        // Patched sizes
        assert_eq!(
            u32::from_le_bytes(contents[4..8].try_into().unwrap()),
            wav::riff_size(4)
        );
        assert_eq!(u32::from_le_bytes(contents[40..44].try_into().unwrap()), 4);
        // Payload intact
        assert_eq!(&contents[wav::HEADER_LEN..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[tokio::test]
    async fn test_create_makes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("archive");

        let sink = SampleSink::create(&nested, "a", 0, 1, 1, 1).await.unwrap();
        assert!(sink.path().exists());
    }
}
