//! Message framing over a byte stream
//!
//! Each envelope travels in one binary frame: a big-endian `u32` length
//! prefix followed by that many payload bytes. A zero-length frame is a
//! transport-level liveness ping; readers swallow it without surfacing
//! anything to the dispatch layer.
//!
//! ```text
//! +------------+------------------+
//! | Len(4, BE) | Envelope (Len B) |
//! +------------+------------------+
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DecodeError, Error, Result};

/// Upper bound on a single frame's payload
///
/// A WriteFrame at the maximum channel count would still sit far below
/// this; anything larger is a corrupt or hostile length prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads length-prefixed frames from a byte stream
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next non-keepalive frame
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (EOF on a frame
    /// boundary). EOF inside a frame is an error: the peer died
    /// mid-message.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            let mut len_buf = [0u8; 4];
            let mut filled = 0;
            while filled < 4 {
                let n = self.inner.read(&mut len_buf[filled..]).await?;
                if n == 0 {
                    if filled == 0 {
                        return Ok(None);
                    }
                    return Err(Error::ConnectionClosed);
                }
                filled += n;
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            if len == 0 {
                // Liveness ping
                continue;
            }
            if len > MAX_FRAME_LEN {
                return Err(DecodeError::FrameTooLarge(len).into());
            }

            let mut payload = vec![0u8; len];
            self.inner.read_exact(&mut payload).await?;
            return Ok(Some(Bytes::from(payload)));
        }
    }
}

/// Writes length-prefixed frames to a byte stream
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one payload as a framed message
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.inner
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await?;
        self.inner.write_all(payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write a zero-length liveness ping
    pub async fn write_keepalive(&mut self) -> Result<()> {
        self.inner.write_all(&0u32.to_be_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side, flushing buffered data
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_frame(b"hello").await.unwrap();
        writer.write_frame(b"").await.unwrap(); // explicit empty payload == keepalive
        writer.write_frame(b"world").await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"hello"[..]);
        // The empty frame is swallowed as a keepalive
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"world"[..]);
    }

    #[tokio::test]
    async fn test_keepalive_skipped() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_keepalive().await.unwrap();
        writer.write_keepalive().await.unwrap();
        writer.write_frame(b"data").await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"data"[..]);
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_frame(b"last").await.unwrap();
        drop(writer);

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"last"[..]);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_prefix() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        // Two bytes of a length prefix, then EOF
        client.write_all(&[0x00, 0x00]).await.unwrap();
        drop(client);

        assert!(matches!(
            reader.read_frame().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        let len = (MAX_FRAME_LEN as u32) + 1;
        client.write_all(&len.to_be_bytes()).await.unwrap();

        assert!(matches!(
            reader.read_frame().await,
            Err(Error::Decode(DecodeError::FrameTooLarge(_)))
        ));
    }
}
