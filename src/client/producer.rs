//! Stream producer client
//!
//! High-level API for pushing sample streams into a hub over one
//! long-lived connection.

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::{Envelope, FrameReader, FrameWriter, StreamInfo};

/// Sample stream producer
///
/// # Example
/// ```no_run
/// use samplecast::client::Producer;
/// use samplecast::protocol::StreamInfo;
///
/// # async fn example(info: StreamInfo) -> samplecast::error::Result<()> {
/// let mut producer = Producer::connect("127.0.0.1:8090").await?;
/// producer.open_stream(1, "secret", info).await?;
/// producer.write_frame(1, vec![vec![100, 102, 101]]).await?;
/// producer.close_stream(1).await?;
/// # Ok(())
/// # }
/// ```
pub struct Producer {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl Producer {
    /// Connect to a hub
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        })
    }

    /// Open (or replace) the stream described by `info`, bound to `alias`
    pub async fn open_stream(&mut self, alias: u32, password: &str, info: StreamInfo) -> Result<()> {
        self.send(&Envelope::OpenStream {
            alias,
            password: password.to_owned(),
            info,
        })
        .await
    }

    /// Append one batch of samples per channel
    pub async fn write_frame(&mut self, alias: u32, channels: Vec<Vec<i32>>) -> Result<()> {
        self.send(&Envelope::WriteFrame { alias, channels }).await
    }

    /// Finish writing the stream bound to `alias`
    pub async fn close_stream(&mut self, alias: u32) -> Result<()> {
        self.send(&Envelope::CloseStream { alias }).await
    }

    /// Receive the next server envelope, if any
    ///
    /// Producers normally receive nothing unless they also subscribe; this
    /// surfaces announcements for producers that do.
    pub async fn next(&mut self) -> Result<Option<Envelope>> {
        match self.reader.read_frame().await? {
            Some(payload) => Ok(Some(Envelope::decode(payload)?)),
            None => Ok(None),
        }
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.writer.write_frame(&envelope.encode()).await
    }
}
