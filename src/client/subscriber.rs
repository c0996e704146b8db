//! Stream subscriber client
//!
//! Receives live frames, stream announcements, and replay results from a
//! hub.

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::{Envelope, FrameReader, FrameWriter};

/// Sample stream subscriber
///
/// # Example
/// ```no_run
/// use samplecast::client::Subscriber;
/// use samplecast::protocol::Envelope;
///
/// # async fn example() -> samplecast::error::Result<()> {
/// let mut subscriber = Subscriber::connect("127.0.0.1:8090").await?;
/// subscriber.subscribe("temp1").await?;
/// while let Some(envelope) = subscriber.next().await? {
///     if let Envelope::PublishFrame { channels, .. } = envelope {
///         println!("{} samples", channels[0].len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Subscriber {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl Subscriber {
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

    /// Subscribe to a stream's live frames
    pub async fn subscribe(&mut self, name: &str) -> Result<()> {
        self.send(&Envelope::Subscribe {
            name: name.to_owned(),
        })
        .await
    }

    /// Stop receiving a stream's live frames
    pub async fn unsubscribe(&mut self, name: &str) -> Result<()> {
        self.send(&Envelope::Unsubscribe {
            name: name.to_owned(),
        })
        .await
    }

    /// Opt in to stream announcements (current snapshot + future opens)
    pub async fn subscribe_stream_list(&mut self) -> Result<()> {
        self.send(&Envelope::SubscribeStreamList).await
    }

    /// Request the cached recent frames of a stream
    ///
    /// The replay arrives as PublishFrame envelopes in ascending timestamp
    /// order, terminated by a ResultDone for the queried name.
    pub async fn query_cache(&mut self, name: &str) -> Result<()> {
        self.send(&Envelope::QueryCache {
            name: name.to_owned(),
        })
        .await
    }

    /// Receive the next server envelope
    ///
    /// Returns `None` when the server closes the connection.
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
