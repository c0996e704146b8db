//! Connection lifecycle handler
//!
//! One `Connection` runs per accepted socket. It owns the session for that
//! socket: inbound envelopes are decoded and dispatched strictly in arrival
//! order, a writer task drains the session's outbound queue (and emits
//! liveness pings), and teardown detaches the session from every registry.
//!
//! Error policy (matching the crate-wide taxonomy):
//! - decode or I/O failure closes the connection immediately;
//! - auth/validation failures arm a delayed close: the connection keeps
//!   processing until the grace deadline so queued replies can flush;
//! - unknown-name lookups never surface here at all.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::{Envelope, FrameReader, FrameWriter};
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::session::{SessionId, SessionRegistry};

/// Handler for one client connection
pub struct Connection<S> {
    stream: S,
    peer_addr: SocketAddr,
    config: ServerConfig,
    sessions: Arc<SessionRegistry>,
    registry: Arc<StreamRegistry>,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> Connection<S> {
    pub fn new(
        stream: S,
        peer_addr: SocketAddr,
        config: ServerConfig,
        sessions: Arc<SessionRegistry>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            stream,
            peer_addr,
            config,
            sessions,
            registry,
        }
    }

    /// Drive the connection until it closes
    ///
    /// Always tears the session down before returning, whatever the exit
    /// path; the returned error is for logging only.
    pub async fn run(self) -> Result<()> {
        let Self {
            stream,
            peer_addr,
            config,
            sessions,
            registry,
        } = self;

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let session_id = sessions.create(outbound_tx).await;
        tracing::debug!(session_id = %session_id, peer = %peer_addr, "Connection established");

        let writer_handle = tokio::spawn(writer_task(
            FrameWriter::new(write_half),
            outbound_rx,
            config.ping_interval,
        ));

        let result = read_loop(&mut reader, session_id, &config, &registry).await;

        // Teardown: detach the session everywhere. Dropping the session
        // handle closes the outbound queue, so the writer task flushes what
        // is already queued and then shuts the socket down.
        registry.drop_session(session_id).await;
        let _ = writer_handle.await;

        tracing::debug!(session_id = %session_id, peer = %peer_addr, "Connection closed");
        result
    }
}

/// Drain the outbound queue onto the socket, interleaving liveness pings
async fn writer_task<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    ping_interval: std::time::Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    ping.tick().await; // interval fires immediately; skip that one

    loop {
        tokio::select! {
            maybe = outbound.recv() => match maybe {
                Some(payload) => {
                    if writer.write_frame(&payload).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = writer.shutdown().await;
                    break;
                }
            },
            _ = ping.tick() => {
                if writer.write_keepalive().await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    session_id: SessionId,
    config: &ServerConfig,
    registry: &StreamRegistry,
) -> Result<()> {
    // Armed by the first policy failure; messages keep flowing until it fires.
    let mut close_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = async { tokio::time::sleep_until(close_at.unwrap()).await }, if close_at.is_some() => {
                tracing::debug!(session_id = %session_id, "Grace delay elapsed, closing connection");
                return Ok(());
            }
            frame = reader.read_frame() => {
                let payload = match frame {
                    Ok(Some(payload)) => payload,
                    Ok(None) => return Ok(()), // peer closed cleanly
                    Err(e) => return Err(e),
                };

                let envelope = match Envelope::decode(payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Malformed envelope, closing connection");
                        return Err(e.into());
                    }
                };

                if let Err(e) = dispatch(session_id, envelope, registry).await {
                    match e {
                        Error::Stream(policy) => {
                            tracing::warn!(
                                session_id = %session_id,
                                kind = ?policy.kind(),
                                error = %policy,
                                "Policy failure, closing after grace delay"
                            );
                            close_at.get_or_insert_with(|| Instant::now() + config.close_grace);
                        }
                        fatal => return Err(fatal),
                    }
                }
            }
        }
    }
}

/// Route one decoded envelope to its registry operation
async fn dispatch(
    session_id: SessionId,
    envelope: Envelope,
    registry: &StreamRegistry,
) -> Result<()> {
    match envelope {
        Envelope::OpenStream {
            alias,
            password,
            info,
        } => registry.open_stream(session_id, alias, &password, info).await,
        Envelope::CloseStream { alias } => registry.close_stream(session_id, alias).await,
        Envelope::WriteFrame { alias, channels } => {
            registry.write_frame(session_id, alias, channels).await
        }
        Envelope::Subscribe { name } => {
            registry.subscribe(session_id, &name).await;
            Ok(())
        }
        Envelope::Unsubscribe { name } => {
            registry.unsubscribe(session_id, &name).await;
            Ok(())
        }
        Envelope::SubscribeStreamList => {
            registry.subscribe_stream_list(session_id).await;
            Ok(())
        }
        Envelope::QueryCache { name } => {
            registry.query_cache(session_id, &name).await;
            Ok(())
        }
        // Server-to-client kinds arriving from a client are dropped, like
        // any other message kind the original dispatcher had no case for.
        Envelope::PublishStream { .. } | Envelope::PublishFrame { .. } | Envelope::ResultDone { .. } => {
            tracing::debug!(session_id = %session_id, "Ignoring server-only message from client");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::AccessTable;
    use crate::error::DecodeError;
    use crate::protocol::StreamInfo;
    use crate::registry::RegistryConfig;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    struct Harness {
        sessions: Arc<SessionRegistry>,
        registry: Arc<StreamRegistry>,
        config: ServerConfig,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionRegistry::new());
        let registry = Arc::new(StreamRegistry::new(
            Arc::clone(&sessions),
            AccessTable::from_pairs([("temp1", "x")]),
            RegistryConfig::default().storage_dir(dir.path()),
        ));
        let config = ServerConfig::default()
            .close_grace(Duration::from_millis(50))
            .ping_interval(Duration::from_secs(60));
        Harness {
            sessions,
            registry,
            config,
            _dir: dir,
        }
    }

    fn info() -> StreamInfo {
        StreamInfo {
            name: "temp1".into(),
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

    #[tokio::test]
    async fn test_decode_error_is_fatal() {
        let h = harness();
        let (client, server) = tokio::io::duplex(4096);
        let connection = Connection::new(
            server,
            test_addr(),
            h.config.clone(),
            Arc::clone(&h.sessions),
            Arc::clone(&h.registry),
        );
        let task = tokio::spawn(connection.run());

        let mut writer = FrameWriter::new(client);
        writer.write_frame(&[0xFF, 0x00, 0x01]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::UnknownTag(0xFF)))
        ));
        assert_eq!(h.sessions.session_count().await, 0, "session torn down");
    }

    #[tokio::test]
    async fn test_policy_failure_closes_after_grace() {
        let h = harness();
        let (client, server) = tokio::io::duplex(4096);
        let connection = Connection::new(
            server,
            test_addr(),
            h.config.clone(),
            Arc::clone(&h.sessions),
            Arc::clone(&h.registry),
        );
        let task = tokio::spawn(connection.run());

        let (read_half, write_half) = tokio::io::split(client);
        let mut writer = FrameWriter::new(write_half);
        let mut reader = FrameReader::new(read_half);

        let open = Envelope::OpenStream {
            alias: 1,
            password: "wrong".into(),
            info: info(),
        };
        writer.write_frame(&open.encode()).await.unwrap();

        // The connection still processes messages during the grace window:
        // a stream-list subscription arriving right after the bad open gets
        // no announcements (nothing is open) but does not error.
        writer
            .write_frame(&Envelope::SubscribeStreamList.encode())
            .await
            .unwrap();

        // Grace delay elapses, server closes: our reader sees EOF.
        assert!(reader.read_frame().await.unwrap().is_none());

        let result = task.await.unwrap();
        assert!(result.is_ok(), "delayed close is an orderly exit");
        assert_eq!(h.registry.stream_count().await, 0);
        assert_eq!(h.sessions.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_valid_session_flow_over_wire() {
        let h = harness();

        // Producer connection
        let (producer_io, server_io) = tokio::io::duplex(16 * 1024);
        let producer_conn = Connection::new(
            server_io,
            test_addr(),
            h.config.clone(),
            Arc::clone(&h.sessions),
            Arc::clone(&h.registry),
        );
        tokio::spawn(producer_conn.run());

        // Viewer connection
        let (viewer_io, server_io) = tokio::io::duplex(16 * 1024);
        let viewer_conn = Connection::new(
            server_io,
            test_addr(),
            h.config.clone(),
            Arc::clone(&h.sessions),
            Arc::clone(&h.registry),
        );
        tokio::spawn(viewer_conn.run());

        let (_, producer_write) = tokio::io::split(producer_io);
        let mut producer = FrameWriter::new(producer_write);
        let (viewer_read, viewer_write) = tokio::io::split(viewer_io);
        let mut viewer_writer = FrameWriter::new(viewer_write);
        let mut viewer_reader = FrameReader::new(viewer_read);

        producer
            .write_frame(
                &Envelope::OpenStream {
                    alias: 1,
                    password: "x".into(),
                    info: info(),
                }
                .encode(),
            )
            .await
            .unwrap();

        // Wait until the open landed, then subscribe from the viewer
        while h.registry.stream_count().await == 0 {
            tokio::task::yield_now().await;
        }
        viewer_writer
            .write_frame(&Envelope::Subscribe { name: "temp1".into() }.encode())
            .await
            .unwrap();
        while h
            .registry
            .stream_stats("temp1")
            .await
            .map(|s| s.subscriber_count)
            .unwrap_or(0)
            == 0
        {
            tokio::task::yield_now().await;
        }

        producer
            .write_frame(
                &Envelope::WriteFrame {
                    alias: 1,
                    channels: vec![vec![100, 102, 101]],
                }
                .encode(),
            )
            .await
            .unwrap();

        let frame = viewer_reader.read_frame().await.unwrap().unwrap();
        match Envelope::decode(frame).unwrap() {
            Envelope::PublishFrame {
                name,
                offset,
                channels,
                ..
            } => {
                assert_eq!(name, "temp1");
                assert_eq!(offset, 0);
                assert_eq!(channels, vec![vec![100, 102, 101]]);
            }
            other => panic!("unexpected envelope: {:?}", other),
        }

        let stats = h.registry.stream_stats("temp1").await.unwrap();
        assert_eq!(stats.received_samples, 3);
    }
}
