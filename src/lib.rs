//! # samplecast
//!
//! A single-process hub for continuous multi-channel sensor sample
//! streams. Authenticated producers push framed samples over a long-lived
//! TCP connection; the hub:
//!
//! - archives every stream to rotated WAV files, compressed in the
//!   background by an external encoder;
//! - fans frames out live to any number of subscribers;
//! - answers short-window replay queries from an in-memory cache.
//!
//! # Quick start
//!
//! ```no_run
//! use samplecast::{AccessTable, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> samplecast::error::Result<()> {
//!     let access = AccessTable::from_path("access_rights.json")?;
//!     let server = Server::new(ServerConfig::default(), access);
//!     server.run().await
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//!   [Producer] ──► Connection ──► StreamRegistry ──► archive (WAV, rotation,
//!                      │               │                      compression)
//!                      │               ├──► ReplayCache (10-minute window)
//!                      ▼               ▼
//!               SessionRegistry   Broadcaster ──► [Subscriber] [Subscriber]
//! ```
//!
//! Each connection runs as its own task, processing envelopes strictly in
//! arrival order; the registries serialize cross-connection mutation while
//! keeping distinct streams independent.

pub mod archive;
pub mod auth;
pub mod client;
pub mod error;
pub mod fanout;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use auth::AccessTable;
pub use error::{Error, Result};
pub use protocol::{Envelope, MessageType, StreamInfo};
pub use registry::{RegistryConfig, StreamRegistry};
pub use server::{Server, ServerConfig};
pub use session::{SessionId, SessionRegistry};
