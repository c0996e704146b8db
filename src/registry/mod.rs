//! Stream registry and lifecycle
//!
//! The registry is the heart of the hub: it owns every named stream's
//! record and coordinates producers, subscribers, the replay cache, and the
//! archive sinks.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StreamRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ streams: BTreeMap<Name,      │
//!                 │   StreamEntry {              │
//!                 │     info, owner,             │
//!                 │     subscribers,             │
//!                 │     received_samples,        │
//!                 │     sink: SampleSink,        │
//!                 │     cache: ReplayCache,      │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!    [Producer]            [Subscriber]           [Subscriber]
//!    write_frame()         outbound queue         outbound queue
//!         │                      ▲                      ▲
//!         └── interleave ── broadcast encoded PublishFrame
//!              + archive
//!              + cache
//! ```
//!
//! Encoded payloads are `bytes::Bytes`, so fan-out and replay hand every
//! receiver a reference-counted clone of one allocation.

pub mod cache;
pub mod config;
pub mod entry;
pub mod store;

pub use cache::{CacheEntry, ReplayCache};
pub use config::RegistryConfig;
pub use entry::StreamEntry;
pub use store::StreamRegistry;
