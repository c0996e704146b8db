//! Session registry
//!
//! One session exists per live connection. The registry owns each session's
//! outbound byte queue, its connection-scoped alias table, and its
//! stream-list subscription flag. Sessions are addressed by an opaque
//! [`SessionId`], never by the transport object, so an in-flight message
//! that races a disconnect degrades to a no-op instead of touching a dead
//! connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

/// Opaque identity of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Rehydrate an id from its raw value (logs, tests)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session state owned by the registry
struct SessionHandle {
    /// Outbound queue drained by the connection's writer task
    outbound: mpsc::UnboundedSender<Bytes>,
    /// Producer-chosen alias -> stream name, scoped to this session
    aliases: HashMap<u32, String>,
    /// Whether this session receives stream announcements
    list_subscribed: bool,
}

/// Registry of live sessions
///
/// All operations on a removed session id are silent no-ops: socket-close
/// notification and in-flight message processing are not ordered.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new session around its outbound queue
    pub async fn create(&self, outbound: mpsc::UnboundedSender<Bytes>) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = SessionHandle {
            outbound,
            aliases: HashMap::new(),
            list_subscribed: false,
        };
        self.sessions.write().await.insert(id, handle);
        tracing::debug!(session_id = %id, "Session created");
        id
    }

    /// Remove a session, dropping its aliases and list subscription
    ///
    /// The caller is responsible for also detaching the session from every
    /// stream's subscriber set (`StreamRegistry::drop_session`).
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Bind `alias -> name` in the session's alias table
    pub async fn bind_alias(&self, id: SessionId, alias: u32, name: &str) {
        if let Some(handle) = self.sessions.write().await.get_mut(&id) {
            handle.aliases.insert(alias, name.to_owned());
        }
    }

    /// Resolve a session-scoped alias to a stream name
    pub async fn resolve_alias(&self, id: SessionId, alias: u32) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&id)
            .and_then(|handle| handle.aliases.get(&alias).cloned())
    }

    /// Drop one alias binding
    pub async fn unbind_alias(&self, id: SessionId, alias: u32) {
        if let Some(handle) = self.sessions.write().await.get_mut(&id) {
            handle.aliases.remove(&alias);
        }
    }

    /// Set the stream-announcement subscription flag
    pub async fn set_list_subscribed(&self, id: SessionId, subscribed: bool) {
        if let Some(handle) = self.sessions.write().await.get_mut(&id) {
            handle.list_subscribed = subscribed;
        }
    }

    /// Ids of every session subscribed to stream announcements
    pub async fn list_subscribed_ids(&self) -> Vec<SessionId> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.list_subscribed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Push a payload onto a session's outbound queue
    ///
    /// Returns false if the session is gone or its connection's writer has
    /// stopped; callers treat that as a skip, not an error.
    pub async fn send(&self, id: SessionId, payload: Bytes) -> bool {
        match self.sessions.read().await.get(&id) {
            Some(handle) => handle.outbound.send(payload).is_ok(),
            None => false,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
