//! Fan-out broadcaster
//!
//! Delivers one encoded payload to a set of sessions by pushing a cheap
//! `Bytes` clone onto each session's outbound queue. Sends are best-effort:
//! a session whose connection already closed is skipped silently. Delivery
//! order across subscribers in one call is unspecified, but successive
//! publishes to the same subscriber stay FIFO because each connection
//! drains a single queue.

use std::sync::Arc;

use bytes::Bytes;

use crate::session::{SessionId, SessionRegistry};

/// Best-effort payload fan-out over session outbound queues
#[derive(Clone)]
pub struct Broadcaster {
    sessions: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Deliver `payload` to every listed session that is still alive
    ///
    /// Returns the number of sessions actually reached.
    pub async fn publish_to<I>(&self, ids: I, payload: &Bytes) -> usize
    where
        I: IntoIterator<Item = SessionId>,
    {
        let mut delivered = 0;
        for id in ids {
            if self.sessions.send(id, payload.clone()).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver `payload` to every list-subscribed session
    pub async fn publish_list(&self, payload: &Bytes) -> usize {
        let ids = self.sessions.list_subscribed_ids().await;
        self.publish_to(ids, payload).await
    }
}
