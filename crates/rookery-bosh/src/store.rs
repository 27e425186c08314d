//! Pending stanza store seam.
//!
//! Somewhere else in the system, stanzas addressed to a user get persisted;
//! a poll cycle fetches and consumes everything currently queued in one
//! operation. An empty result is the expected "nothing yet" outcome that
//! drives the long-poll backoff, not an error.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::stanza::Stanza;
use crate::BindError;

/// Lookup-by-recipient store of stanzas awaiting delivery.
#[async_trait]
pub trait PendingStanzaStore: Send + Sync {
    /// Fetch and consume all stanzas currently addressed to `user`.
    ///
    /// An empty vec means none were queued. Each queued stanza is returned
    /// by exactly one call, ever; consumption is atomic per call.
    async fn find_and_consume(&self, user: &str) -> Result<Vec<Stanza>, BindError>;
}

/// In-process pending store used by the server binary and tests.
#[derive(Debug, Default)]
pub struct MemoryStanzaStore {
    pending: DashMap<String, Vec<Stanza>>,
}

impl MemoryStanzaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stanza for delivery to `user`.
    pub fn enqueue(&self, user: &str, stanza: Stanza) {
        self.pending.entry(user.to_string()).or_default().push(stanza);
    }

    /// Number of stanzas currently queued for `user`.
    pub fn pending_count(&self, user: &str) -> usize {
        self.pending.get(user).map(|queue| queue.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PendingStanzaStore for MemoryStanzaStore {
    async fn find_and_consume(&self, user: &str) -> Result<Vec<Stanza>, BindError> {
        let stanzas = self
            .pending
            .remove(user)
            .map(|(_, queue)| queue)
            .unwrap_or_default();
        if !stanzas.is_empty() {
            debug!(user, count = stanzas.len(), "consumed pending stanzas");
        }
        Ok(stanzas)
    }
}
