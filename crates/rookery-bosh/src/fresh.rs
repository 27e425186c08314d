//! Fresh content short-circuit.
//!
//! A per-request container for stanzas generated incidentally while the
//! request is in flight (for example a delivery made by another task on
//! this node), so they bypass the storage round-trip. The controller
//! drains it after dispatch; a non-empty drain means the response returns
//! immediately and the long-poll loop is skipped.

use std::sync::Mutex;

use crate::stanza::Stanza;

/// In-process, request-scoped stanza container.
#[derive(Debug, Default)]
pub struct FreshContent {
    stanzas: Mutex<Vec<Stanza>>,
}

impl FreshContent {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a stanza for delivery with this request's response.
    pub fn push(&self, stanza: Stanza) {
        self.stanzas
            .lock()
            .expect("fresh content mutex poisoned")
            .push(stanza);
    }

    /// Number of stanzas currently held.
    pub fn count(&self) -> usize {
        self.stanzas
            .lock()
            .expect("fresh content mutex poisoned")
            .len()
    }

    /// Take all held stanzas, in push order.
    pub fn drain(&self) -> Vec<Stanza> {
        std::mem::take(
            &mut *self
                .stanzas
                .lock()
                .expect("fresh content mutex poisoned"),
        )
    }
}
