//! Per-type stanza handler seam.
//!
//! Handlers are the boundary to the rest of the system: message delivery,
//! iq servicing, and presence processing all live behind [`StanzaHandler`].
//! A handler either produces immediate reply stanzas or asks for session
//! termination; internal failures fail the whole request.

use async_trait::async_trait;

use crate::stanza::Stanza;
use crate::BindError;

/// Verdict returned by a stanza handler.
///
/// Termination is an explicit variant rather than an error: it is a
/// deliberate control-flow shortcut that finalizes the response early and
/// returns successfully with a terminal marker.
#[derive(Debug)]
pub enum Handled {
    /// Zero or more immediate reply stanzas.
    ///
    /// Message handlers are expected to return none; iq handlers at most
    /// one; presence handlers any number. The dispatcher enforces the
    /// per-kind consequences.
    Replies(Vec<Stanza>),

    /// End the logical session immediately.
    Terminate,
}

impl Handled {
    /// No immediate reply.
    pub fn none() -> Self {
        Handled::Replies(Vec::new())
    }

    /// Exactly one immediate reply.
    pub fn reply(stanza: Stanza) -> Self {
        Handled::Replies(vec![stanza])
    }
}

/// A handler for one stanza kind.
///
/// Handlers execute sequentially, in batch order; later stanzas may depend
/// on state mutated by earlier ones.
#[async_trait]
pub trait StanzaHandler: Send + Sync {
    /// Handle one stanza on behalf of `user`.
    async fn handle(&self, user: &str, stanza: &Stanza) -> Result<Handled, BindError>;
}
