//! Error types for the HTTP-Bind core.

use thiserror::Error;

/// Errors surfaced by the request-processing engine.
///
/// Session termination is deliberately *not* an error; it is an explicit
/// control-flow verdict carried through the dispatch return path. Store
/// misses ("no pending stanzas") are likewise not errors; they drive the
/// long-poll backoff. What remains here are genuine collaborator failures,
/// which fail the whole request unwrapped.
#[derive(Debug, Error)]
pub enum BindError {
    /// A stanza handler failed internally
    #[error("handler error: {0}")]
    Handler(String),

    /// The pending-stanza store failed (beyond a simple miss)
    #[error("store error: {0}")]
    Store(String),

    /// XML serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BindError {
    /// Create a new handler error.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Create a new store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new XML error.
    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
