//! Raw stanza telemetry.
//!
//! Write-only logging of raw transmissions in both directions; nothing
//! downstream consults this output.

use tracing::debug;

/// Direction of a raw transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Payload received from the client
    Receiving,
    /// Payload sent back to the client
    Sending,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Receiving => write!(f, "receiving"),
            Direction::Sending => write!(f, "sending"),
        }
    }
}

/// Fire-and-forget raw stanza logger.
///
/// Emits under the `rookery::stanza` target so raw payload logging can be
/// enabled or silenced independently of the rest of the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StanzaLog;

impl StanzaLog {
    /// Create a new stanza logger.
    pub fn new() -> Self {
        Self
    }

    /// Log a raw payload with its transmission direction.
    pub fn log_raw(&self, payload: &str, direction: Direction) {
        debug!(
            target: "rookery::stanza",
            direction = %direction,
            payload,
            "raw transmission"
        );
    }
}
