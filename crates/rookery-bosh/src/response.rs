//! Outbound response accumulation.
//!
//! Collects the stanzas to flush back to the client, in append order, and
//! supports an early-termination signal: once terminated, nothing further
//! is accepted and the wire form is a terminal marker regardless of what
//! was written before. Serialization happens exactly once, at request end.

use tracing::{debug, trace};

use crate::stanza::{ns, Stanza};
use crate::telemetry::{Direction, StanzaLog};
use crate::BindError;

/// Append-only outbound stanza batch with a terminal state.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    stanzas: Vec<Stanza>,
    terminated: bool,
}

impl ResponseAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stanza to the batch.
    ///
    /// Ignored once the batch is terminated.
    pub fn write(&mut self, stanza: Stanza) {
        if self.terminated {
            trace!(kind = %stanza.kind(), "dropping write to terminated response");
            return;
        }
        self.stanzas.push(stanza);
    }

    /// Mark the batch terminated. Idempotent.
    pub fn terminate(&mut self) {
        if !self.terminated {
            debug!("response marked terminated");
        }
        self.terminated = true;
    }

    /// Whether the terminal marker has been raised.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether no stanzas have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.stanzas.is_empty()
    }

    /// Number of accumulated stanzas.
    pub fn len(&self) -> usize {
        self.stanzas.len()
    }

    /// Render the batch to its BOSH body wire form.
    ///
    /// Consumes the accumulator; this is the single serialization point.
    /// The terminal marker takes precedence over any accumulated content.
    /// A non-empty body is logged through the stanza telemetry log.
    pub fn into_body(self, log: &StanzaLog) -> Result<String, BindError> {
        if self.terminated {
            let body = format!("<body xmlns='{}' type='terminate'/>", ns::HTTP_BIND);
            log.log_raw(&body, Direction::Sending);
            return Ok(body);
        }

        let mut body = format!("<body xmlns='{}'>", ns::HTTP_BIND);
        for stanza in &self.stanzas {
            body.push_str(&stanza.to_xml()?);
        }
        body.push_str("</body>");

        if !self.stanzas.is_empty() {
            log.log_raw(&body, Direction::Sending);
        }
        Ok(body)
    }
}
