//! Stanza batch dispatch.
//!
//! Routes each stanza of a parsed batch to the handler for its kind,
//! sequentially and in order, collecting immediate replies into the
//! response accumulator. A termination verdict stops the batch on the
//! spot; remaining stanzas are dropped.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::context::RequestContext;
use crate::handler::{Handled, StanzaHandler};
use crate::response::ResponseAccumulator;
use crate::stanza::{Stanza, StanzaKind};
use crate::BindError;

/// Outcome of dispatching a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every stanza in the batch was processed.
    Completed,
    /// A handler requested session termination; the rest of the batch was
    /// dropped and the response is terminated.
    Terminated,
}

/// Routes parsed stanzas to per-kind handlers.
pub struct StanzaDispatcher {
    message: Arc<dyn StanzaHandler>,
    iq: Arc<dyn StanzaHandler>,
    presence: Arc<dyn StanzaHandler>,
}

impl StanzaDispatcher {
    /// Create a dispatcher over the three per-kind handlers.
    pub fn new(
        message: Arc<dyn StanzaHandler>,
        iq: Arc<dyn StanzaHandler>,
        presence: Arc<dyn StanzaHandler>,
    ) -> Self {
        Self {
            message,
            iq,
            presence,
        }
    }

    /// Dispatch a batch in order.
    ///
    /// Handler failures propagate as the request's failure; no retries.
    pub async fn dispatch(
        &self,
        user: &str,
        batch: &[Stanza],
        ctx: &mut RequestContext,
        response: &mut ResponseAccumulator,
    ) -> Result<DispatchOutcome, BindError> {
        for stanza in batch {
            let verdict = match stanza {
                Stanza::Message(_) => self.message.handle(user, stanza).await?,
                Stanza::Iq(_) => self.iq.handle(user, stanza).await?,
                Stanza::Presence(_) => self.presence.handle(user, stanza).await?,
                Stanza::Unknown(element) => {
                    trace!(name = element.name(), "ignoring unknown stanza");
                    continue;
                }
            };

            let replies = match verdict {
                Handled::Terminate => {
                    debug!(user, kind = %stanza.kind(), "handler requested termination");
                    response.terminate();
                    return Ok(DispatchOutcome::Terminated);
                }
                Handled::Replies(replies) => replies,
            };

            match stanza.kind() {
                StanzaKind::Message => {
                    // No reply is expected from message handling.
                    if !replies.is_empty() {
                        warn!(
                            user,
                            count = replies.len(),
                            "message handler produced replies; dropping"
                        );
                    }
                }
                StanzaKind::Iq => {
                    if !replies.is_empty() {
                        ctx.long_poll = false;
                        for reply in replies {
                            response.write(reply);
                        }
                    }
                }
                StanzaKind::Presence => {
                    if !replies.is_empty() {
                        // A presence exchange primes the session; skip the
                        // first long-poll cycle entirely.
                        ctx.long_poll = false;
                        ctx.long_poll_start = false;
                        for reply in replies {
                            response.write(reply);
                        }
                    }
                }
                // Unknown stanzas were skipped before any handler ran.
                StanzaKind::Unknown => {}
            }
        }

        Ok(DispatchOutcome::Completed)
    }
}
