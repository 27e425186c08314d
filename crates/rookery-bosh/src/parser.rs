//! Inbound stanza-batch parsing.
//!
//! The request body is a forest of top-level stanzas (no BOSH `<body>`
//! framing; that is stripped by the transport layer before it reaches this
//! core). Parsing never fails the request: malformed XML and an empty
//! payload both degrade to an empty batch, and the request proceeds as if
//! no inbound stanzas were sent.

use minidom::Element;
use tracing::trace;

use crate::stanza::{ns, Stanza};
use crate::telemetry::{Direction, StanzaLog};

/// Known-bad vendor fragment emitted by some clients.
///
/// This is a narrow compatibility patch for one fixed malformed vCard
/// element, not general sanitization.
const VCARD_QUIRK: &str = "<vCard xmlns='vcard-temp'/>";

/// Valid replacement for [`VCARD_QUIRK`].
const VCARD_QUIRK_FIXED: &str = "<vCard xmlns='jabber:vcard-temp'/>";

/// Parse a raw inbound payload into an ordered batch of stanzas.
///
/// A successful non-empty parse logs the raw payload through the stanza
/// telemetry log. Any parse error yields an empty batch; a valid payload
/// with zero stanzas is observably identical to a parse failure.
pub fn parse_batch(raw: &str, log: &StanzaLog) -> Vec<Stanza> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let patched = raw.replace(VCARD_QUIRK, VCARD_QUIRK_FIXED);

    // Wrap the stanza forest in a synthetic root so minidom sees a single
    // document with the client namespace as default.
    let wrapped = format!("<batch xmlns='{}'>{}</batch>", ns::JABBER_CLIENT, patched);
    let root: Element = match wrapped.parse() {
        Ok(root) => root,
        Err(e) => {
            trace!(error = %e, "discarding unparseable inbound payload");
            return Vec::new();
        }
    };

    let stanzas: Vec<Stanza> = root
        .children()
        .map(|child| Stanza::classify(child.clone()))
        .collect();

    if !stanzas.is_empty() {
        log.log_raw(raw, Direction::Receiving);
    }

    stanzas
}
