//! Stanza data model.
//!
//! A [`Stanza`] is one protocol-level unit of exchange, classified into a
//! closed set of kinds. New kinds are added by extending the enum and every
//! match over it, never via open-ended type tests.

use minidom::Element;

use crate::BindError;

/// Namespace URIs used by the transport.
pub mod ns {
    /// XMPP client namespace
    pub const JABBER_CLIENT: &str = "jabber:client";
    /// BOSH body namespace
    pub const HTTP_BIND: &str = "http://jabber.org/protocol/httpbind";
    /// XMPP ping namespace (XEP-0199)
    pub const PING: &str = "urn:xmpp:ping";
    /// vCard namespace (XEP-0054, jabber-prefixed vendor form)
    pub const VCARD: &str = "jabber:vcard-temp";
}

/// Stanza kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    /// Message stanza
    Message,
    /// Info/query stanza
    Iq,
    /// Presence stanza
    Presence,
    /// Anything else; silently ignored by the dispatcher
    Unknown,
}

impl std::fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StanzaKind::Message => write!(f, "message"),
            StanzaKind::Iq => write!(f, "iq"),
            StanzaKind::Presence => write!(f, "presence"),
            StanzaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A parsed stanza, immutable once classified.
///
/// The payload is the underlying XML element; addressing is read through
/// the `to`/`from` attributes.
#[derive(Debug, Clone)]
pub enum Stanza {
    /// Message stanza
    Message(Element),
    /// Info/query stanza
    Iq(Element),
    /// Presence stanza
    Presence(Element),
    /// Unrecognized element
    Unknown(Element),
}

impl Stanza {
    /// Classify an element into a stanza by its name and namespace.
    pub fn classify(element: Element) -> Self {
        if element.is("message", ns::JABBER_CLIENT) {
            Stanza::Message(element)
        } else if element.is("iq", ns::JABBER_CLIENT) {
            Stanza::Iq(element)
        } else if element.is("presence", ns::JABBER_CLIENT) {
            Stanza::Presence(element)
        } else {
            Stanza::Unknown(element)
        }
    }

    /// Get the stanza kind.
    pub fn kind(&self) -> StanzaKind {
        match self {
            Stanza::Message(_) => StanzaKind::Message,
            Stanza::Iq(_) => StanzaKind::Iq,
            Stanza::Presence(_) => StanzaKind::Presence,
            Stanza::Unknown(_) => StanzaKind::Unknown,
        }
    }

    /// Borrow the underlying element.
    pub fn element(&self) -> &Element {
        match self {
            Stanza::Message(e) | Stanza::Iq(e) | Stanza::Presence(e) | Stanza::Unknown(e) => e,
        }
    }

    /// Consume the stanza, returning the underlying element.
    pub fn into_element(self) -> Element {
        match self {
            Stanza::Message(e) | Stanza::Iq(e) | Stanza::Presence(e) | Stanza::Unknown(e) => e,
        }
    }

    /// The `to` attribute, if present.
    pub fn to(&self) -> Option<&str> {
        self.element().attr("to")
    }

    /// The `from` attribute, if present.
    pub fn from(&self) -> Option<&str> {
        self.element().attr("from")
    }

    /// The `id` attribute, if present.
    pub fn id(&self) -> Option<&str> {
        self.element().attr("id")
    }

    /// The `type` attribute, if present.
    pub fn type_attr(&self) -> Option<&str> {
        self.element().attr("type")
    }

    /// Serialize the stanza to its XML text form.
    pub fn to_xml(&self) -> Result<String, BindError> {
        element_to_string(self.element())
    }
}

/// Convert a minidom Element to an XML string.
pub fn element_to_string(element: &Element) -> Result<String, BindError> {
    let mut output = Vec::new();
    element
        .write_to(&mut output)
        .map_err(|e| BindError::xml(format!("failed to serialize element: {}", e)))?;
    String::from_utf8(output).map_err(|e| BindError::xml(format!("invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Element {
        xml.parse().unwrap()
    }

    #[test]
    fn classifies_core_stanza_kinds() {
        let msg = Stanza::classify(parse(
            "<message xmlns='jabber:client' to='bob@rookery.im'><body>hi</body></message>",
        ));
        assert_eq!(msg.kind(), StanzaKind::Message);

        let iq = Stanza::classify(parse("<iq xmlns='jabber:client' type='get' id='p1'/>"));
        assert_eq!(iq.kind(), StanzaKind::Iq);

        let presence = Stanza::classify(parse("<presence xmlns='jabber:client'/>"));
        assert_eq!(presence.kind(), StanzaKind::Presence);
    }

    #[test]
    fn foreign_namespace_is_unknown() {
        let el = Stanza::classify(parse("<message xmlns='jabber:server' to='x'/>"));
        assert_eq!(el.kind(), StanzaKind::Unknown);

        let el = Stanza::classify(parse("<open xmlns='urn:ietf:params:xml:ns:xmpp-framing'/>"));
        assert_eq!(el.kind(), StanzaKind::Unknown);
    }

    #[test]
    fn addressing_accessors() {
        let msg = Stanza::classify(parse(
            "<message xmlns='jabber:client' to='bob@rookery.im' from='alice@rookery.im' id='m1'/>",
        ));
        assert_eq!(msg.to(), Some("bob@rookery.im"));
        assert_eq!(msg.from(), Some("alice@rookery.im"));
        assert_eq!(msg.id(), Some("m1"));
    }

    #[test]
    fn serializes_back_to_xml() {
        let msg = Stanza::classify(parse(
            "<message xmlns='jabber:client' to='bob@rookery.im'><body>hi</body></message>",
        ));
        let xml = msg.to_xml().unwrap();
        assert!(xml.contains("to='bob@rookery.im'") || xml.contains("to=\"bob@rookery.im\""));
        assert!(xml.contains("<body>hi</body>"));
    }
}
