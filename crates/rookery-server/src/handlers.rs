//! Concrete per-type stanza handlers.
//!
//! These are the collaborators the core dispatches into: message routing
//! to the recipient's queue, basic iq servicing, and presence application.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use minidom::Element;
use rookery_bosh::{
    ns, BindError, FreshContent, Handled, MemoryStanzaStore, PresenceState, PresenceTracker,
    Stanza, StanzaHandler,
};
use tracing::{debug, warn};

/// Strip domain and resource from a JID-shaped address, leaving the local
/// user identity this node keys everything by.
pub fn bare_user(address: &str) -> &str {
    let without_resource = address.split('/').next().unwrap_or(address);
    without_resource
        .split('@')
        .next()
        .unwrap_or(without_resource)
}

/// Routes inbound messages to their recipient.
///
/// If the recipient has a request in flight on this node, the message goes
/// straight into that request's fresh-content channel and rides back on
/// its response; otherwise it is queued in the pending store for the
/// recipient's next poll.
pub struct RoutingMessageHandler {
    store: Arc<MemoryStanzaStore>,
    active: Arc<DashMap<String, Arc<FreshContent>>>,
}

impl RoutingMessageHandler {
    /// Create a handler over the pending store and the in-flight request
    /// registry.
    pub fn new(
        store: Arc<MemoryStanzaStore>,
        active: Arc<DashMap<String, Arc<FreshContent>>>,
    ) -> Self {
        Self { store, active }
    }
}

#[async_trait]
impl StanzaHandler for RoutingMessageHandler {
    async fn handle(&self, user: &str, stanza: &Stanza) -> Result<Handled, BindError> {
        let Some(to) = stanza.to() else {
            warn!(user, "dropping message without recipient");
            return Ok(Handled::none());
        };
        let recipient = bare_user(to).to_string();

        let mut element = stanza.element().clone();
        if element.attr("from").is_none() {
            element.set_attr("from", user);
        }
        let outbound = Stanza::classify(element);

        if let Some(fresh) = self.active.get(&recipient) {
            debug!(user, recipient, "delivering message via fresh content");
            fresh.push(outbound);
        } else {
            debug!(user, recipient, "queueing message for next poll");
            self.store.enqueue(&recipient, outbound);
        }
        Ok(Handled::none())
    }
}

/// Services the small set of iqs answered synchronously.
///
/// Ping (XEP-0199) and empty vCard gets are answered immediately; a BOSH
/// `<close/>` request terminates the session; everything else is left for
/// asynchronous delivery through the store.
pub struct CoreIqHandler;

#[async_trait]
impl StanzaHandler for CoreIqHandler {
    async fn handle(&self, user: &str, stanza: &Stanza) -> Result<Handled, BindError> {
        let element = stanza.element();

        if element.get_child("close", ns::HTTP_BIND).is_some() {
            debug!(user, "session close requested");
            return Ok(Handled::Terminate);
        }

        let id = stanza.id().unwrap_or("").to_string();

        if element.get_child("ping", ns::PING).is_some() {
            let reply = Element::builder("iq", ns::JABBER_CLIENT)
                .attr("type", "result")
                .attr("id", id)
                .attr("to", stanza.from())
                .build();
            return Ok(Handled::reply(Stanza::classify(reply)));
        }

        if stanza.type_attr() == Some("get") && element.get_child("vCard", ns::VCARD).is_some() {
            let vcard = Element::builder("vCard", ns::VCARD).build();
            let reply = Element::builder("iq", ns::JABBER_CLIENT)
                .attr("type", "result")
                .attr("id", id)
                .append(vcard)
                .build();
            return Ok(Handled::reply(Stanza::classify(reply)));
        }

        // Defer to async delivery via the store.
        Ok(Handled::none())
    }
}

/// Applies presence stanzas to the tracker and echoes state changes.
pub struct TrackerPresenceHandler {
    tracker: Arc<PresenceTracker>,
}

impl TrackerPresenceHandler {
    /// Create a handler over the presence tracker.
    pub fn new(tracker: Arc<PresenceTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl StanzaHandler for TrackerPresenceHandler {
    async fn handle(&self, user: &str, stanza: &Stanza) -> Result<Handled, BindError> {
        let element = stanza.element();

        let state = if stanza.type_attr() == Some("unavailable") {
            PresenceState::Offline
        } else {
            element
                .get_child("show", ns::JABBER_CLIENT)
                .map(|show| PresenceState::from_show(&show.text()))
                .unwrap_or(PresenceState::Online)
        };

        let transition = self.tracker.apply_presence(user, state);
        if !transition.changed() {
            return Ok(Handled::none());
        }

        let mut builder = Element::builder("presence", ns::JABBER_CLIENT).attr("from", user);
        match transition.current {
            PresenceState::Offline => {
                builder = builder.attr("type", "unavailable");
            }
            PresenceState::Online => {}
            show => {
                builder = builder.append(
                    Element::builder("show", ns::JABBER_CLIENT)
                        .append(show.to_string())
                        .build(),
                );
            }
        }
        Ok(Handled::reply(Stanza::classify(builder.build())))
    }
}
