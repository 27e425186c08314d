//! # rookery-bosh
//!
//! Server-side core of an HTTP-Bind (BOSH-style) transport that carries an
//! XMPP stanza stream over HTTP long-polling request/response cycles, for
//! clients that cannot hold a persistent socket.
//!
//! Each HTTP request may carry a batch of outbound stanzas from the client,
//! which are parsed, classified, and dispatched to per-type handlers, and
//! may then block for a bounded time waiting for new inbound stanzas
//! addressed to the user, which are flushed back as the response body.
//!
//! ## Architecture
//!
//! - **Parser**: raw payload -> ordered batch of typed [`Stanza`] records
//! - **Dispatcher**: sequential per-kind routing to handler trait objects
//! - **Session lock**: last-writer-wins mutual exclusion per user, so only
//!   the newest request for a given identity keeps polling
//! - **Long-poll loop**: bounded retry loop over the pending-stanza store
//!   with cooperative backoff between attempts
//! - **Response accumulator**: ordered outbound batch with an idempotent
//!   early-termination marker
//!
//! BOSH session framing (`rid`/`sid` negotiation, session attributes) and
//! durable stanza persistence are external concerns; this crate only
//! implements the stanza-batch-in / stanza-batch-out request cycle.

pub mod controller;
pub mod dispatcher;
pub mod fresh;
pub mod handler;
pub mod lock;
pub mod parser;
pub mod poll;
pub mod presence;
pub mod response;
pub mod stanza;
pub mod store;
pub mod telemetry;

mod context;
mod error;

pub use context::RequestContext;
pub use controller::{BindController, BindOutcome};
pub use dispatcher::{DispatchOutcome, StanzaDispatcher};
pub use error::BindError;
pub use fresh::FreshContent;
pub use handler::{Handled, StanzaHandler};
pub use lock::{LockToken, MemoryLock, SessionLock};
pub use parser::parse_batch;
pub use poll::{PollConfig, PollState};
pub use presence::{
    PresenceConfig, PresenceRecord, PresenceState, PresenceTracker, PresenceTransition,
};
pub use response::ResponseAccumulator;
pub use stanza::{ns, Stanza, StanzaKind};
pub use store::{MemoryStanzaStore, PendingStanzaStore};
pub use telemetry::{Direction, StanzaLog};
