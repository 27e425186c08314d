//! The request-processing engine.
//!
//! One call to [`BindController::handle`] is one HTTP-Bind request cycle:
//! acquire the session lock, refresh presence, parse and dispatch the
//! inbound batch, drain fresh content, optionally long-poll the pending
//! store, and render the accumulated response exactly once.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::RequestContext;
use crate::dispatcher::{DispatchOutcome, StanzaDispatcher};
use crate::fresh::FreshContent;
use crate::lock::SessionLock;
use crate::parser::parse_batch;
use crate::poll::{self, PollConfig, PollState};
use crate::presence::PresenceTracker;
use crate::response::ResponseAccumulator;
use crate::store::PendingStanzaStore;
use crate::telemetry::StanzaLog;
use crate::BindError;

/// Result of one request cycle.
#[derive(Debug)]
pub struct BindOutcome {
    /// Rendered response body (wire form)
    pub body: String,
    /// Whether the session-terminating marker was returned
    pub terminated: bool,
    /// How the long-poll loop ended, if it ran
    pub poll_state: Option<PollState>,
    /// Poll cycles performed
    pub cycles_used: u32,
}

/// Orchestrates the full stanza-batch-in / stanza-batch-out cycle.
pub struct BindController {
    dispatcher: StanzaDispatcher,
    store: Arc<dyn PendingStanzaStore>,
    lock: Arc<dyn SessionLock>,
    presence: Arc<PresenceTracker>,
    poll_config: PollConfig,
    stanza_log: StanzaLog,
}

impl BindController {
    /// Create a controller over its collaborators.
    pub fn new(
        dispatcher: StanzaDispatcher,
        store: Arc<dyn PendingStanzaStore>,
        lock: Arc<dyn SessionLock>,
        presence: Arc<PresenceTracker>,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            dispatcher,
            store,
            lock,
            presence,
            poll_config,
            stanza_log: StanzaLog::new(),
        }
    }

    /// Process one request for `user`.
    ///
    /// `body` is the raw inbound stanza batch (possibly empty); `fresh` is
    /// this request's fresh-content channel. Succeeds even when nothing is
    /// delivered; an empty batch back to the client just means no new data
    /// arrived within the poll window.
    #[instrument(skip(self, body, fresh))]
    pub async fn handle(
        &self,
        user: &str,
        body: &str,
        fresh: &FreshContent,
    ) -> Result<BindOutcome, BindError> {
        let token = self.lock.acquire(user);
        self.presence.refresh();

        let mut ctx = RequestContext::new();
        let mut response = ResponseAccumulator::new();

        let batch = parse_batch(body, &self.stanza_log);
        let outcome = self
            .dispatcher
            .dispatch(user, &batch, &mut ctx, &mut response)
            .await?;
        if outcome == DispatchOutcome::Terminated {
            return self.finish(response, ctx, None);
        }

        self.presence.heartbeat(user);

        if fresh.count() > 0 {
            for stanza in fresh.drain() {
                response.write(stanza);
            }
            // Fresh content is the fastest possible answer; skip polling.
            ctx.long_poll = false;
        }

        let mut poll_state = None;
        if ctx.long_poll_start && response.is_empty() && self.poll_config.max_cycles > 0 {
            let state = poll::run(
                self.store.as_ref(),
                self.lock.as_ref(),
                user,
                token,
                &self.poll_config,
                &mut ctx,
                &mut response,
            )
            .await?;
            poll_state = Some(state);
        }

        self.finish(response, ctx, poll_state)
    }

    fn finish(
        &self,
        response: ResponseAccumulator,
        ctx: RequestContext,
        poll_state: Option<PollState>,
    ) -> Result<BindOutcome, BindError> {
        let terminated = response.is_terminated();
        let stanza_count = response.len();
        let body = response.into_body(&self.stanza_log)?;

        debug!(
            terminated,
            stanza_count,
            cycles = ctx.cycles_used,
            poll_state = ?poll_state,
            "request cycle complete"
        );

        Ok(BindOutcome {
            body,
            terminated,
            poll_state,
            cycles_used: ctx.cycles_used,
        })
    }
}
