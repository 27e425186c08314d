//! The bounded long-poll retry loop.
//!
//! Polls the pending-stanza store for the user, backing off between
//! attempts, until data is found, the cycle budget runs out, or the
//! session lock is lost. The backoff is a cooperative `tokio` sleep, so
//! other requests are never starved. The backoff duration and max-cycle
//! product bound the worst-case wall-clock duration of a request; a
//! caller-side HTTP timeout should sit safely above that.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::lock::{LockToken, SessionLock};
use crate::response::ResponseAccumulator;
use crate::store::PendingStanzaStore;
use crate::BindError;

/// Long-poll tuning.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between store queries
    pub backoff: Duration,
    /// Maximum store queries per request; 0 disables long polling
    pub max_cycles: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            max_cycles: 10,
        }
    }
}

/// Terminal state of one long-poll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// The store produced stanzas; they were written to the response
    Found,
    /// Cycle budget or the long-poll flag ran out with nothing found
    Exhausted,
    /// A newer request for the same user superseded this one
    LockLost,
}

/// Run the retry loop until data is found or a bound trips.
///
/// Exceeding the cycle budget or losing the lock is a soft exit: whatever
/// was accumulated is returned and the request still succeeds. Only a
/// genuine store failure is an error.
pub async fn run(
    store: &dyn PendingStanzaStore,
    lock: &dyn SessionLock,
    user: &str,
    token: LockToken,
    config: &PollConfig,
    ctx: &mut RequestContext,
    response: &mut ResponseAccumulator,
) -> Result<PollState, BindError> {
    loop {
        ctx.cycles_used += 1;
        trace!(user, cycle = ctx.cycles_used, "polling pending store");

        let stanzas = store.find_and_consume(user).await?;
        if !stanzas.is_empty() {
            debug!(
                user,
                count = stanzas.len(),
                cycle = ctx.cycles_used,
                "poll found stanzas"
            );
            for stanza in stanzas {
                response.write(stanza);
            }
            return Ok(PollState::Found);
        }

        sleep(config.backoff).await;

        // Exit conditions, evaluated in order: cycle budget, the long-poll
        // flag, then lock liveness.
        if ctx.cycles_used >= config.max_cycles || !ctx.long_poll {
            debug!(user, cycles = ctx.cycles_used, "poll budget exhausted");
            return Ok(PollState::Exhausted);
        }
        if !lock.still_locked(user, token) {
            debug!(user, cycles = ctx.cycles_used, "poll superseded by newer request");
            return Ok(PollState::LockLost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLock;
    use crate::store::MemoryStanzaStore;
    use crate::telemetry::StanzaLog;
    use minidom::Element;

    fn message(body: &str) -> crate::Stanza {
        let xml = format!("<message xmlns='jabber:client'><body>{}</body></message>", body);
        crate::Stanza::classify(xml.parse::<Element>().unwrap())
    }

    fn config(backoff_ms: u64, max_cycles: u32) -> PollConfig {
        PollConfig {
            backoff: Duration::from_millis(backoff_ms),
            max_cycles,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finds_stanzas_on_first_cycle() {
        let store = MemoryStanzaStore::new();
        let lock = MemoryLock::new();
        store.enqueue("alice", message("hello"));
        let token = lock.acquire("alice");

        let mut ctx = RequestContext::new();
        let mut response = ResponseAccumulator::new();
        let state = run(
            &store,
            &lock,
            "alice",
            token,
            &config(100, 5),
            &mut ctx,
            &mut response,
        )
        .await
        .unwrap();

        assert_eq!(state, PollState::Found);
        assert_eq!(ctx.cycles_used, 1);
        assert_eq!(response.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_cycles_with_empty_store() {
        let store = MemoryStanzaStore::new();
        let lock = MemoryLock::new();
        let token = lock.acquire("alice");

        let backoff = Duration::from_secs(1);
        let max_cycles = 4;
        let start = tokio::time::Instant::now();

        let mut ctx = RequestContext::new();
        let mut response = ResponseAccumulator::new();
        let state = run(
            &store,
            &lock,
            "alice",
            token,
            &PollConfig { backoff, max_cycles },
            &mut ctx,
            &mut response,
        )
        .await
        .unwrap();

        assert_eq!(state, PollState::Exhausted);
        assert_eq!(ctx.cycles_used, max_cycles);
        assert!(response.is_empty());

        // One backoff per cycle with the paused clock.
        let elapsed = start.elapsed();
        assert!(elapsed >= backoff * (max_cycles - 1));
        assert!(elapsed <= backoff * max_cycles);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_lock_is_superseded() {
        let store = MemoryStanzaStore::new();
        let lock = MemoryLock::new();
        let token = lock.acquire("alice");
        // Newer request takes the lock before the loop starts.
        let _newer = lock.acquire("alice");

        let mut ctx = RequestContext::new();
        let mut response = ResponseAccumulator::new();
        let state = run(
            &store,
            &lock,
            "alice",
            token,
            &config(10, 10),
            &mut ctx,
            &mut response,
        )
        .await
        .unwrap();

        assert_eq!(state, PollState::LockLost);
        assert_eq!(ctx.cycles_used, 1);
        assert!(response.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stanzas_found_mid_run_stop_the_loop() {
        struct DelayedStore {
            inner: MemoryStanzaStore,
            misses: std::sync::atomic::AtomicU32,
        }

        #[async_trait::async_trait]
        impl PendingStanzaStore for DelayedStore {
            async fn find_and_consume(
                &self,
                user: &str,
            ) -> Result<Vec<crate::Stanza>, BindError> {
                let miss = self
                    .misses
                    .fetch_update(
                        std::sync::atomic::Ordering::SeqCst,
                        std::sync::atomic::Ordering::SeqCst,
                        |n| n.checked_sub(1),
                    )
                    .is_ok();
                if miss {
                    Ok(Vec::new())
                } else {
                    self.inner.find_and_consume(user).await
                }
            }
        }

        let store = DelayedStore {
            inner: MemoryStanzaStore::new(),
            misses: std::sync::atomic::AtomicU32::new(2),
        };
        store.inner.enqueue("alice", message("late arrival"));
        let lock = MemoryLock::new();
        let token = lock.acquire("alice");

        let mut ctx = RequestContext::new();
        let mut response = ResponseAccumulator::new();
        let state = run(
            &store,
            &lock,
            "alice",
            token,
            &config(50, 10),
            &mut ctx,
            &mut response,
        )
        .await
        .unwrap();

        assert_eq!(state, PollState::Found);
        assert_eq!(ctx.cycles_used, 3);
        let body = response.into_body(&StanzaLog::new()).unwrap();
        assert!(body.contains("late arrival"));
    }
}
