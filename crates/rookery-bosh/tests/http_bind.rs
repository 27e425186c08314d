//! End-to-end request-cycle tests.
//!
//! These drive the full controller path (lock, presence, parse, dispatch,
//! fresh content, long poll, render) with in-memory collaborators and
//! scripted handlers.
//!
//! Run with: `cargo test -p rookery-bosh --test http_bind`

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use minidom::Element;

use rookery_bosh::{
    BindController, BindError, FreshContent, Handled, MemoryLock, MemoryStanzaStore, PollConfig,
    PollState, PresenceTracker, Stanza, StanzaDispatcher, StanzaHandler,
};

/// Initialize test environment.
fn init_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

const EMPTY_BODY: &str = "<body xmlns='http://jabber.org/protocol/httpbind'></body>";

fn stanza(xml: &str) -> Stanza {
    Stanza::classify(xml.parse::<Element>().unwrap())
}

fn message(body: &str) -> Stanza {
    stanza(&format!(
        "<message xmlns='jabber:client'><body>{}</body></message>",
        body
    ))
}

/// Handler that never replies.
struct Silent;

#[async_trait]
impl StanzaHandler for Silent {
    async fn handle(&self, _user: &str, _stanza: &Stanza) -> Result<Handled, BindError> {
        Ok(Handled::none())
    }
}

/// Iq handler that answers every iq with a fixed result.
struct ReplyIq;

#[async_trait]
impl StanzaHandler for ReplyIq {
    async fn handle(&self, _user: &str, stanza: &Stanza) -> Result<Handled, BindError> {
        let id = stanza.id().unwrap_or("unknown");
        Ok(Handled::reply(crate::stanza(&format!(
            "<iq xmlns='jabber:client' type='result' id='{}'/>",
            id
        ))))
    }
}

/// Presence handler that answers with probe results.
struct ProbePresence;

#[async_trait]
impl StanzaHandler for ProbePresence {
    async fn handle(&self, user: &str, _stanza: &Stanza) -> Result<Handled, BindError> {
        Ok(Handled::Replies(vec![crate::stanza(&format!(
            "<presence xmlns='jabber:client' from='contact@rookery.im' to='{}'/>",
            user
        ))]))
    }
}

/// Message handler that requests termination on the nth call.
struct TerminateOnNth {
    calls: AtomicU32,
    nth: u32,
}

#[async_trait]
impl StanzaHandler for TerminateOnNth {
    async fn handle(&self, _user: &str, _stanza: &Stanza) -> Result<Handled, BindError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.nth {
            Ok(Handled::Terminate)
        } else {
            Ok(Handled::none())
        }
    }
}

/// Iq handler that fails internally.
struct FailingIq;

#[async_trait]
impl StanzaHandler for FailingIq {
    async fn handle(&self, _user: &str, _stanza: &Stanza) -> Result<Handled, BindError> {
        Err(BindError::handler("backend unavailable"))
    }
}

struct Fixture {
    controller: Arc<BindController>,
    store: Arc<MemoryStanzaStore>,
}

fn fixture(
    message: Arc<dyn StanzaHandler>,
    iq: Arc<dyn StanzaHandler>,
    presence: Arc<dyn StanzaHandler>,
    poll: PollConfig,
) -> Fixture {
    init_test();
    let store = Arc::new(MemoryStanzaStore::new());
    let lock = Arc::new(MemoryLock::new());
    let tracker = Arc::new(PresenceTracker::default());
    let controller = Arc::new(BindController::new(
        StanzaDispatcher::new(message, iq, presence),
        store.clone(),
        lock,
        tracker,
        poll,
    ));
    Fixture { controller, store }
}

fn quiet_fixture(poll: PollConfig) -> Fixture {
    fixture(Arc::new(Silent), Arc::new(Silent), Arc::new(Silent), poll)
}

fn short_poll() -> PollConfig {
    PollConfig {
        backoff: Duration::from_millis(50),
        max_cycles: 3,
    }
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_completes_with_empty_batch() {
    let f = quiet_fixture(short_poll());
    let fresh = FreshContent::new();

    let outcome = f
        .controller
        .handle("alice", "<message><broken", &fresh)
        .await
        .unwrap();

    assert!(!outcome.terminated);
    assert_eq!(outcome.body, EMPTY_BODY);
    // Nothing was written, so the poll loop ran to exhaustion.
    assert_eq!(outcome.poll_state, Some(PollState::Exhausted));
}

#[tokio::test(start_paused = true)]
async fn iq_reply_short_circuits_the_poll_loop() {
    let f = fixture(
        Arc::new(Silent),
        Arc::new(ReplyIq),
        Arc::new(Silent),
        short_poll(),
    );
    let fresh = FreshContent::new();

    let outcome = f
        .controller
        .handle(
            "alice",
            "<iq type='get' id='ping-1'><ping xmlns='urn:xmpp:ping'/></iq>",
            &fresh,
        )
        .await
        .unwrap();

    assert!(outcome.body.contains("id='ping-1'") || outcome.body.contains("id=\"ping-1\""));
    assert_eq!(outcome.poll_state, None);
    assert_eq!(outcome.cycles_used, 0);
}

#[tokio::test(start_paused = true)]
async fn presence_replies_suppress_the_first_poll_cycle() {
    let f = fixture(
        Arc::new(Silent),
        Arc::new(Silent),
        Arc::new(ProbePresence),
        short_poll(),
    );
    let fresh = FreshContent::new();

    let outcome = f
        .controller
        .handle("alice", "<presence/>", &fresh)
        .await
        .unwrap();

    assert!(outcome.body.contains("contact@rookery.im"));
    assert_eq!(outcome.poll_state, None);
    assert_eq!(outcome.cycles_used, 0);
}

#[tokio::test(start_paused = true)]
async fn empty_store_polls_within_the_time_budget() {
    let backoff = Duration::from_secs(2);
    let max_cycles = 5;
    let f = quiet_fixture(PollConfig {
        backoff,
        max_cycles,
    });
    let fresh = FreshContent::new();

    let start = tokio::time::Instant::now();
    let outcome = f.controller.handle("alice", "", &fresh).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome.body, EMPTY_BODY);
    assert_eq!(outcome.poll_state, Some(PollState::Exhausted));
    assert_eq!(outcome.cycles_used, max_cycles);
    assert!(elapsed >= backoff * (max_cycles - 1));
    assert!(elapsed <= backoff * max_cycles);
}

#[tokio::test(start_paused = true)]
async fn zero_max_cycles_disables_long_polling() {
    let f = quiet_fixture(PollConfig {
        backoff: Duration::from_secs(1),
        max_cycles: 0,
    });
    let fresh = FreshContent::new();

    let start = tokio::time::Instant::now();
    let outcome = f.controller.handle("alice", "", &fresh).await.unwrap();

    assert_eq!(outcome.body, EMPTY_BODY);
    assert_eq!(outcome.poll_state, None);
    assert_eq!(outcome.cycles_used, 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn pending_stanzas_are_delivered_by_the_poll_loop() {
    let f = quiet_fixture(short_poll());
    f.store.enqueue("alice", message("waiting for you"));
    let fresh = FreshContent::new();

    let outcome = f.controller.handle("alice", "", &fresh).await.unwrap();

    assert!(outcome.body.contains("waiting for you"));
    assert_eq!(outcome.poll_state, Some(PollState::Found));
    assert_eq!(outcome.cycles_used, 1);
    assert_eq!(f.store.pending_count("alice"), 0);
}

#[tokio::test(start_paused = true)]
async fn fresh_content_skips_the_poll_loop() {
    let f = quiet_fixture(short_poll());
    let fresh = FreshContent::new();
    fresh.push(message("direct delivery"));

    let outcome = f.controller.handle("alice", "", &fresh).await.unwrap();

    assert!(outcome.body.contains("direct delivery"));
    assert_eq!(outcome.poll_state, None);
    assert_eq!(outcome.cycles_used, 0);
    assert_eq!(fresh.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispatch_and_fresh_content_keep_append_order() {
    let f = fixture(
        Arc::new(Silent),
        Arc::new(ReplyIq),
        Arc::new(Silent),
        short_poll(),
    );
    let fresh = FreshContent::new();
    fresh.push(message("fresh-one"));
    fresh.push(message("fresh-two"));

    let outcome = f
        .controller
        .handle("alice", "<iq type='get' id='q9'/>", &fresh)
        .await
        .unwrap();

    let iq_pos = outcome.body.find("q9").unwrap();
    let one_pos = outcome.body.find("fresh-one").unwrap();
    let two_pos = outcome.body.find("fresh-two").unwrap();
    assert!(iq_pos < one_pos && one_pos < two_pos);
}

#[tokio::test(start_paused = true)]
async fn termination_drops_the_rest_of_the_batch() {
    let counter = Arc::new(TerminateOnNth {
        calls: AtomicU32::new(0),
        nth: 2,
    });
    let f = fixture(
        counter.clone(),
        Arc::new(ReplyIq),
        Arc::new(Silent),
        short_poll(),
    );
    let fresh = FreshContent::new();

    let batch = "<message><body>one</body></message>\
                 <message><body>two</body></message>\
                 <message><body>three</body></message>";
    let outcome = f.controller.handle("alice", batch, &fresh).await.unwrap();

    assert!(outcome.terminated);
    assert!(outcome.body.contains("type='terminate'"));
    assert!(!outcome.body.contains("one"));
    // Stanza three was never dispatched.
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.poll_state, None);
}

#[tokio::test(start_paused = true)]
async fn handler_failure_fails_the_request() {
    let f = fixture(
        Arc::new(Silent),
        Arc::new(FailingIq),
        Arc::new(Silent),
        short_poll(),
    );
    let fresh = FreshContent::new();

    let result = f
        .controller
        .handle("alice", "<iq type='get' id='x'/>", &fresh)
        .await;

    assert!(matches!(result, Err(BindError::Handler(_))));
}

#[tokio::test(start_paused = true)]
async fn superseded_request_stops_without_duplicate_delivery() {
    let f = quiet_fixture(PollConfig {
        backoff: Duration::from_secs(1),
        max_cycles: 10,
    });

    // First request starts polling an empty store.
    let first = {
        let controller = f.controller.clone();
        tokio::spawn(async move {
            let fresh = FreshContent::new();
            controller.handle("alice", "", &fresh).await.unwrap()
        })
    };

    // Let the first request reach its backoff sleep.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // A stanza arrives and a newer request from the same user picks it up.
    f.store.enqueue("alice", message("exactly once"));
    let fresh = FreshContent::new();
    let second = f.controller.handle("alice", "", &fresh).await.unwrap();

    assert!(second.body.contains("exactly once"));
    assert_eq!(second.poll_state, Some(PollState::Found));

    // The superseded request exits quietly with nothing.
    let first = first.await.unwrap();
    assert_eq!(first.poll_state, Some(PollState::LockLost));
    assert_eq!(first.body, EMPTY_BODY);
    assert!(!first.terminated);

    // Exactly one of the two requests delivered the stanza.
    assert_eq!(f.store.pending_count("alice"), 0);
    let lock_count = [&first.body, &second.body]
        .iter()
        .filter(|body| body.contains("exactly once"))
        .count();
    assert_eq!(lock_count, 1);
}
