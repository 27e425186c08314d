//! HTTP routes for the bind endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use rookery_bosh::{
    BindController, FreshContent, MemoryLock, MemoryStanzaStore, PresenceTracker, StanzaDispatcher,
};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::ServerConfig;
use crate::handlers::{CoreIqHandler, RoutingMessageHandler, TrackerPresenceHandler};

/// Shared application state behind the routes.
pub struct AppState {
    /// The request-processing engine
    pub controller: BindController,
    /// Pending stanza queues, shared with the message handler
    pub store: Arc<MemoryStanzaStore>,
    /// Presence table
    pub presence: Arc<PresenceTracker>,
    /// Fresh-content channels of requests currently in flight, keyed by
    /// user, so same-node deliveries can bypass the store
    pub active: Arc<DashMap<String, Arc<FreshContent>>>,
}

/// Wire the collaborators together for one server instance.
pub fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let store = Arc::new(MemoryStanzaStore::new());
    let lock = Arc::new(MemoryLock::new());
    let presence = Arc::new(PresenceTracker::new(config.presence_config()));
    let active: Arc<DashMap<String, Arc<FreshContent>>> = Arc::new(DashMap::new());

    let dispatcher = StanzaDispatcher::new(
        Arc::new(RoutingMessageHandler::new(store.clone(), active.clone())),
        Arc::new(CoreIqHandler),
        Arc::new(TrackerPresenceHandler::new(presence.clone())),
    );

    let controller = BindController::new(
        dispatcher,
        store.clone(),
        lock,
        presence.clone(),
        config.poll_config(),
    );

    Arc::new(AppState {
        controller,
        store,
        presence,
        active,
    })
}

/// Create the router for the HTTP binding.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/http-bind/:user", post(http_bind))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle one bind request: stanza batch in, stanza batch out.
///
/// Always 200 with a (possibly empty) body batch; termination comes back
/// as the terminal body marker, also with 200. Only collaborator failures
/// surface as 500.
async fn http_bind(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    body: String,
) -> Response {
    let fresh = Arc::new(FreshContent::new());
    state.active.insert(user.clone(), fresh.clone());

    let result = state.controller.handle(&user, &body, &fresh).await;

    // Drop our registration unless a newer request already replaced it.
    state
        .active
        .remove_if(&user, |_, registered| Arc::ptr_eq(registered, &fresh));

    match result {
        Ok(outcome) => (
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            outcome.body,
        )
            .into_response(),
        Err(e) => {
            error!(user, error = %e, "bind request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
