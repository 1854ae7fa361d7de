//! HTTP router (SPEC_FULL.md §6): one WebSocket upgrade endpoint onto the
//! Session state machine, plus a liveness check. Modeled on
//! `local_backend::router`'s split between a plain `Router` and a
//! `WebSocketUpgrade`-backed handler.

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use cc_session::Manager;
use tracing::{info, warn};

use crate::ws::AxumClientTransport;

#[derive(Clone)]
pub struct AppState {
    pub manager: Manager,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let transport = AxumClientTransport::new(socket);
        if let Err(err) = cc_session::handle_session(&state.manager, transport).await {
            warn!(error = %err, "session ended with an error");
        } else {
            info!("session ended cleanly");
        }
    })
}
