//! Web server: axum router, Auth Gate middleware, and the two realtime
//! WebSocket upgrade routes.

pub mod auth;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    middleware,
    response::Response,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bridge::{self, LlmVariant};
use crate::config::Config;
use auth::AuthState;

/// Shared server state, cloned into every handler.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub auth_state: Arc<AuthState>,
}

/// Load configuration, build the router, and serve until shutdown.
pub async fn start(host: &str, port: u16) -> Result<()> {
    let config = Arc::new(Config::load()?);
    let auth_state = AuthState::new(config.auth.clone());
    let state = ServerState {
        config: config.clone(),
        auth_state: auth_state.clone(),
    };

    let protected = Router::new()
        .route("/ws/openai-realtime", get(openai_ws_handler))
        .route("/ws/gemini-realtime", get(gemini_ws_handler))
        .layer(middleware::from_fn_with_state(auth_state, auth::auth_middleware));

    let app = Router::new()
        .merge(protected)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid host/port for bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "tutor bridge listening");
    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}

async fn openai_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    request: axum::extract::Request,
) -> Response {
    let identity = identity_from_request(&request);
    ws.on_upgrade(move |socket| run_bridge(socket, LlmVariant::OpenAi, identity, state.config))
}

async fn gemini_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    request: axum::extract::Request,
) -> Response {
    let identity = identity_from_request(&request);
    ws.on_upgrade(move |socket| run_bridge(socket, LlmVariant::Gemini, identity, state.config))
}

fn identity_from_request(request: &axum::extract::Request) -> String {
    auth::extract_claims(request)
        .map(|claims| claims.sub.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn run_bridge(socket: WebSocket, variant: LlmVariant, identity: String, config: Arc<Config>) {
    bridge::serve(socket, variant, identity, config).await;
}
