//! Hive Server - websocket sessions in front of a single serialised engine
//!
//! This crate provides the online surface of the game:
//! - Websocket session broker with per-session rate limits
//! - The serialised match engine (validator, clock, bot scheduling)
//! - King-of-the-Hill seating and challenger queue
//! - Status endpoint and origin policy

mod engine;
mod protocol;
mod routes;
mod seating;
mod session;

pub use engine::{Engine, Event, ROTATION_PAUSE, TURN_BUDGET};
pub use protocol::{ClientMessage, ServerMessage, Snapshot, WireAction};
pub use seating::SessionId;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// Development mode relaxes origin enforcement.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8002,
            allowed_origins: Vec::new(),
            dev_mode: false,
        }
    }
}

/// Shared handles for the HTTP layer. All game state lives in the engine
/// task; this only routes messages towards it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub events: mpsc::UnboundedSender<Event>,
    pub next_session: Arc<AtomicU64>,
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.dev_mode {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/api/status", get(routes::status_handler))
        .route("/ws", get(session::ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the server: spawn the engine loop, then serve HTTP/WS on the
/// configured port.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = Engine::new(events_tx.clone());
    tokio::spawn(engine.run(events_rx));

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        events: events_tx,
        next_session: Arc::new(AtomicU64::new(1)),
    };
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Hive server listening on http://0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
