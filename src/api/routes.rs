//! Router assembly and server startup.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::automation::AutomationEngine;
use crate::config::Config;
use crate::notify::{LogEmailSink, ValidatorNotifier, WebhookChatSink};
use crate::realtime::BoardEvents;
use crate::store::BoardStore;
use crate::transition::TransitionService;

use super::auth;
use super::board;
use super::types::HealthResponse;
use super::ws;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<BoardStore>,
    /// Fan-out channel, owned here and injected into every publisher.
    pub events: BoardEvents,
    /// The transition pipeline behind move/toggle.
    pub transitions: TransitionService,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(BoardStore::open(config.data_path.clone())?);

    // One client for all outbound deliveries; every attempt is bounded.
    let http = reqwest::Client::builder()
        .timeout(config.webhook_timeout)
        .build()?;

    let events = BoardEvents::default();
    let transitions = TransitionService::new(
        Arc::clone(&store),
        AutomationEngine::new(Arc::clone(&store), http.clone()),
        ValidatorNotifier::new(
            Arc::clone(&store),
            Arc::new(WebhookChatSink::new(http)),
            Arc::new(LogEmailSink),
        ),
        events.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        events,
        transitions,
    });

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        // WebSocket uses subprotocol-based auth (browser can't set the
        // Authorization header on an upgrade).
        .route("/api/board/ws", get(ws::board_ws));

    let protected_routes = Router::new()
        .route("/api/board/default", get(board::get_board))
        .route("/api/tasks/move", post(board::move_task))
        .route("/api/subtasks/:id/toggle", post(board::toggle_subtask))
        .route("/api/stats/export", get(board::export_stats))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Taskdeck listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth_required(),
    })
}
