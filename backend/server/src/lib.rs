//! HTTP layer of the club's team manager.
//!
//! Payment and attendance records live in a shared spreadsheet, see the `sheets` crate.
//! This crate exposes them as a JSON API behind a cookie session.
//!
//!
//!
//! # Endpoints
//!
//! | Endpoint | Method | Auth | Notes |
//! |---|---|---|---|
//! | `/login` | POST | none | form `username`, `password`, sets the session cookie |
//! | `/logout` | GET | none | clears the cookie |
//! | `/api/me` | GET | session | `{user, role, is_admin}` |
//! | `/api/data` | GET | session | months plus each player's payments |
//! | `/api/update` | POST | admin | `{id, month, status}` |
//! | `/api/attendance-roster` | GET | session | `[{id, name}]` |
//! | `/api/get-attendance-for-date` | GET | session | `?date=`, names marked present |
//! | `/api/submit-attendance` | POST | admin | `{date, ids}` |
//! | `/api/attendance-history` | GET | session | dates plus per-player history |
//! | `/api/player-details` | GET | session | `?name=`, attended dates newest first |
//!
//! Reads fail with `{error}`, writes with `{success: false, message}`. A partially applied
//! attendance batch also carries `partial`, `applied`, `total` and `failed_at`.
//!
//!
//!
//! # Environment
//!
//! - `RUST_PORT`: listen port, default 5000
//! - `SESSION_SECRET`: cookie signing key, random per process if unset
//! - `SESSION_TTL_HOURS`: default 12
//! - `TEAM_USERS`: JSON user table, `[{"username", "password", "role"}]`
//! - `STORE_BACKEND`, `GOOGLE_AUTH`, `SPREADSHEET_ID`, `SPREADSHEET_TITLE`, `PAYMENTS_SHEET`,
//!   `ATTENDANCE_SHEET`, `STORE_TIMEOUT_MS`: see `sheets::config`
//!
//! Secrets are read from `/run/secrets/<NAME>` first, then the environment.
//!
//!
//!
//! # Run
//!
//! Against a local fixture instead of the real spreadsheet.
//! ```sh
//! STORE_BACKEND=memory MEMORY_FIXTURE=fixture.json RUST_LOG=info cargo run -p rink
//! ```
use std::{future::pending, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod utils;

use routes::{
    attendance_for_date_handler, health_handler, history_handler, login_handler, logout_handler,
    me_handler, payments_handler, player_details_handler, roster_handler,
    submit_attendance_handler, update_payment_handler,
};
pub use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new();

    info!("Starting server...");

    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutting down...");
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/login", post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/api/me", get(me_handler))
        .route("/api/data", get(payments_handler))
        .route("/api/update", post(update_payment_handler))
        .route("/api/attendance-roster", get(roster_handler))
        .route("/api/get-attendance-for-date", get(attendance_for_date_handler))
        .route("/api/submit-attendance", post(submit_attendance_handler))
        .route("/api/attendance-history", get(history_handler))
        .route("/api/player-details", get(player_details_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM. A signal that cannot be installed never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            warn!("Ctrl+C listener unavailable: {e}");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM listener unavailable: {e}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    let reason = tokio::select! {
        _ = interrupt => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };

    info!("{reason} received, finishing in-flight requests");
}
