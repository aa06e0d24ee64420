//! Health endpoint for the hosting platform.
//!
//! Web dynos are killed when nothing binds `PORT`, so the listener is bound
//! before any slow startup work and the silence asset is filled in later.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::silence::SilenceReport;
use crate::toolchain::BootstrapOutcome;

pub const HEALTH_BODY: &str = "✅ Telegram VC Bot is running!";

pub struct ServerState {
    started: Instant,
    toolchain: BootstrapOutcome,
    silence: OnceLock<SilenceReport>,
}

impl ServerState {
    pub fn new(toolchain: BootstrapOutcome) -> Self {
        Self {
            started: Instant::now(),
            toolchain,
            silence: OnceLock::new(),
        }
    }

    /// Record the silence asset once it exists. Later calls are ignored.
    pub fn set_silence(&self, report: SilenceReport) {
        let _ = self.silence.set(report);
    }
}

#[derive(Debug, Serialize)]
pub struct StatusBody<'a> {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub toolchain_ready: bool,
    pub toolchain: &'a BootstrapOutcome,
    pub silence: Option<&'a SilenceReport>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .with_state(state)
}

async fn health_check() -> &'static str {
    HEALTH_BODY
}

async fn status(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    let body = StatusBody {
        status: "ok",
        uptime_secs: state.started.elapsed().as_secs(),
        toolchain_ready: state.toolchain.all_found(),
        toolchain: &state.toolchain,
        silence: state.silence.get(),
    };
    Json(serde_json::to_value(body).unwrap_or_default())
}

/// Bind `0.0.0.0:port`. Connections queue until `serve` starts accepting.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Web server bound on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("🛑 Shutting down..."),
                Err(e) => {
                    warn!("Ctrl-C handler unavailable: {e}");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
}
