// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server for the provisioning API.
//!
//! Endpoints:
//! - `POST /provision` - provision per-user connector resources
//! - `GET  /health`    - liveness probe with version and uptime

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

use crate::handlers::{AppState, handle_health, handle_not_found, handle_provision};

/// Maximum request body size: 64 KB. Provisioning requests are tiny.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/provision", post(handle_provision))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Bind `addr` and serve until a shutdown signal arrives.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Provisioning API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal");
}
