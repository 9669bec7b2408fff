// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP route handlers for the provisioning API.
//!
//! Responses are plain text: callers are other backend services that key
//! off the status code and read the body only for diagnostics.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;

use crate::error::Error;
use crate::orchestrator::Orchestrator;
use crate::status::ProvisioningRequest;

/// Shared handler state.
pub struct AppState {
    /// The provisioning orchestrator.
    pub orchestrator: Orchestrator,
    /// Process start time, reported by the health endpoint.
    pub started_at: Instant,
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    });
    (StatusCode::OK, Json(response))
}

/// POST /provision
///
/// Body fields are all optional; a missing or malformed body is treated as
/// an empty request and rejected for the missing `userId`.
pub(crate) async fn handle_provision(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ProvisioningRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state.orchestrator.provision(&request).await {
        Ok(()) => (
            StatusCode::OK,
            "Resources provisioned successfully".to_string(),
        ),
        Err(e) => {
            let status = status_for(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                (status, format!("Error provisioning resources: {e}"))
            } else {
                warn!(status = %status, error = %e, "Provisioning request rejected");
                (status, e.to_string())
            }
        }
    }
}

/// Fallback for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

/// Map a provisioning error to its HTTP status code.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::RecordNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
