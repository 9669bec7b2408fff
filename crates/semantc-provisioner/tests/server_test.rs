// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API tests: a real server on an ephemeral port, driven by reqwest.

mod common;

use std::sync::Arc;
use std::time::Instant;

use semantc_provisioner::handlers::AppState;
use semantc_provisioner::server;

use common::{TestContext, happy_runner};

/// Spawn the server for one test, returning its base URL.
async fn spawn_server(ctx: TestContext) -> String {
    let state = Arc::new(AppState {
        orchestrator: ctx.orchestrator,
        started_at: Instant::now(),
    });
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_reports_version_and_uptime() {
    let base = spawn_server(TestContext::new("u1", happy_runner())).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert!(body["uptime_secs"].is_number());
}

#[tokio::test]
async fn provision_without_user_id_is_bad_request() {
    let base = spawn_server(TestContext::new("u1", happy_runner())).await;
    let client = reqwest::Client::new();

    // Empty body: every field defaults, including the blank userId.
    let response = client
        .post(format!("{base}/provision"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("userId"));
}

#[tokio::test]
async fn provision_unknown_user_is_not_found() {
    let base = spawn_server(TestContext::new("u1", happy_runner())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/provision"))
        .json(&serde_json::json!({"userId": "nobody"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body = response.text().await.unwrap();
    assert!(body.contains("nobody"));
}

#[tokio::test]
async fn provision_success_returns_fixed_message() {
    let ctx = TestContext::new("u1", happy_runner());
    let status = ctx.status.clone();
    let base = spawn_server(ctx).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/provision"))
        .json(&serde_json::json!({"userId": "u1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Resources provisioned successfully"
    );
    let doc = status.document("u1").unwrap();
    assert_eq!(doc["provisioningStatus"], "completed");
}

#[tokio::test]
async fn provision_failure_is_internal_error_with_reason() {
    let runner = happy_runner().fail_on("apply", 1, "Error: permission denied\n");
    let base = spawn_server(TestContext::new("u1", runner)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/provision"))
        .json(&serde_json::json!({"userId": "u1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Error provisioning resources:"));
    assert!(body.contains("permission denied"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let base = spawn_server(TestContext::new("u1", happy_runner())).await;

    let response = reqwest::get(format!("{base}/nope")).await.unwrap();
    assert_eq!(response.status(), 404);
}
