#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use turnstile_bridge::api::{AppState, build_router};
use turnstile_bridge::device::SetUserRequest;
use turnstile_bridge::emitter::CommandEmitter;
use turnstile_bridge::engine::ReconcileEngine;
use turnstile_bridge::relay::{DeviceRelay, RelayError, RelayReply};
use turnstile_bridge::storage::{BridgeDatabase, CommandStatus, MemberParams, PlanStatus};

/// 2020-01-01, long past any grace period.
const LAPSED: i64 = 1_577_836_800;
/// 2090-01-01.
const CURRENT: i64 = 3_786_912_000;

struct FakeRelay {
    offline: HashSet<String>,
}

#[async_trait]
impl DeviceRelay for FakeRelay {
    async fn set_user(&self, request: &SetUserRequest) -> Result<RelayReply, RelayError> {
        if self.offline.contains(&request.employee_code) {
            return Err(RelayError::Api {
                status: 504,
                body: r#"{"error":"device timeout"}"#.into(),
            });
        }
        Ok(RelayReply {
            status: 200,
            body: json!({
                "success": true,
                "employee_code": request.employee_code,
                "enabled": request.enabled,
            }),
        })
    }
}

struct TestApp {
    router: axum::Router,
    db: BridgeDatabase,
    _dir: TempDir,
}

async fn app_with_offline(offline: &[&str]) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = BridgeDatabase::open(&dir.path().join("bridge.db"))
        .await
        .unwrap();
    let relay = FakeRelay {
        offline: offline.iter().map(ToString::to_string).collect(),
    };
    let emitter = CommandEmitter::new(Arc::new(relay), db.clone());
    let engine = ReconcileEngine::new(db.clone(), emitter, 1);
    TestApp {
        router: build_router(AppState { engine }),
        db,
        _dir: dir,
    }
}

async fn app() -> TestApp {
    app_with_offline(&[]).await
}

async fn add_member(db: &BridgeDatabase, id: &str, essl_id: Option<&str>, expiry: i64) {
    db.upsert_member(&MemberParams {
        id,
        name: "Alice",
        essl_id,
        plan_start_date: None,
        plan_expiry_date: Some(expiry),
        grace_period_days: None,
    })
    .await
    .unwrap();
}

/// Send a request to the app and return (status, body json).
async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let resp = app.router.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn check_expiry_runs_sweep() {
    let app = app().await;
    add_member(&app.db, "lapsed", Some("101"), LAPSED).await;
    add_member(&app.db, "current", Some("102"), CURRENT).await;

    let (status, body) = send(&app, "POST", "/functions/check-expiry", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "processed": 1,
            "results": [{"id": "lapsed", "status": "success", "action": "expire"}],
        })
    );
    let member = app.db.get_member("lapsed").await.unwrap();
    assert!(member.blocked_on_device);
    assert_eq!(member.plan_status(), PlanStatus::Expired);
}

#[tokio::test]
async fn check_expiry_reports_member_failures_with_200() {
    let app = app_with_offline(&["101"]).await;
    add_member(&app.db, "lapsed", Some("101"), LAPSED).await;

    let (status, body) = send(&app, "POST", "/functions/check-expiry", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["status"], "failed");
    assert!(body["results"][0]["error"].as_str().unwrap().contains("504"));
}

#[tokio::test]
async fn sync_member_passes_relay_reply_through() {
    let app = app().await;
    add_member(&app.db, "m1", Some("102"), CURRENT).await;

    let (status, body) = send(
        &app,
        "POST",
        "/functions/sync-member",
        Some(json!({"member_id": "m1", "action": "create"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "employee_code": "102", "enabled": true})
    );
    assert!(app.db.get_member("m1").await.unwrap().last_synced_at.is_some());
}

#[tokio::test]
async fn sync_member_error_statuses() {
    let app = app_with_offline(&["103"]).await;
    add_member(&app.db, "no-pin", None, CURRENT).await;
    add_member(&app.db, "offline", Some("103"), CURRENT).await;

    let (status, body) = send(
        &app,
        "POST",
        "/functions/sync-member",
        Some(json!({"member_id": "ghost", "action": "renew"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let (status, _) = send(
        &app,
        "POST",
        "/functions/sync-member",
        Some(json!({"member_id": "no-pin", "action": "renew"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        "POST",
        "/functions/sync-member",
        Some(json!({"member_id": "offline", "action": "renew"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["relay_response"]["error"], "device timeout");
}

#[tokio::test]
async fn sync_member_rejects_unknown_action() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/functions/sync-member",
        Some(json!({"member_id": "m1", "action": "freeze"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bulk_queues_for_target_device() {
    let app = app().await;
    add_member(&app.db, "m1", Some("101"), CURRENT).await;
    add_member(&app.db, "m2", None, CURRENT).await;

    let (status, body) = send(
        &app,
        "POST",
        "/functions/device-commands/bulk",
        Some(json!({"member_ids": ["m1", "m2"], "action": "remove", "device_id": "CQZ7232"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"].as_array().unwrap().len(), 1);
    assert_eq!(body["skipped"][0]["member_id"], "m2");

    let rows = app
        .db
        .list_device_commands(Some(CommandStatus::Pending))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].device_id, "CQZ7232");
    assert_eq!(rows[0].command, "DATA DELETE USER PIN=101");
}

#[tokio::test]
async fn bulk_requires_member_ids() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/functions/device-commands/bulk",
        Some(json!({"member_ids": [], "action": "block"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "member_ids must not be empty");
}

#[tokio::test]
async fn sync_now_requires_member_id() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/functions/device-commands/sync-now",
        Some(json!({"member_id": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "member_id is required");
    assert!(app.db.list_device_commands(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn bulk_trims_device_id() {
    let app = app().await;
    add_member(&app.db, "m1", Some("101"), CURRENT).await;

    let (status, _) = send(
        &app,
        "POST",
        "/functions/device-commands/bulk",
        Some(json!({"member_ids": ["m1"], "action": "block", "device_id": " CQZ7232 "})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let rows = app.db.list_device_commands(None).await.unwrap();
    assert_eq!(rows[0].device_id, "CQZ7232");
}

#[tokio::test]
async fn sync_now_queues_for_all_devices() {
    let app = app().await;
    add_member(&app.db, "m1", Some("101"), LAPSED).await;

    let (status, body) = send(
        &app,
        "POST",
        "/functions/device-commands/sync-now",
        Some(json!({"member_id": "m1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], 1);

    let rows = app.db.list_device_commands(None).await.unwrap();
    assert_eq!(rows[0].id, body["command_id"].as_i64().unwrap());
    assert_eq!(rows[0].device_id, "ALL");
    assert_eq!(
        rows[0].command,
        "DATA UPDATE USER PIN=101 Group=99 EndDateTime=20200101235959"
    );
    // Queued path leaves the member row alone.
    assert!(!app.db.get_member("m1").await.unwrap().blocked_on_device);
}
