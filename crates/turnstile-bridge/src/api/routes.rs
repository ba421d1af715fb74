use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, AppState};
use crate::device::DeviceTarget;
use crate::engine::{BatchReport, BulkAction, BulkQueueReport, SyncAction};

#[derive(Debug, Deserialize)]
pub struct SyncMemberRequest {
    pub member_id: String,
    pub action: SyncAction,
}

#[derive(Debug, Deserialize)]
pub struct BulkCommandRequest {
    pub member_ids: Vec<String>,
    pub action: BulkAction,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncNowRequest {
    pub member_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /functions/check-expiry` runs the expiry sweep now.
pub async fn check_expiry(State(state): State<AppState>) -> Result<Json<BatchReport>, ApiError> {
    Ok(Json(state.engine.reconcile_all().await?))
}

/// `POST /functions/sync-member`: returns the relay reply body as-is.
pub async fn sync_member(
    State(state): State<AppState>,
    Json(req): Json<SyncMemberRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.member_id.trim().is_empty() {
        return Err(ApiError::BadRequest("member_id is required".into()));
    }
    let synced = state
        .engine
        .sync_member_to_device(&req.member_id, req.action)
        .await?;
    Ok(Json(synced.reply.body))
}

/// `POST /functions/device-commands/bulk`
pub async fn bulk_commands(
    State(state): State<AppState>,
    Json(req): Json<BulkCommandRequest>,
) -> Result<Json<BulkQueueReport>, ApiError> {
    if req.member_ids.is_empty() {
        return Err(ApiError::BadRequest("member_ids must not be empty".into()));
    }
    let target = DeviceTarget::from_option(req.device_id);
    let report = state
        .engine
        .queue_bulk_action(&req.member_ids, req.action, &target)
        .await?;
    Ok(Json(report))
}

/// `POST /functions/device-commands/sync-now`
pub async fn sync_now(
    State(state): State<AppState>,
    Json(req): Json<SyncNowRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.member_id.trim().is_empty() {
        return Err(ApiError::BadRequest("member_id is required".into()));
    }
    let target = DeviceTarget::from_option(req.device_id);
    let command_id = state.engine.queue_sync_now(&req.member_id, &target).await?;
    Ok(Json(json!({ "queued": 1, "command_id": command_id })))
}
