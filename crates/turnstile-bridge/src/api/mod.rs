//! HTTP function endpoints.
//!
//! Thin `axum` wrappers over [`ReconcileEngine`]: one route per engine
//! operation plus a liveness probe.

mod error;
mod routes;

use axum::Router;
use axum::routing::{get, post};

use crate::engine::ReconcileEngine;

pub use error::ApiError;
pub use routes::{BulkCommandRequest, SyncMemberRequest, SyncNowRequest};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconcileEngine,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/functions/check-expiry", post(routes::check_expiry))
        .route("/functions/sync-member", post(routes::sync_member))
        .route("/functions/device-commands/bulk", post(routes::bulk_commands))
        .route("/functions/device-commands/sync-now", post(routes::sync_now))
        .with_state(state)
}
