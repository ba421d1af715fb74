//! Best-effort audit trail of device sync attempts.
//!
//! A failed log write never fails the reconciliation that produced it.

use serde_json::Value;
use tracing::warn;

use crate::storage::{BridgeDatabase, SyncLogParams, SyncStatus};

/// One sync attempt to append.
#[derive(Debug, Clone)]
pub struct SyncRecord<'a> {
    pub member_id: &'a str,
    pub command_kind: &'a str,
    pub request: &'a Value,
    pub response: Option<&'a Value>,
    pub status: SyncStatus,
    pub error: Option<&'a str>,
}

#[derive(Clone)]
pub struct SyncLog {
    db: BridgeDatabase,
}

impl SyncLog {
    pub const fn new(db: BridgeDatabase) -> Self {
        Self { db }
    }

    /// Append a record. Storage errors are logged and swallowed.
    pub async fn record(&self, record: SyncRecord<'_>) {
        let params = SyncLogParams {
            member_id: record.member_id,
            command_kind: record.command_kind,
            request_payload: record.request,
            response_payload: record.response,
            status: record.status,
            error_message: record.error,
        };

        if let Err(e) = self.db.insert_sync_log(&params).await {
            warn!(
                member_id = %record.member_id,
                status = %record.status,
                error = %e,
                "Failed to write sync log entry"
            );
        }
    }
}
