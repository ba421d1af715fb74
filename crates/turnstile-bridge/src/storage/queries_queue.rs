//! Device command queue and sync log queries.

use turnstile_core::db::unix_timestamp;

use super::db::{BridgeDatabase, DatabaseError};
use super::models::{CommandStatus, DeviceCommandRow, SyncLogEntry, SyncStatus};

/// Parameters for appending a sync log row.
pub struct SyncLogParams<'a> {
    pub member_id: &'a str,
    pub command_kind: &'a str,
    pub request_payload: &'a serde_json::Value,
    pub response_payload: Option<&'a serde_json::Value>,
    pub status: SyncStatus,
    pub error_message: Option<&'a str>,
}

impl BridgeDatabase {
    // =========================================================================
    // Device command queue
    // =========================================================================

    /// Queue a command for the relay to deliver. Returns the row id.
    pub async fn enqueue_device_command(
        &self,
        device_id: &str,
        command: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO device_commands (device_id, command, status, payload, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(command)
        .bind(CommandStatus::Pending.as_str())
        .bind(serde_json::to_string(payload)?)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List queued commands, oldest first.
    pub async fn list_device_commands(
        &self,
        status_filter: Option<CommandStatus>,
    ) -> Result<Vec<DeviceCommandRow>, DatabaseError> {
        let rows = if let Some(status) = status_filter {
            sqlx::query_as::<_, DeviceCommandRow>(
                "SELECT * FROM device_commands WHERE status = ? ORDER BY id ASC",
            )
            .bind(status.as_str())
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, DeviceCommandRow>("SELECT * FROM device_commands ORDER BY id ASC")
                .fetch_all(self.pool())
                .await?
        };

        Ok(rows)
    }

    // =========================================================================
    // Sync log
    // =========================================================================

    /// Append a sync log row. Returns the row id.
    pub async fn insert_sync_log(&self, params: &SyncLogParams<'_>) -> Result<i64, DatabaseError> {
        let response = params
            .response_payload
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO device_sync_logs (member_id, command_kind, request_payload, response_payload, status, error_message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.member_id)
        .bind(params.command_kind)
        .bind(serde_json::to_string(params.request_payload)?)
        .bind(response)
        .bind(params.status.as_str())
        .bind(params.error_message)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Sync log rows for a member, oldest first.
    pub async fn list_sync_logs(&self, member_id: &str) -> Result<Vec<SyncLogEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, SyncLogEntry>(
            "SELECT * FROM device_sync_logs WHERE member_id = ? ORDER BY id ASC",
        )
        .bind(member_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
