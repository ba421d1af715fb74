//! Command emitter with two delivery paths.
//!
//! - [`CommandEmitter::send_direct`] posts a full credential state to the
//!   relay and waits for its answer. Callers update the member row on
//!   success.
//! - [`CommandEmitter::enqueue`] inserts a text command into the device
//!   command queue and returns once the row exists. The relay picks it up
//!   when the terminal polls; nothing here waits for that, and member rows
//!   are not touched, so they may lag the queued state until the next sweep.
//!
//! Each path has its own receipt and error type, so callers never handle
//! the other path's outcome.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::device::{DeviceCommand, DeviceTarget, SetUserRequest};
use crate::relay::{DeviceRelay, RelayError, RelayReply};
use crate::storage::{BridgeDatabase, DatabaseError};

/// A text command addressed to one terminal or to all of them.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub target: DeviceTarget,
    pub command: DeviceCommand,
    /// Opaque context stored alongside the command.
    pub context: Value,
}

#[derive(Clone)]
pub struct CommandEmitter {
    relay: Arc<dyn DeviceRelay>,
    db: BridgeDatabase,
}

impl CommandEmitter {
    pub fn new(relay: Arc<dyn DeviceRelay>, db: BridgeDatabase) -> Self {
        Self { relay, db }
    }

    /// Path (a): synchronous relay call.
    pub async fn send_direct(&self, request: &SetUserRequest) -> Result<RelayReply, RelayError> {
        debug!(
            employee_code = %request.employee_code,
            enabled = request.enabled,
            valid_to = %request.valid_to,
            "Sending set-user to relay"
        );
        self.relay.set_user(request).await
    }

    /// Path (b): insert a pending queue row. Returns the row id.
    pub async fn enqueue(&self, queued: &QueuedCommand) -> Result<i64, DatabaseError> {
        let text = queued.command.to_string();
        let mut payload = queued.context.clone();
        if let Value::Object(map) = &mut payload {
            map.insert("command_kind".into(), queued.command.kind().into());
        }

        let id = self
            .db
            .enqueue_device_command(queued.target.as_str(), &text, &payload)
            .await?;

        info!(
            command_id = id,
            device_id = %queued.target.as_str(),
            command = %text,
            "Device command queued"
        );
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::device::DeviceGroup;
    use crate::storage::CommandStatus;

    struct EchoRelay;

    #[async_trait]
    impl DeviceRelay for EchoRelay {
        async fn set_user(&self, request: &SetUserRequest) -> Result<RelayReply, RelayError> {
            Ok(RelayReply {
                status: 200,
                body: json!({"success": true, "enabled": request.enabled}),
            })
        }
    }

    async fn emitter() -> (CommandEmitter, BridgeDatabase) {
        let db = BridgeDatabase::open_in_memory().await.unwrap();
        (CommandEmitter::new(Arc::new(EchoRelay), db.clone()), db)
    }

    #[tokio::test]
    async fn send_direct_returns_relay_reply_without_queueing() {
        let (emitter, db) = emitter().await;
        let request = SetUserRequest {
            employee_code: "7".into(),
            name: "Bob".into(),
            valid_from: "2024-01-01T00:00:00Z".into(),
            valid_to: "20991231235959".into(),
            enabled: false,
        };

        let reply = emitter.send_direct(&request).await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["enabled"], false);
        assert!(db.list_device_commands(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_inserts_pending_row() {
        let (emitter, db) = emitter().await;
        let queued = QueuedCommand {
            target: DeviceTarget::Device("CQZ7232".into()),
            command: DeviceCommand::UpdateUser {
                pin: "7".into(),
                group: DeviceGroup::Active,
                end: "20240115235959".into(),
            },
            context: json!({"member_id": "m7"}),
        };

        let command_id = emitter.enqueue(&queued).await.unwrap();

        let rows = db
            .list_device_commands(Some(CommandStatus::Pending))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, command_id);
        assert_eq!(rows[0].device_id, "CQZ7232");
        assert_eq!(
            rows[0].command,
            "DATA UPDATE USER PIN=7 Group=1 EndDateTime=20240115235959"
        );
        let payload: Value = serde_json::from_str(&rows[0].payload).unwrap();
        assert_eq!(payload["member_id"], "m7");
        assert_eq!(payload["command_kind"], "update_user");
    }
}
