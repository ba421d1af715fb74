//! Admin flows that go through the device command queue.
//!
//! These enqueue and return. Member rows keep their previous
//! `blocked_on_device` / `plan_status` until the next direct sync or sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use turnstile_core::expiry::resolve;

use super::{ReconcileEngine, SyncError};
use crate::device::{
    DeviceCommand, DeviceGroup, DeviceTarget, NO_LIMIT_END, device_timestamp, end_of_day_stamp,
    valid_to_stamp,
};
use crate::emitter::QueuedCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Block,
    Unblock,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedMember {
    pub member_id: String,
    pub command_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
    pub member_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkQueueReport {
    pub queued: Vec<QueuedMember>,
    pub skipped: Vec<SkippedMember>,
}

impl ReconcileEngine {
    pub async fn queue_bulk_action(
        &self,
        member_ids: &[String],
        action: BulkAction,
        target: &DeviceTarget,
    ) -> Result<BulkQueueReport, SyncError> {
        self.queue_bulk_action_at(member_ids, action, target, Utc::now())
            .await
    }

    /// Enqueue one command per member that has a credential.
    ///
    /// `unblock` ends on the member's grace-adjusted expiry when it is still
    /// ahead, at the end of today when it has passed, and on the far-future
    /// sentinel only for plans without an expiry.
    #[instrument(skip_all, fields(count = member_ids.len(), action = ?action, device = %target.as_str()))]
    pub async fn queue_bulk_action_at(
        &self,
        member_ids: &[String],
        action: BulkAction,
        target: &DeviceTarget,
        now: DateTime<Utc>,
    ) -> Result<BulkQueueReport, SyncError> {
        let tenant_grace = self.db.get_global_grace_days().await?;
        let mut report = BulkQueueReport::default();

        for id in member_ids {
            let Some(member) = self.db.find_member(id).await? else {
                report.skipped.push(SkippedMember {
                    member_id: id.clone(),
                    reason: "member not found".to_string(),
                });
                continue;
            };
            let Some(pin) = member.credential() else {
                report.skipped.push(SkippedMember {
                    member_id: id.clone(),
                    reason: "no device credential".to_string(),
                });
                continue;
            };

            let command = match action {
                BulkAction::Block => DeviceCommand::UpdateUser {
                    pin: pin.to_string(),
                    group: DeviceGroup::Blocked,
                    end: device_timestamp(now),
                },
                BulkAction::Unblock => {
                    let resolution = resolve(
                        now,
                        member.plan_expiry(),
                        member.grace_period_days,
                        tenant_grace,
                    );
                    // A lapsed member only gets today, so the next sweep still
                    // sees them as expired and the device closes again.
                    let end = match resolution.final_expiry {
                        None => NO_LIMIT_END.to_string(),
                        Some(_) if resolution.is_truly_expired => end_of_day_stamp(now),
                        Some(final_expiry) => end_of_day_stamp(final_expiry),
                    };
                    DeviceCommand::UpdateUser {
                        pin: pin.to_string(),
                        group: DeviceGroup::Active,
                        end,
                    }
                }
                BulkAction::Remove => DeviceCommand::DeleteUser {
                    pin: pin.to_string(),
                },
            };

            let command_id = self
                .emitter
                .enqueue(&QueuedCommand {
                    target: target.clone(),
                    command,
                    context: json!({
                        "member_id": member.id,
                        "action": action,
                        "source": "bulk_action",
                    }),
                })
                .await?;

            report.queued.push(QueuedMember {
                member_id: member.id.clone(),
                command_id,
            });
        }

        info!(
            queued = report.queued.len(),
            skipped = report.skipped.len(),
            "Bulk device action queued"
        );
        Ok(report)
    }

    pub async fn queue_sync_now(
        &self,
        member_id: &str,
        target: &DeviceTarget,
    ) -> Result<i64, SyncError> {
        self.queue_sync_now_at(member_id, target, Utc::now()).await
    }

    /// Enqueue the member's resolved full state as one `UPDATE USER` command.
    #[instrument(skip_all, fields(member_id = %member_id, device = %target.as_str()))]
    pub async fn queue_sync_now_at(
        &self,
        member_id: &str,
        target: &DeviceTarget,
        now: DateTime<Utc>,
    ) -> Result<i64, SyncError> {
        let Some(member) = self.db.find_member(member_id).await? else {
            return Err(SyncError::NotFound(member_id.to_string()));
        };
        let Some(pin) = member.credential() else {
            return Err(SyncError::MissingCredential(member.id.clone()));
        };
        let tenant_grace = self.db.get_global_grace_days().await?;

        let resolution = resolve(
            now,
            member.plan_expiry(),
            member.grace_period_days,
            tenant_grace,
        );
        let enabled = !resolution.is_truly_expired;

        let command_id = self
            .emitter
            .enqueue(&QueuedCommand {
                target: target.clone(),
                command: DeviceCommand::UpdateUser {
                    pin: pin.to_string(),
                    group: DeviceGroup::for_enabled(enabled),
                    end: valid_to_stamp(resolution.final_expiry),
                },
                context: json!({
                    "member_id": member.id,
                    "enabled": enabled,
                    "source": "sync_now",
                }),
            })
            .await?;

        Ok(command_id)
    }
}
