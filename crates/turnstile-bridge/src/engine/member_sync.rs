//! Per-member sync over the direct relay path.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use turnstile_core::expiry::resolve;

use super::{MemberSync, ReconcileEngine, SyncAction, SyncError};
use crate::device::SetUserRequest;
use crate::storage::{Member, PlanStatus, SyncStatus};
use crate::sync_log::SyncRecord;

/// `command_kind` recorded for direct relay calls.
pub(super) const SET_USER_KIND: &str = "set_user";

impl ReconcileEngine {
    /// Recompute a member's desired device state and assert it on the relay.
    pub async fn sync_member_to_device(
        &self,
        member_id: &str,
        action: SyncAction,
    ) -> Result<MemberSync, SyncError> {
        self.sync_member_at(member_id, action, Utc::now()).await
    }

    /// [`Self::sync_member_to_device`] with an explicit clock.
    #[instrument(skip_all, fields(member_id = %member_id, action = %action))]
    pub async fn sync_member_at(
        &self,
        member_id: &str,
        action: SyncAction,
        now: DateTime<Utc>,
    ) -> Result<MemberSync, SyncError> {
        let Some(member) = self.db.find_member(member_id).await? else {
            warn!("Member not found, relay not contacted");
            return Err(SyncError::NotFound(member_id.to_string()));
        };
        let tenant_grace = self.db.get_global_grace_days().await?;

        self.sync_loaded(&member, action, tenant_grace, now).await
    }

    /// Resolve, emit, log, then update the member row, in that order.
    pub(super) async fn sync_loaded(
        &self,
        member: &Member,
        action: SyncAction,
        tenant_grace_days: i64,
        now: DateTime<Utc>,
    ) -> Result<MemberSync, SyncError> {
        let Some(credential) = member.credential() else {
            let request = json!({ "action": action });
            self.sync_log
                .record(SyncRecord {
                    member_id: &member.id,
                    command_kind: SET_USER_KIND,
                    request: &request,
                    response: None,
                    status: SyncStatus::Skipped,
                    error: Some("missing device credential"),
                })
                .await;
            warn!(member_id = %member.id, "Member has no device credential, relay not contacted");
            return Err(SyncError::MissingCredential(member.id.clone()));
        };

        let resolution = resolve(
            now,
            member.plan_expiry(),
            member.grace_period_days,
            tenant_grace_days,
        );
        let enabled = !resolution.is_truly_expired && action.may_enable();

        let request = SetUserRequest::new(
            credential,
            &member.name,
            member.plan_start().unwrap_or(now),
            resolution.final_expiry,
            enabled,
        );
        let request_json = serde_json::to_value(&request).unwrap_or(Value::Null);

        match self.emitter.send_direct(&request).await {
            Ok(reply) => {
                self.sync_log
                    .record(SyncRecord {
                        member_id: &member.id,
                        command_kind: SET_USER_KIND,
                        request: &request_json,
                        response: Some(&reply.body),
                        status: SyncStatus::Success,
                        error: None,
                    })
                    .await;

                let status = PlanStatus::from_expired(!enabled);
                self.db
                    .record_sync_outcome(&member.id, !enabled, status, now.timestamp())
                    .await?;

                info!(
                    member_id = %member.id,
                    action = %action,
                    enabled,
                    valid_to = %request.valid_to,
                    "Member synced to device"
                );

                Ok(MemberSync {
                    member_id: member.id.clone(),
                    request,
                    reply,
                })
            }
            Err(e) => {
                let response = e.response_body();
                let message = e.to_string();
                self.sync_log
                    .record(SyncRecord {
                        member_id: &member.id,
                        command_kind: SET_USER_KIND,
                        request: &request_json,
                        response: response.as_ref(),
                        status: SyncStatus::Failed,
                        error: Some(&message),
                    })
                    .await;

                warn!(
                    member_id = %member.id,
                    action = %action,
                    error = %message,
                    "Relay call failed, member row left unchanged"
                );
                Err(SyncError::Relay(e))
            }
        }
    }
}
