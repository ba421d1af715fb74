//! Batch expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use turnstile_core::expiry::{ExpiryResolution, resolve};

use super::{ReconcileEngine, SyncAction, SyncError};
use crate::storage::{Member, PlanStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// One entry of a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemberOutcome {
    fn success(id: &str, action: SyncAction) -> Self {
        Self {
            id: id.to_string(),
            status: OutcomeStatus::Success,
            action: Some(action),
            error: None,
        }
    }

    fn failed(id: &str, action: SyncAction, error: String) -> Self {
        Self {
            id: id.to_string(),
            status: OutcomeStatus::Failed,
            action: Some(action),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub results: Vec<MemberOutcome>,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Failed)
            .count()
    }
}

/// Decide whether the recorded device state disagrees with the resolved one.
///
/// Checks both flags in both directions, so any drift between the cached
/// belief and the recomputed truth is re-asserted.
pub fn sweep_action(resolution: &ExpiryResolution, member: &Member) -> Option<SyncAction> {
    let expired_status = member.plan_status() == PlanStatus::Expired;

    if resolution.is_truly_expired {
        (!member.blocked_on_device || !expired_status).then_some(SyncAction::Expire)
    } else {
        (member.blocked_on_device || expired_status).then_some(SyncAction::Renew)
    }
}

impl ReconcileEngine {
    /// Run the expiry sweep over every member with an expiry and a credential.
    pub async fn reconcile_all(&self) -> Result<BatchReport, SyncError> {
        self.reconcile_all_at(Utc::now()).await
    }

    /// [`Self::reconcile_all`] with an explicit clock.
    ///
    /// Only loading the member list or the tenant settings fails the whole
    /// call; per-member failures end up in the report.
    #[instrument(skip_all)]
    pub async fn reconcile_all_at(&self, now: DateTime<Utc>) -> Result<BatchReport, SyncError> {
        let members = self.db.list_reconcile_candidates().await?;
        let tenant_grace = self.db.get_global_grace_days().await?;
        let scanned = members.len();

        let plan: Vec<(Member, SyncAction)> = members
            .into_iter()
            .filter_map(|member| {
                let resolution = resolve(
                    now,
                    member.plan_expiry(),
                    member.grace_period_days,
                    tenant_grace,
                );
                sweep_action(&resolution, &member).map(|action| (member, action))
            })
            .collect();

        info!(
            scanned,
            candidates = plan.len(),
            concurrency = self.concurrency,
            "Expiry sweep started"
        );

        let results = if self.concurrency <= 1 {
            let mut results = Vec::with_capacity(plan.len());
            for (member, action) in &plan {
                results.push(self.sync_candidate(member, *action, tenant_grace, now).await);
            }
            results
        } else {
            self.sync_bounded(plan, tenant_grace, now).await
        };

        let report = BatchReport {
            processed: results.len(),
            results,
        };
        info!(
            processed = report.processed,
            failed = report.failed_count(),
            "Expiry sweep finished"
        );
        Ok(report)
    }

    async fn sync_candidate(
        &self,
        member: &Member,
        action: SyncAction,
        tenant_grace: i64,
        now: DateTime<Utc>,
    ) -> MemberOutcome {
        match self.sync_loaded(member, action, tenant_grace, now).await {
            Ok(_) => MemberOutcome::success(&member.id, action),
            Err(e) => MemberOutcome::failed(&member.id, action, e.to_string()),
        }
    }

    /// Fan out over at most `concurrency` members at a time. Results keep
    /// the candidate order.
    async fn sync_bounded(
        &self,
        plan: Vec<(Member, SyncAction)>,
        tenant_grace: i64,
        now: DateTime<Utc>,
    ) -> Vec<MemberOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let keys: Vec<(String, SyncAction)> = plan
            .iter()
            .map(|(member, action)| (member.id.clone(), *action))
            .collect();
        let mut slots: Vec<Option<MemberOutcome>> = vec![None; plan.len()];
        let mut tasks = JoinSet::new();

        for (index, (member, action)) in plan.into_iter().enumerate() {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = engine
                    .sync_candidate(&member, action, tenant_grace, now)
                    .await;
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(outcome);
                    }
                }
                Err(e) => warn!(error = %e, "Member sync task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(keys)
            .map(|(slot, (id, action))| {
                slot.unwrap_or_else(|| {
                    MemberOutcome::failed(&id, action, "sync task aborted".to_string())
                })
            })
            .collect()
    }
}
