//! Membership-to-device reconciliation engine.
//!
//! Three call sites share the expiry resolver:
//! - the scheduled sweep ([`ReconcileEngine::reconcile_all`]),
//! - the on-demand per-member sync ([`ReconcileEngine::sync_member_to_device`]),
//! - the admin queue actions ([`ReconcileEngine::queue_bulk_action`],
//!   [`ReconcileEngine::queue_sync_now`]).
//!
//! Only the per-member sync writes `blocked_on_device` / `plan_status`, and
//! only after the relay confirmed the command.

mod member_sync;
mod queued;
mod sweep;


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::SetUserRequest;
use crate::emitter::CommandEmitter;
use crate::relay::{RelayError, RelayReply};
use crate::storage::{BridgeDatabase, DatabaseError};
use crate::sync_log::SyncLog;

pub use queued::{BulkAction, BulkQueueReport, QueuedMember, SkippedMember};
pub use sweep::{BatchReport, MemberOutcome, OutcomeStatus, sweep_action};

/// Why a member sync was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Renew,
    Expire,
}

impl SyncAction {
    /// Only `create` and `renew` can lead to an enabled credential.
    pub const fn may_enable(self) -> bool {
        matches!(self, Self::Create | Self::Renew)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Renew => "renew",
            Self::Expire => "expire",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-member sync failures.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Member {0} not found")]
    NotFound(String),

    #[error("Member {0} has no device credential")]
    MissingCredential(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result of a confirmed per-member sync.
#[derive(Debug, Clone)]
pub struct MemberSync {
    pub member_id: String,
    pub request: SetUserRequest,
    pub reply: RelayReply,
}

/// Reconciles membership state with the biometric terminals.
#[derive(Clone)]
pub struct ReconcileEngine {
    db: BridgeDatabase,
    emitter: CommandEmitter,
    sync_log: SyncLog,
    /// Member syncs allowed in flight during a sweep.
    concurrency: usize,
}

impl ReconcileEngine {
    pub fn new(db: BridgeDatabase, emitter: CommandEmitter, concurrency: usize) -> Self {
        Self {
            sync_log: SyncLog::new(db.clone()),
            db,
            emitter,
            concurrency: concurrency.max(1),
        }
    }
}
