//! Data models for `Turnstile` bridge storage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnstile_core::expiry::from_unix;

/// Denormalized mirror of the expiry decision, kept for fast filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Expired,
}

impl PlanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }

    /// Parse a stored value. Anything unrecognised reads as `Active`; the
    /// column has a CHECK constraint so this only matters for hand-edited rows.
    pub fn from_db(value: &str) -> Self {
        if value == "expired" {
            Self::Expired
        } else {
            Self::Active
        }
    }

    pub const fn from_expired(expired: bool) -> Self {
        if expired { Self::Expired } else { Self::Active }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: String,
    pub name: String,
    /// Enrollment id on the biometric device (`PIN`).
    pub essl_id: Option<String>,
    pub plan_start_date: Option<i64>,
    pub plan_expiry_date: Option<i64>,
    pub grace_period_days: Option<i64>,
    pub blocked_on_device: bool,
    pub plan_status: String,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Member {
    pub fn plan_status(&self) -> PlanStatus {
        PlanStatus::from_db(&self.plan_status)
    }

    pub fn plan_expiry(&self) -> Option<DateTime<Utc>> {
        self.plan_expiry_date.and_then(from_unix)
    }

    pub fn plan_start(&self) -> Option<DateTime<Utc>> {
        self.plan_start_date.and_then(from_unix)
    }

    /// Device credential. Only non-empty ASCII alphanumerics count: the PIN
    /// is written into the terminal's space-separated text protocol.
    pub fn credential(&self) -> Option<&str> {
        self.essl_id
            .as_deref()
            .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric()))
    }
}

/// Lifecycle of a queued device command. Only `Pending` is ever written here;
/// the relay moves rows forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Sent,
    Failed,
}

impl CommandStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceCommandRow {
    pub id: i64,
    pub device_id: String,
    pub command: String,
    pub status: String,
    pub payload: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    Skipped,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncLogEntry {
    pub id: i64,
    pub member_id: String,
    pub command_kind: String,
    pub request_payload: String,
    pub response_payload: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: i64,
}
