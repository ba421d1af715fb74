//! Membership expiry resolution.
//!
//! Decides whether a member is *truly* expired once the grace period is
//! applied. The per-member grace override wins over the tenant default
//! whenever it is set, including an explicit `0` and negative values.
//!
//! Grace days are added to the calendar date of the stored expiry and the
//! original time of day is kept, so a date-only expiry (midnight) shifted by
//! `n` days lands on midnight `n` days later.

use chrono::{DateTime, Days, NaiveDate, Utc};

/// Outcome of resolving a member's plan expiry against `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryResolution {
    /// `true` once `now` is strictly past the grace-adjusted boundary.
    pub is_truly_expired: bool,
    /// Plan expiry plus effective grace. `None` when the plan has no expiry.
    pub final_expiry: Option<DateTime<Utc>>,
}

impl ExpiryResolution {
    /// Resolution for a member without an enforced expiry.
    pub const fn unbounded() -> Self {
        Self {
            is_truly_expired: false,
            final_expiry: None,
        }
    }
}

/// Grace period that applies to a member: the override when set, otherwise
/// the tenant default.
pub const fn effective_grace_days(member_grace_days: Option<i64>, tenant_default: i64) -> i64 {
    match member_grace_days {
        Some(days) => days,
        None => tenant_default,
    }
}

/// Resolve whether a plan is expired at `now`.
pub fn resolve(
    now: DateTime<Utc>,
    plan_expiry: Option<DateTime<Utc>>,
    member_grace_days: Option<i64>,
    tenant_default_grace_days: i64,
) -> ExpiryResolution {
    let Some(expiry) = plan_expiry else {
        return ExpiryResolution::unbounded();
    };

    let grace = effective_grace_days(member_grace_days, tenant_default_grace_days);
    let final_expiry = shift_calendar_days(expiry, grace);

    ExpiryResolution {
        is_truly_expired: now > final_expiry,
        final_expiry: Some(final_expiry),
    }
}

/// Move `at` by whole calendar days, keeping the time of day.
///
/// Saturates at the representable date range instead of overflowing.
pub fn shift_calendar_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let date = at.date_naive();
    let step = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(step).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(step).unwrap_or(NaiveDate::MIN)
    };
    shifted.and_time(at.time()).and_utc()
}

/// Convert a stored Unix timestamp (seconds) into a UTC datetime.
pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
