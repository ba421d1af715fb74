//! Device command vocabulary.
//!
//! Text commands understood by eSSL/ZKTeco terminals when delivered through
//! the relay's polling queue, plus the full-state payload the relay's
//! `set-user` endpoint accepts.

use std::fmt;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// `EndDateTime` used when a member has no enforced expiry.
pub const NO_LIMIT_END: &str = "20991231235959";

/// Device id that addresses every terminal polling the queue.
pub const ALL_DEVICES: &str = "ALL";

/// Access group on the terminal. The numbers are a device convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceGroup {
    Active = 1,
    Blocked = 99,
}

impl DeviceGroup {
    pub const fn for_enabled(enabled: bool) -> Self {
        if enabled { Self::Active } else { Self::Blocked }
    }

    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Format a timestamp the way the terminal expects: `YYYYMMDDHHMMSS`.
pub fn device_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Last second of the calendar day `at` falls on, device formatted.
pub fn end_of_day_stamp(at: DateTime<Utc>) -> String {
    let end = at
        .date_naive()
        .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .and_utc();
    device_timestamp(end)
}

/// `valid_to` / `EndDateTime` for a grace-adjusted expiry.
pub fn valid_to_stamp(final_expiry: Option<DateTime<Utc>>) -> String {
    final_expiry.map_or_else(|| NO_LIMIT_END.to_string(), end_of_day_stamp)
}

/// Which terminals a queued command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceTarget {
    #[default]
    All,
    Device(String),
}

impl DeviceTarget {
    pub fn from_option(device_id: Option<String>) -> Self {
        match device_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() && id != ALL_DEVICES => Self::Device(id.to_string()),
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_DEVICES,
            Self::Device(id) => id,
        }
    }
}

/// A command in the terminal's text protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    UpdateUser {
        pin: String,
        group: DeviceGroup,
        end: String,
    },
    DeleteUser {
        pin: String,
    },
}

impl DeviceCommand {
    /// Short name used in logs and queue payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpdateUser { .. } => "update_user",
            Self::DeleteUser { .. } => "delete_user",
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateUser { pin, group, end } => write!(
                f,
                "DATA UPDATE USER PIN={pin} Group={} EndDateTime={end}",
                group.number()
            ),
            Self::DeleteUser { pin } => write!(f, "DATA DELETE USER PIN={pin}"),
        }
    }
}

/// Full desired state of one credential, as posted to the relay.
///
/// Always carries the complete state so replaying it only re-asserts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUserRequest {
    pub employee_code: String,
    pub name: String,
    pub valid_from: String,
    pub valid_to: String,
    pub enabled: bool,
}

impl SetUserRequest {
    pub fn new(
        employee_code: &str,
        name: &str,
        valid_from: DateTime<Utc>,
        final_expiry: Option<DateTime<Utc>>,
        enabled: bool,
    ) -> Self {
        Self {
            employee_code: employee_code.to_string(),
            name: name.to_string(),
            valid_from: valid_from.to_rfc3339_opts(SecondsFormat::Secs, true),
            valid_to: valid_to_stamp(final_expiry),
            enabled,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn update_user_renders_device_syntax() {
        let cmd = DeviceCommand::UpdateUser {
            pin: "1042".into(),
            group: DeviceGroup::Blocked,
            end: "20240115235959".into(),
        };
        assert_eq!(
            cmd.to_string(),
            "DATA UPDATE USER PIN=1042 Group=99 EndDateTime=20240115235959"
        );
        assert_eq!(cmd.kind(), "update_user");
    }

    #[test]
    fn delete_user_renders_device_syntax() {
        let cmd = DeviceCommand::DeleteUser { pin: "7".into() };
        assert_eq!(cmd.to_string(), "DATA DELETE USER PIN=7");
    }

    #[test]
    fn group_numbers_follow_device_convention() {
        assert_eq!(DeviceGroup::for_enabled(true).number(), 1);
        assert_eq!(DeviceGroup::for_enabled(false).number(), 99);
    }

    #[test]
    fn valid_to_is_end_of_final_day() {
        assert_eq!(valid_to_stamp(Some(day(2024, 1, 15))), "20240115235959");
        assert_eq!(valid_to_stamp(None), NO_LIMIT_END);
    }

    #[test]
    fn device_timestamp_format() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(device_timestamp(t), "20240305070809");
    }

    #[test]
    fn target_parsing() {
        assert_eq!(DeviceTarget::from_option(None), DeviceTarget::All);
        assert_eq!(DeviceTarget::from_option(Some("ALL".into())), DeviceTarget::All);
        assert_eq!(DeviceTarget::from_option(Some("  ".into())), DeviceTarget::All);
        assert_eq!(DeviceTarget::from_option(Some(" ALL ".into())), DeviceTarget::All);
        assert_eq!(
            DeviceTarget::from_option(Some(" CQZ7232\n".into())),
            DeviceTarget::Device("CQZ7232".into())
        );
        assert_eq!(
            DeviceTarget::from_option(Some("CQZ7232".into())).as_str(),
            "CQZ7232"
        );
    }

    #[test]
    fn set_user_request_wire_shape() {
        let req = SetUserRequest::new("101", "Alice", day(2024, 1, 1), Some(day(2024, 1, 15)), true);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["employee_code"], "101");
        assert_eq!(json["valid_from"], "2024-01-01T00:00:00Z");
        assert_eq!(json["valid_to"], "20240115235959");
        assert_eq!(json["enabled"], true);
    }
}
