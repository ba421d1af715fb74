//! Member and tenant settings queries for the `Turnstile` bridge.

use turnstile_core::db::unix_timestamp;

use super::db::{BridgeDatabase, DatabaseError};
use super::models::{Member, PlanStatus};

/// Parameters for creating or replacing a member row.
///
/// Used by signup/admin flows and seeding. The device-state columns
/// (`blocked_on_device`, `plan_status`) are preserved on update; only
/// [`BridgeDatabase::record_sync_outcome`] writes them.
pub struct MemberParams<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub essl_id: Option<&'a str>,
    pub plan_start_date: Option<i64>,
    pub plan_expiry_date: Option<i64>,
    pub grace_period_days: Option<i64>,
}

impl BridgeDatabase {
    // =========================================================================
    // Member queries
    // =========================================================================

    /// Insert a member, or update its profile fields if it already exists.
    pub async fn upsert_member(&self, params: &MemberParams<'_>) -> Result<Member, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO members (id, name, essl_id, plan_start_date, plan_expiry_date, grace_period_days, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, essl_id = excluded.essl_id, \
             plan_start_date = excluded.plan_start_date, plan_expiry_date = excluded.plan_expiry_date, \
             grace_period_days = excluded.grace_period_days, updated_at = excluded.updated_at",
        )
        .bind(params.id)
        .bind(params.name)
        .bind(params.essl_id)
        .bind(params.plan_start_date)
        .bind(params.plan_expiry_date)
        .bind(params.grace_period_days)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_member(params.id).await
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Member, DatabaseError> {
        self.find_member(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Member {id}")))
    }

    /// Get a member by ID, `None` when absent.
    pub async fn find_member(&self, id: &str) -> Result<Option<Member>, DatabaseError> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(member)
    }

    /// Members the expiry sweep has to look at: an expiry date and a device
    /// credential are both set.
    pub async fn list_reconcile_candidates(&self) -> Result<Vec<Member>, DatabaseError> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT * FROM members \
             WHERE plan_expiry_date IS NOT NULL AND essl_id IS NOT NULL AND essl_id != '' \
             ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(members)
    }

    /// Persist the device state a successful sync asserted.
    ///
    /// This is the only write path for `blocked_on_device` and `plan_status`.
    pub async fn record_sync_outcome(
        &self,
        id: &str,
        blocked_on_device: bool,
        plan_status: PlanStatus,
        synced_at: i64,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE members SET blocked_on_device = ?, plan_status = ?, last_synced_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(blocked_on_device)
        .bind(plan_status.as_str())
        .bind(synced_at)
        .bind(unix_timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Member {id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Tenant settings
    // =========================================================================

    /// Tenant-wide default grace period. A missing settings row reads as `0`.
    pub async fn get_global_grace_days(&self) -> Result<i64, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT global_grace_period_days FROM tenant_settings WHERE id = 1")
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map_or(0, |r| r.0))
    }

    /// Set the tenant-wide default grace period.
    pub async fn set_global_grace_days(&self, days: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO tenant_settings (id, global_grace_period_days, updated_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET global_grace_period_days = excluded.global_grace_period_days, \
             updated_at = excluded.updated_at",
        )
        .bind(days)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
