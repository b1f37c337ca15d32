//! # Appointment Repository
//!
//! Only what settlement needs from scheduling: marking an appointment done.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Appointment lifecycle as stored. Scheduling owns the other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Done,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    /// Inserts a scheduled appointment (seeding and tests).
    pub async fn insert_scheduled(
        &self,
        tenant_id: &str,
        id: &str,
        customer_id: &str,
        professional_id: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO appointments (id, tenant_id, customer_id, professional_id, status, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(customer_id)
        .bind(professional_id)
        .bind(AppointmentStatus::Scheduled)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks the appointment Done. A canceled appointment counts as missing.
    pub async fn mark_done(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        debug!(appointment_id = %id, "Marking appointment done");

        let result = sqlx::query(
            r#"
            UPDATE appointments SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND status != 'canceled'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(AppointmentStatus::Done)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Appointment", id));
        }
        Ok(())
    }

    pub async fn status(&self, tenant_id: &str, id: &str) -> DbResult<Option<AppointmentStatus>> {
        let status = sqlx::query_scalar("SELECT status FROM appointments WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_mark_done() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.appointments()
            .insert_scheduled("tenant", "appt-1", "customer", Some("ana"))
            .await
            .unwrap();

        db.appointments().mark_done("tenant", "appt-1").await.unwrap();
        assert_eq!(
            db.appointments().status("tenant", "appt-1").await.unwrap(),
            Some(AppointmentStatus::Done)
        );
        assert!(db.appointments().mark_done("tenant", "missing").await.is_err());
    }
}
