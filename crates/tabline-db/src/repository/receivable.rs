//! # Receivable Repository
//!
//! The receivable ledger. Creation is an upsert by natural key so a retried
//! settlement never books the same payment share twice.
//!
//! ## Idempotent Insert
//! ```text
//! INSERT INTO receivable_accounts (...) VALUES (...)
//! ON CONFLICT(idempotency_key) DO NOTHING
//!
//!   rows_affected = 1  → created
//!   rows_affected = 0  → key already booked by an earlier run, skipped
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tabline_core::ReceivableAccount;

const COLUMNS: &str = r#"
    id, tenant_id, origin, amount, open_amount, status, due_date, settled_at,
    payment_id, order_id, idempotency_key, reversal_reason, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct ReceivableRepository {
    pool: SqlitePool,
}

impl ReceivableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReceivableRepository { pool }
    }

    /// Inserts the receivable unless its idempotency key is already booked.
    ///
    /// ## Returns
    /// `true` if a row was created, `false` if the key existed.
    pub async fn insert_if_absent(&self, receivable: &ReceivableAccount) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO receivable_accounts (
                id, tenant_id, origin, amount, open_amount, status, due_date, settled_at,
                payment_id, order_id, idempotency_key, reversal_reason, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(idempotency_key) DO NOTHING
            "#,
        )
        .bind(&receivable.id)
        .bind(&receivable.tenant_id)
        .bind(receivable.origin)
        .bind(receivable.amount)
        .bind(receivable.open_amount)
        .bind(receivable.status)
        .bind(receivable.due_date)
        .bind(receivable.settled_at)
        .bind(&receivable.payment_id)
        .bind(&receivable.order_id)
        .bind(&receivable.idempotency_key)
        .bind(&receivable.reversal_reason)
        .bind(receivable.created_at)
        .bind(receivable.updated_at)
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(
            key = %receivable.idempotency_key,
            amount = %receivable.amount,
            created,
            "Booking receivable"
        );
        Ok(created)
    }

    pub async fn find_by_key(&self, idempotency_key: &str) -> DbResult<Option<ReceivableAccount>> {
        let sql = format!("SELECT {} FROM receivable_accounts WHERE idempotency_key = ?1", COLUMNS);
        let receivable = sqlx::query_as(&sql)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(receivable)
    }

    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<ReceivableAccount>> {
        let sql = format!(
            "SELECT {} FROM receivable_accounts WHERE order_id = ?1 ORDER BY created_at, id",
            COLUMNS
        );
        let receivables = sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?;
        Ok(receivables)
    }

    /// Reverses every live receivable of an order.
    ///
    /// Sets status Reversed, zeroes the open amount and records the reason.
    ///
    /// ## Returns
    /// Ids of the receivables reversed by this call.
    pub async fn reverse_for_order(&self, order_id: &str, reason: &str, at: DateTime<Utc>) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE receivable_accounts
            SET status = 'reversed',
                open_amount = 0,
                reversal_reason = ?2,
                updated_at = ?3
            WHERE order_id = ?1 AND status NOT IN ('reversed', 'canceled')
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(reason)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        debug!(order_id = %order_id, reversed = ids.len(), "Reversed receivables");
        Ok(ids)
    }
}
