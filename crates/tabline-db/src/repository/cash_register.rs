//! # Cash Register Repository
//!
//! Sessions and their append-only entries.
//!
//! ## Serializing Concurrent Closes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  close_order(A)                    close_order(B)                       │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  BEGIN                             BEGIN                                │
//! │  UPDATE sessions                   (waits for the writer lock)          │
//! │    SET total_sales =                    │                               │
//! │        total_sales + 60.00              │                               │
//! │    WHERE id = ? AND status='open'       │                               │
//! │  INSERT cash_entries                    │                               │
//! │  COMMIT ───────────────────────────────►│                               │
//! │                                    UPDATE ... total_sales + 40.00       │
//! │                                    INSERT ... COMMIT                    │
//! │                                                                         │
//! │  Totals are never read-modify-written in the application, so no        │
//! │  increment is lost. Closing the session checks `version` so a close     │
//! │  computed from stale totals is refused.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tabline_core::{CashEntry, CashEntryKind, CashRegisterSession, CashRegisterStatus, Money};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    tenant_id: String,
    status: CashRegisterStatus,
    opening_balance: Money,
    opened_by: String,
    opened_at: DateTime<Utc>,
    total_sales: Money,
    total_withdrawals: Money,
    total_reinforcements: Money,
    total_expenses: Money,
    closed_by: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    closing_balance: Option<Money>,
    expected_balance: Option<Money>,
    divergence: Option<Money>,
    justification: Option<String>,
    version: i64,
}

impl From<SessionRow> for CashRegisterSession {
    fn from(row: SessionRow) -> Self {
        CashRegisterSession {
            id: row.id,
            tenant_id: row.tenant_id,
            status: row.status,
            opening_balance: row.opening_balance,
            opened_by: row.opened_by,
            opened_at: row.opened_at,
            total_sales: row.total_sales,
            total_withdrawals: row.total_withdrawals,
            total_reinforcements: row.total_reinforcements,
            total_expenses: row.total_expenses,
            closed_by: row.closed_by,
            closed_at: row.closed_at,
            closing_balance: row.closing_balance,
            expected_balance: row.expected_balance,
            divergence: row.divergence,
            justification: row.justification,
            version: row.version,
            entries: Vec::new(),
        }
    }
}

const SESSION_COLUMNS: &str = r#"
    id, tenant_id, status, opening_balance, opened_by, opened_at,
    total_sales, total_withdrawals, total_reinforcements, total_expenses,
    closed_by, closed_at, closing_balance, expected_balance, divergence,
    justification, version
"#;

const ENTRY_COLUMNS: &str = r#"
    id, session_id, tenant_id, kind, amount, description,
    order_id, payment_id, user_id, created_at
"#;

/// Total column an entry kind accumulates into.
fn total_column(kind: CashEntryKind) -> &'static str {
    match kind {
        CashEntryKind::Sale => "total_sales",
        CashEntryKind::Withdrawal => "total_withdrawals",
        CashEntryKind::Reinforcement => "total_reinforcements",
        CashEntryKind::Expense => "total_expenses",
    }
}

/// Repository for cash register sessions and entries.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// Inserts a freshly opened session.
    ///
    /// A second open session for the tenant violates
    /// `idx_cash_register_one_open` and surfaces as `UniqueViolation` on
    /// `cash_register_sessions.tenant_id`.
    pub async fn insert(&self, session: &CashRegisterSession) -> DbResult<()> {
        debug!(session_id = %session.id, tenant_id = %session.tenant_id, "Opening cash register session");

        sqlx::query(
            r#"
            INSERT INTO cash_register_sessions (
                id, tenant_id, status, opening_balance, opened_by, opened_at,
                total_sales, total_withdrawals, total_reinforcements, total_expenses,
                version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(session.status)
        .bind(session.opening_balance)
        .bind(&session.opened_by)
        .bind(session.opened_at)
        .bind(session.total_sales)
        .bind(session.total_withdrawals)
        .bind(session.total_reinforcements)
        .bind(session.total_expenses)
        .bind(session.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The tenant's open session, if any.
    pub async fn find_open(&self, tenant_id: &str) -> DbResult<Option<CashRegisterSession>> {
        let sql = format!(
            "SELECT {} FROM cash_register_sessions WHERE tenant_id = ?1 AND status = 'open'",
            SESSION_COLUMNS
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql).bind(tenant_id).fetch_optional(&self.pool).await?;
        Ok(row.map(CashRegisterSession::from))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<CashRegisterSession>> {
        let sql = format!("SELECT {} FROM cash_register_sessions WHERE id = ?1", SESSION_COLUMNS);
        let row: Option<SessionRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(CashRegisterSession::from))
    }

    /// Appends an entry and bumps the matching running total.
    ///
    /// Both writes share one transaction and the total is incremented in
    /// place. Fails with `Conflict` if the session was closed meanwhile.
    ///
    /// ## Returns
    /// `false` when the payment already has an entry of this kind. The
    /// totals are left alone in that case.
    pub async fn append_entry(&self, entry: &CashEntry) -> DbResult<bool> {
        debug!(
            session_id = %entry.session_id,
            kind = %entry.kind,
            amount = %entry.amount,
            order_id = ?entry.order_id,
            "Appending cash entry"
        );

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_entries (
                id, session_id, tenant_id, kind, amount, description,
                order_id, payment_id, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.session_id)
        .bind(&entry.tenant_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(&entry.order_id)
        .bind(&entry.payment_id)
        .bind(&entry.user_id)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            debug!(payment_id = ?entry.payment_id, kind = %entry.kind, "Cash entry already booked");
            return Ok(false);
        }

        let column = total_column(entry.kind);
        let sql = format!(
            "UPDATE cash_register_sessions SET {col} = {col} + ?2, version = version + 1 \
             WHERE id = ?1 AND status = 'open'",
            col = column
        );
        let result = sqlx::query(&sql)
            .bind(&entry.session_id)
            .bind(entry.amount)
            .execute(&mut *tx)
            .await?;

        // Dropping the transaction discards the entry row
        if result.rows_affected() == 0 {
            return Err(DbError::conflict("CashRegisterSession", &entry.session_id));
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Persists a closed session.
    ///
    /// Guarded by `version`: if any entry landed after the caller loaded the
    /// session, the expected balance it computed is stale and the close is
    /// refused with `Conflict`.
    pub async fn close(&self, session: &CashRegisterSession) -> DbResult<()> {
        debug!(session_id = %session.id, divergence = ?session.divergence, "Closing cash register session");

        let result = sqlx::query(
            r#"
            UPDATE cash_register_sessions SET
                status = 'closed',
                closed_by = ?2,
                closed_at = ?3,
                closing_balance = ?4,
                expected_balance = ?5,
                divergence = ?6,
                justification = ?7
            WHERE id = ?1 AND status = 'open' AND version = ?8
            "#,
        )
        .bind(&session.id)
        .bind(&session.closed_by)
        .bind(session.closed_at)
        .bind(session.closing_balance)
        .bind(session.expected_balance)
        .bind(session.divergence)
        .bind(&session.justification)
        .bind(session.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("CashRegisterSession", &session.id));
        }
        Ok(())
    }

    /// Entries of a session, oldest first.
    pub async fn entries(&self, session_id: &str) -> DbResult<Vec<CashEntry>> {
        let sql = format!(
            "SELECT {} FROM cash_entries WHERE session_id = ?1 ORDER BY created_at, id",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as(&sql).bind(session_id).fetch_all(&self.pool).await?;
        Ok(entries)
    }

    /// Entries linked to an order, across sessions.
    pub async fn entries_for_order(&self, order_id: &str) -> DbResult<Vec<CashEntry>> {
        let sql = format!(
            "SELECT {} FROM cash_entries WHERE order_id = ?1 ORDER BY created_at, id",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?;
        Ok(entries)
    }

    /// Sum of an order's entries of one kind.
    pub async fn order_total(&self, order_id: &str, kind: CashEntryKind) -> DbResult<Money> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM cash_entries WHERE order_id = ?1 AND kind = ?2")
                .bind(order_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(Money::from_cents(total))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tabline_core::EntryLink;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn open_session(db: &Database) -> CashRegisterSession {
        let session = CashRegisterSession::open("tenant", "cashier", Money::from_cents(10000), None).unwrap();
        db.cash_registers().insert(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_second_open_session_is_rejected() {
        let db = setup().await;
        open_session(&db).await;

        let second = CashRegisterSession::open("tenant", "cashier", Money::zero(), None).unwrap();
        let err = db.cash_registers().insert(&second).await.unwrap_err();
        assert!(err.is_unique_violation_on("tenant_id"), "got {err:?}");

        // Other tenants are unaffected
        let other = CashRegisterSession::open("other", "cashier", Money::zero(), None).unwrap();
        db.cash_registers().insert(&other).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_entry_updates_persisted_totals() {
        let db = setup().await;
        let mut session = open_session(&db).await;

        let sale = session
            .record_entry(CashEntryKind::Sale, Money::from_cents(6000), "cashier", None, EntryLink::payment("o1", "p1"))
            .unwrap();
        db.cash_registers().append_entry(&sale).await.unwrap();
        let expense = session
            .record_entry(CashEntryKind::Expense, Money::from_cents(500), "cashier", Some("coffee"), EntryLink::none())
            .unwrap();
        db.cash_registers().append_entry(&expense).await.unwrap();

        let stored = db.cash_registers().find_open("tenant").await.unwrap().unwrap();
        assert_eq!(stored.total_sales, Money::from_cents(6000));
        assert_eq!(stored.total_expenses, Money::from_cents(500));
        assert_eq!(stored.version, 2);
        assert_eq!(stored.expected(), session.expected());

        assert_eq!(db.cash_registers().entries(&session.id).await.unwrap().len(), 2);
        assert_eq!(
            db.cash_registers().order_total("o1", CashEntryKind::Sale).await.unwrap(),
            Money::from_cents(6000)
        );
    }

    #[tokio::test]
    async fn test_payment_is_booked_once_per_kind() {
        let db = setup().await;
        let mut session = open_session(&db).await;

        let sale = session
            .record_entry(CashEntryKind::Sale, Money::from_cents(6000), "cashier", None, EntryLink::payment("o1", "p1"))
            .unwrap();
        assert!(db.cash_registers().append_entry(&sale).await.unwrap());

        // A retried close records a fresh entry for the same payment
        let again = session
            .record_entry(CashEntryKind::Sale, Money::from_cents(6000), "cashier", None, EntryLink::payment("o1", "p1"))
            .unwrap();
        assert!(!db.cash_registers().append_entry(&again).await.unwrap());

        let stored = db.cash_registers().get(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.total_sales, Money::from_cents(6000));
        assert_eq!(stored.version, 1);
        assert_eq!(
            db.cash_registers().order_total("o1", CashEntryKind::Sale).await.unwrap(),
            Money::from_cents(6000)
        );

        // The reversal is a different kind and still lands
        let refund = session
            .record_entry(CashEntryKind::Withdrawal, Money::from_cents(6000), "cashier", None, EntryLink::payment("o1", "p1"))
            .unwrap();
        assert!(db.cash_registers().append_entry(&refund).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_from_two_handles_are_not_lost() {
        let db = setup().await;
        let session = open_session(&db).await;

        // Two stale copies of the same session, as two concurrent closes would hold
        let mut a = db.cash_registers().find_open("tenant").await.unwrap().unwrap();
        let mut b = db.cash_registers().find_open("tenant").await.unwrap().unwrap();
        let ea = a
            .record_entry(CashEntryKind::Sale, Money::from_cents(100), "u", None, EntryLink::none())
            .unwrap();
        let eb = b
            .record_entry(CashEntryKind::Sale, Money::from_cents(250), "u", None, EntryLink::none())
            .unwrap();
        db.cash_registers().append_entry(&ea).await.unwrap();
        db.cash_registers().append_entry(&eb).await.unwrap();

        let stored = db.cash_registers().get(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.total_sales, Money::from_cents(350));
    }

    #[tokio::test]
    async fn test_close_with_stale_version_conflicts() {
        let db = setup().await;
        let mut session = open_session(&db).await;
        let mut stale = db.cash_registers().find_open("tenant").await.unwrap().unwrap();

        let sale = session
            .record_entry(CashEntryKind::Sale, Money::from_cents(2000), "cashier", None, EntryLink::none())
            .unwrap();
        db.cash_registers().append_entry(&sale).await.unwrap();

        stale
            .close("cashier", Money::from_cents(10000), None, Money::from_cents(500))
            .unwrap();
        let err = db.cash_registers().close(&stale).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let mut fresh = db.cash_registers().find_open("tenant").await.unwrap().unwrap();
        fresh
            .close("cashier", Money::from_cents(12000), None, Money::from_cents(500))
            .unwrap();
        db.cash_registers().close(&fresh).await.unwrap();
        assert!(db.cash_registers().find_open("tenant").await.unwrap().is_none());

        // Entries cannot land on a closed session
        let late = CashEntry { id: "late".to_string(), ..sale };
        assert!(db.cash_registers().append_entry(&late).await.is_err());
    }
}
