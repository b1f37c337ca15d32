//! # Cash Register Desk
//!
//! Operator-facing register operations outside of order settlement: opening
//! and closing the session, and manual entries.
//!
//! ## Session Lifecycle
//! ```text
//! open(opening) ──► Open ──┬── withdraw / reinforce / expense (manual)
//!                          ├── Sale / Withdrawal (settlement engine)
//!                          │
//!                          └── close(actual) ──► Closed
//!                                │
//!                                ├─ |actual − expected| <= threshold → ok
//!                                └─ otherwise a justification is required
//! ```
//!
//! At most one session is open per tenant. The check runs first in the
//! domain and again in storage, where a unique index catches racing opens.

use tracing::{info, warn};

use tabline_core::{CashEntry, CashEntryKind, CashRegisterSession, CoreError, EntryLink, Money};
use tabline_db::{Database, DbError};

use crate::error::{SettlementError, SettlementResult};

/// Attempts at closing before giving up to a steady stream of entries.
const CLOSE_ATTEMPTS: usize = 3;

/// A session with its entries and the balance they add up to.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: CashRegisterSession,
    pub entries: Vec<CashEntry>,
    pub expected: Money,
}

#[derive(Clone)]
pub struct CashRegisterDesk {
    db: Database,
    threshold: Money,
}

impl CashRegisterDesk {
    /// `threshold` is the divergence above which closing needs a justification.
    pub fn new(db: Database, threshold: Money) -> Self {
        CashRegisterDesk { db, threshold }
    }

    pub async fn open(&self, tenant_id: &str, user_id: &str, opening: Money) -> SettlementResult<CashRegisterSession> {
        let current = self.db.cash_registers().find_open(tenant_id).await?;
        let session = CashRegisterSession::open(tenant_id, user_id, opening, current.as_ref())?;

        match self.db.cash_registers().insert(&session).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation_on("tenant_id") => {
                return Err(CoreError::CashRegisterAlreadyOpen(tenant_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(session_id = %session.id, tenant_id = %tenant_id, opening = %opening, "Cash register opened");
        Ok(session)
    }

    pub async fn withdraw(
        &self,
        tenant_id: &str,
        user_id: &str,
        amount: Money,
        description: Option<&str>,
    ) -> SettlementResult<CashEntry> {
        self.record(tenant_id, user_id, CashEntryKind::Withdrawal, amount, description)
            .await
    }

    pub async fn reinforce(
        &self,
        tenant_id: &str,
        user_id: &str,
        amount: Money,
        description: Option<&str>,
    ) -> SettlementResult<CashEntry> {
        self.record(tenant_id, user_id, CashEntryKind::Reinforcement, amount, description)
            .await
    }

    pub async fn expense(
        &self,
        tenant_id: &str,
        user_id: &str,
        amount: Money,
        description: Option<&str>,
    ) -> SettlementResult<CashEntry> {
        self.record(tenant_id, user_id, CashEntryKind::Expense, amount, description)
            .await
    }

    async fn record(
        &self,
        tenant_id: &str,
        user_id: &str,
        kind: CashEntryKind,
        amount: Money,
        description: Option<&str>,
    ) -> SettlementResult<CashEntry> {
        let mut session = self
            .db
            .cash_registers()
            .find_open(tenant_id)
            .await?
            .ok_or_else(|| SettlementError::CashRegisterNotOpen(tenant_id.to_string()))?;

        let entry = session.record_entry(kind, amount, user_id, description, EntryLink::none())?;
        match self.db.cash_registers().append_entry(&entry).await {
            Ok(_) => {}
            Err(DbError::Conflict { .. }) => return Err(SettlementError::CashRegisterNotOpen(tenant_id.to_string())),
            Err(e) => return Err(e.into()),
        }

        info!(session_id = %session.id, kind = %kind, amount = %amount, "Manual cash entry");
        Ok(entry)
    }

    /// Closes the tenant's open session against the counted cash.
    ///
    /// An entry landing between the read and the write moves the expected
    /// balance, so the close is recomputed on a fresh read.
    pub async fn close(
        &self,
        tenant_id: &str,
        user_id: &str,
        actual: Money,
        justification: Option<&str>,
    ) -> SettlementResult<CashRegisterSession> {
        for attempt in 1..=CLOSE_ATTEMPTS {
            let mut session = self
                .db
                .cash_registers()
                .find_open(tenant_id)
                .await?
                .ok_or_else(|| SettlementError::CashRegisterNotOpen(tenant_id.to_string()))?;

            let divergence = session.close(user_id, actual, justification, self.threshold)?;

            match self.db.cash_registers().close(&session).await {
                Ok(()) => {
                    if divergence.is_zero() {
                        info!(session_id = %session.id, "Cash register closed, no divergence");
                    } else {
                        warn!(
                            session_id = %session.id,
                            divergence = %divergence,
                            justification = ?session.justification,
                            "Cash register closed with divergence"
                        );
                    }
                    return Ok(session);
                }
                Err(DbError::Conflict { .. }) if attempt < CLOSE_ATTEMPTS => {
                    warn!(session_id = %session.id, attempt, "Entries landed during close, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SettlementError::Storage(DbError::conflict("CashRegisterSession", tenant_id)))
    }

    pub async fn summary(&self, session_id: &str) -> SettlementResult<SessionSummary> {
        let session = self
            .db
            .cash_registers()
            .get(session_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("CashRegisterSession", session_id))?;
        let entries = self.db.cash_registers().entries(session_id).await?;
        let expected = session.expected();

        Ok(SessionSummary {
            session,
            entries,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabline_core::{CashRegisterStatus, DEFAULT_DIVERGENCE_THRESHOLD};
    use tabline_db::DbConfig;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    async fn desk() -> CashRegisterDesk {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CashRegisterDesk::new(db, DEFAULT_DIVERGENCE_THRESHOLD)
    }

    #[tokio::test]
    async fn test_one_open_session_per_tenant() {
        let desk = desk().await;
        desk.open("tenant", "cashier", cents(10000)).await.unwrap();

        let err = desk.open("tenant", "cashier", cents(5000)).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::ValidationFailed(CoreError::CashRegisterAlreadyOpen(_))
        ));

        // Other tenants are independent
        desk.open("other-tenant", "cashier", cents(0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_entries_need_open_session() {
        let desk = desk().await;
        let err = desk.expense("tenant", "cashier", cents(100), None).await.unwrap_err();
        assert!(matches!(err, SettlementError::CashRegisterNotOpen(_)));
    }

    #[tokio::test]
    async fn test_expected_balance() {
        let desk = desk().await;
        let session = desk.open("tenant", "cashier", cents(10000)).await.unwrap();

        desk.reinforce("tenant", "cashier", cents(5000), Some("change float"))
            .await
            .unwrap();
        desk.withdraw("tenant", "cashier", cents(3000), Some("bank deposit"))
            .await
            .unwrap();
        desk.expense("tenant", "cashier", cents(1200), Some("coffee")).await.unwrap();

        let summary = desk.summary(&session.id).await.unwrap();
        // 100.00 + 50.00 − 30.00 − 12.00
        assert_eq!(summary.expected, cents(10800));
        assert_eq!(summary.entries.len(), 3);
        assert_eq!(summary.entries[0].kind, CashEntryKind::Reinforcement);
    }

    #[tokio::test]
    async fn test_close_divergence_needs_justification() {
        let desk = desk().await;
        desk.open("tenant", "cashier", cents(10000)).await.unwrap();

        let err = desk.close("tenant", "cashier", cents(9000), None).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::ValidationFailed(CoreError::JustificationRequired { .. })
        ));

        let closed = desk
            .close("tenant", "cashier", cents(9000), Some("paid the courier"))
            .await
            .unwrap();
        assert_eq!(closed.status, CashRegisterStatus::Closed);
        assert_eq!(closed.divergence, Some(cents(-1000)));

        let err = desk.close("tenant", "cashier", cents(9000), None).await.unwrap_err();
        assert!(matches!(err, SettlementError::CashRegisterNotOpen(_)));
    }

    #[tokio::test]
    async fn test_close_within_threshold() {
        let desk = desk().await;
        let session = desk.open("tenant", "cashier", cents(10000)).await.unwrap();

        let closed = desk.close("tenant", "cashier", cents(10300), None).await.unwrap();
        assert_eq!(closed.divergence, Some(cents(300)));

        let stored = desk.summary(&session.id).await.unwrap().session;
        assert_eq!(stored.status, CashRegisterStatus::Closed);
        assert_eq!(stored.expected_balance, Some(cents(10000)));

        // A new day can start
        desk.open("tenant", "cashier", cents(10300)).await.unwrap();
    }
}
