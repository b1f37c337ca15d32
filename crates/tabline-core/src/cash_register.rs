//! # Cash Register Aggregate
//!
//! The tenant's single active daily cash ledger.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Register Session                               │
//! │                                                                         │
//! │  open(tenant, user, opening_balance)                                    │
//! │       │   (fails AlreadyOpen if the tenant has an open session)         │
//! │       ▼                                                                 │
//! │  ┌────────────────────────────────────────────┐                         │
//! │  │ OPEN                                       │                         │
//! │  │  record_entry(Sale | Withdrawal |          │  append-only entries,   │
//! │  │               Reinforcement | Expense)     │  running totals updated │
//! │  └────────────────────────────────────────────┘                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  close(user, actual, justification)                                     │
//! │       expected   = opening + sales + reinforcements                     │
//! │                    − withdrawals − expenses                             │
//! │       divergence = actual − expected                                    │
//! │       |divergence| > threshold && no justification → JustificationRequired│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CLOSED (totals frozen, a new session may open)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::new_id;
use crate::validation::{validate_optional_text, validate_positive_amount, validate_price};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CashRegisterStatus {
    Open,
    Closed,
}

/// What a cash entry does to the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CashEntryKind {
    /// Money committed at the point of sale (any payment method).
    Sale,
    /// Money taken out (also used to reverse sales on cancellation).
    Withdrawal,
    /// Money put in (change float top-up).
    Reinforcement,
    /// Money paid out for an expense.
    Expense,
}

impl CashEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashEntryKind::Sale => "sale",
            CashEntryKind::Withdrawal => "withdrawal",
            CashEntryKind::Reinforcement => "reinforcement",
            CashEntryKind::Expense => "expense",
        }
    }

    /// Effect on the expected drawer balance: +1 or −1.
    pub fn sign(&self) -> i64 {
        match self {
            CashEntryKind::Sale | CashEntryKind::Reinforcement => 1,
            CashEntryKind::Withdrawal | CashEntryKind::Expense => -1,
        }
    }
}

impl fmt::Display for CashEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Entry
// =============================================================================

/// Links a cash entry to the order payment that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryLink {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
}

impl EntryLink {
    pub fn none() -> Self {
        EntryLink::default()
    }

    pub fn payment(order_id: &str, payment_id: &str) -> Self {
        EntryLink {
            order_id: Some(order_id.to_string()),
            payment_id: Some(payment_id.to_string()),
        }
    }
}

/// One append-only line in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashEntry {
    pub id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub kind: CashEntryKind,
    pub amount: Money,
    pub description: Option<String>,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Session
// =============================================================================

/// A cash register session.
///
/// Running totals are kept on the aggregate so a read right after a write
/// sees them without summing entries. `version` increases with every entry
/// and is used as the optimistic guard when closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegisterSession {
    pub id: String,
    pub tenant_id: String,
    pub status: CashRegisterStatus,
    pub opening_balance: Money,
    pub opened_by: String,
    pub opened_at: DateTime<Utc>,
    pub total_sales: Money,
    pub total_withdrawals: Money,
    pub total_reinforcements: Money,
    pub total_expenses: Money,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closing_balance: Option<Money>,
    pub expected_balance: Option<Money>,
    pub divergence: Option<Money>,
    pub justification: Option<String>,
    pub version: i64,
    /// Entries recorded through this instance, not yet read back from storage.
    #[serde(skip)]
    pub entries: Vec<CashEntry>,
}

impl CashRegisterSession {
    /// Opens a new session.
    ///
    /// `current` is the tenant's currently open session, if any; passing one
    /// fails with `CashRegisterAlreadyOpen`. Storage enforces the same rule
    /// with a unique index, so a racing open still fails there.
    pub fn open(
        tenant_id: &str,
        opened_by: &str,
        opening_balance: Money,
        current: Option<&CashRegisterSession>,
    ) -> CoreResult<Self> {
        if current.is_some_and(|s| s.status == CashRegisterStatus::Open) {
            return Err(CoreError::CashRegisterAlreadyOpen(tenant_id.to_string()));
        }
        validate_price("opening_balance", opening_balance)?;

        Ok(CashRegisterSession {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            status: CashRegisterStatus::Open,
            opening_balance,
            opened_by: opened_by.to_string(),
            opened_at: Utc::now(),
            total_sales: Money::zero(),
            total_withdrawals: Money::zero(),
            total_reinforcements: Money::zero(),
            total_expenses: Money::zero(),
            closed_by: None,
            closed_at: None,
            closing_balance: None,
            expected_balance: None,
            divergence: None,
            justification: None,
            version: 0,
            entries: Vec::new(),
        })
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == CashRegisterStatus::Open
    }

    /// Appends an entry and updates the matching running total.
    pub fn record_entry(
        &mut self,
        kind: CashEntryKind,
        amount: Money,
        user_id: &str,
        description: Option<&str>,
        link: EntryLink,
    ) -> CoreResult<CashEntry> {
        self.ensure_open()?;
        validate_positive_amount("cash entry amount", amount)?;
        let description = validate_optional_text("description", description)?;

        match kind {
            CashEntryKind::Sale => self.total_sales += amount,
            CashEntryKind::Withdrawal => self.total_withdrawals += amount,
            CashEntryKind::Reinforcement => self.total_reinforcements += amount,
            CashEntryKind::Expense => self.total_expenses += amount,
        }
        self.version += 1;

        let entry = CashEntry {
            id: new_id(),
            session_id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            kind,
            amount,
            description,
            order_id: link.order_id,
            payment_id: link.payment_id,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// `opening + sales + reinforcements − withdrawals − expenses`.
    pub fn expected(&self) -> Money {
        self.opening_balance + self.total_sales + self.total_reinforcements
            - self.total_withdrawals
            - self.total_expenses
    }

    /// `actual − expected`. Positive means there is more cash than expected.
    pub fn divergence_for(&self, actual: Money) -> Money {
        actual - self.expected()
    }

    /// Closes the session and returns the divergence.
    ///
    /// ## Example
    /// ```rust
    /// use tabline_core::cash_register::CashRegisterSession;
    /// use tabline_core::money::Money;
    ///
    /// let mut session = CashRegisterSession::open("t", "u", Money::from_cents(10000), None).unwrap();
    /// let threshold = Money::from_cents(500);
    ///
    /// // 6.00 short, no justification
    /// assert!(session.close("u", Money::from_cents(9400), None, threshold).is_err());
    /// // With a justification it closes
    /// let divergence = session
    ///     .close("u", Money::from_cents(9400), Some("paid courier"), threshold)
    ///     .unwrap();
    /// assert_eq!(divergence.cents(), -600);
    /// ```
    pub fn close(
        &mut self,
        closed_by: &str,
        actual: Money,
        justification: Option<&str>,
        threshold: Money,
    ) -> CoreResult<Money> {
        self.ensure_open()?;
        validate_price("closing_balance", actual)?;
        let justification = validate_optional_text("justification", justification)?;

        let expected = self.expected();
        let divergence = actual - expected;
        if divergence.abs() > threshold.abs() && justification.is_none() {
            return Err(CoreError::JustificationRequired {
                divergence,
                threshold: threshold.abs(),
            });
        }

        self.status = CashRegisterStatus::Closed;
        self.closed_by = Some(closed_by.to_string());
        self.closed_at = Some(Utc::now());
        self.closing_balance = Some(actual);
        self.expected_balance = Some(expected);
        self.divergence = Some(divergence);
        self.justification = justification;
        Ok(divergence)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::CashRegisterClosed(self.id.clone()));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    fn open_session() -> CashRegisterSession {
        CashRegisterSession::open("tenant", "cashier", cents(10000), None).unwrap()
    }

    #[test]
    fn test_open_fails_when_already_open() {
        let current = open_session();
        let err = CashRegisterSession::open("tenant", "cashier", cents(0), Some(&current)).unwrap_err();
        assert!(matches!(err, CoreError::CashRegisterAlreadyOpen(_)));
    }

    #[test]
    fn test_open_after_previous_closed() {
        let mut previous = open_session();
        previous.close("cashier", cents(10000), None, cents(500)).unwrap();
        assert!(CashRegisterSession::open("tenant", "cashier", cents(0), Some(&previous)).is_ok());
    }

    #[test]
    fn test_record_entry_updates_totals() {
        let mut session = open_session();
        session
            .record_entry(CashEntryKind::Sale, cents(6000), "cashier", None, EntryLink::payment("o", "p"))
            .unwrap();
        session
            .record_entry(CashEntryKind::Reinforcement, cents(2000), "cashier", Some("float"), EntryLink::none())
            .unwrap();
        session
            .record_entry(CashEntryKind::Withdrawal, cents(1500), "cashier", None, EntryLink::none())
            .unwrap();
        session
            .record_entry(CashEntryKind::Expense, cents(500), "cashier", Some("coffee"), EntryLink::none())
            .unwrap();

        assert_eq!(session.total_sales, cents(6000));
        assert_eq!(session.total_reinforcements, cents(2000));
        assert_eq!(session.total_withdrawals, cents(1500));
        assert_eq!(session.total_expenses, cents(500));
        assert_eq!(session.expected(), cents(16000));
        assert_eq!(session.entries.len(), 4);
        assert_eq!(session.version, 4);
        assert_eq!(session.entries[0].payment_id.as_deref(), Some("p"));
    }

    #[test]
    fn test_record_entry_requires_positive_amount() {
        let mut session = open_session();
        assert!(session
            .record_entry(CashEntryKind::Sale, Money::zero(), "cashier", None, EntryLink::none())
            .is_err());
        assert_eq!(session.version, 0);
    }

    #[test]
    fn test_close_within_threshold() {
        let mut session = open_session();
        // Exactly at the threshold is accepted
        let divergence = session.close("cashier", cents(10500), None, cents(500)).unwrap();
        assert_eq!(divergence, cents(500));
        assert_eq!(session.status, CashRegisterStatus::Closed);
        assert_eq!(session.expected_balance, Some(cents(10000)));
    }

    #[test]
    fn test_close_requires_justification_over_threshold() {
        let mut session = open_session();
        let err = session.close("cashier", cents(10501), None, cents(500)).unwrap_err();
        assert!(matches!(err, CoreError::JustificationRequired { .. }));
        assert!(session.is_open());

        let err = session.close("cashier", cents(9000), Some("  "), cents(500)).unwrap_err();
        assert!(matches!(err, CoreError::JustificationRequired { .. }));

        session
            .close("cashier", cents(9000), Some("change given twice"), cents(500))
            .unwrap();
        assert_eq!(session.divergence, Some(cents(-1000)));
        assert_eq!(session.justification.as_deref(), Some("change given twice"));
    }

    #[test]
    fn test_closed_session_is_frozen() {
        let mut session = open_session();
        session.close("cashier", cents(10000), None, cents(500)).unwrap();
        assert!(matches!(
            session.record_entry(CashEntryKind::Sale, cents(100), "cashier", None, EntryLink::none()),
            Err(CoreError::CashRegisterClosed(_))
        ));
        assert!(session.close("cashier", cents(10000), None, cents(500)).is_err());
    }
}
