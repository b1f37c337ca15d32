//! # tabline-core: Pure Domain Logic for Tabline
//!
//! The domain model of order settlement: customer tabs, the daily cash
//! register, commission rules and the receivable ledger. Everything here is
//! pure; persistence lives in `tabline-db` and orchestration in
//! `tabline-settlement`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tabline Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (HTTP handlers, `settle` binary)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ close_order / cancel_order             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              tabline-settlement (Settlement Engine)             │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────────┐  ┌───────▼────────────────┐   │
//! │  │       ★ tabline-core (THIS CRATE) ★ │  │  tabline-db (SQLite)   │   │
//! │  │                                     │  │  repositories,         │   │
//! │  │  money        Money, Percentage     │  │  migrations            │   │
//! │  │  order        Order state machine   │  └────────────────────────┘   │
//! │  │  cash_register Session, entries     │                               │
//! │  │  commission   Rule resolver         │                               │
//! │  │  receivable   Split, forecasts      │                               │
//! │  │                                     │                               │
//! │  │  NO I/O • NO DATABASE • NO NETWORK  │                               │
//! │  └─────────────────────────────────────┘                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money and Percentage with integer arithmetic
//! - [`order`] - Order aggregate (items, payments, status)
//! - [`cash_register`] - Cash register session and entries
//! - [`commission`] - Commission rule hierarchy and generated commissions
//! - [`receivable`] - Revenue split, receivables and compensation forecasts
//! - [`types`] - Catalog, payment method and stock movement records
//! - [`validation`] - Field validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use tabline_core::{ItemKind, Money, Order};
//!
//! let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
//! let mut order = Order::new("tenant", "customer", "cashier", today);
//! order
//!     .add_item(ItemKind::Service, "haircut", Some("ana"), 1, Money::from_cents(8000), Money::zero())
//!     .unwrap();
//! order.add_payment("cash", Money::from_cents(8000)).unwrap();
//!
//! assert!(order.can_close(Money::from_cents(1)).is_ok());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash_register;
pub mod commission;
pub mod error;
pub mod money;
pub mod order;
pub mod receivable;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cash_register::{CashEntry, CashEntryKind, CashRegisterSession, CashRegisterStatus, EntryLink};
pub use commission::{
    resolve_rule, CalculationBase, CommissionItem, CommissionRateKind, CommissionRule, CommissionScope,
    CommissionStatus, ResolutionContext, ResolvedRule,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percentage};
pub use order::{Order, OrderItem, OrderPayment, OrderStatus};
pub use receivable::{
    CompensationForecast, ForecastStatus, ReceivableAccount, ReceivableOrigin, ReceivableStatus, RevenueSplit,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant used by the binaries when no tenant is configured.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum quantity on a single order line.
///
/// Catches typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of notes, descriptions, reasons and justifications.
pub const MAX_TEXT_LENGTH: usize = 500;

/// Default tolerance when comparing payments against items on close (one cent).
pub const DEFAULT_CLOSE_TOLERANCE: Money = Money::from_cents(1);

/// Default divergence above which closing a cash register needs a justification.
pub const DEFAULT_DIVERGENCE_THRESHOLD: Money = Money::from_cents(500);

/// Default days until a balance left as debt is due.
pub const DEFAULT_DEBT_DUE_DAYS: i64 = 30;
