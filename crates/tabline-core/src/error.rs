//! # Error Types
//!
//! Domain-specific error types for tabline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tabline-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tabline-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  tabline-settlement errors (separate crate)                             │
//! │  └── SettlementError  - What the caller of close/cancel sees            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettlementError → Caller           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations raised by the aggregates before
/// anything is persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Adding items or payments to a closed order
    /// - Closing an order that is already closed or canceled
    /// - Canceling an order that is already canceled
    #[error("Order {order_id} is {current_status}, cannot {operation}")]
    InvalidOrderStatus {
        order_id: String,
        current_status: String,
        operation: String,
    },

    /// Order has no items to settle.
    #[error("Order {0} has no items")]
    EmptyOrder(String),

    /// Order has no payments.
    #[error("Order {0} has no payments")]
    NoPayments(String),

    /// Sum of payments does not match the sum of item final prices.
    ///
    /// ## User Workflow
    /// ```text
    /// Items: 100.00   Payments: 90.00
    ///      │
    ///      ▼
    /// allow_balance_as_debt?  ── yes ──► close, 10.00 becomes a receivable
    ///      │ no
    ///      ▼
    /// TotalsMismatch { items_total: 100.00, payments_total: 90.00 }
    /// ```
    #[error("Order {order_id}: payments {payments_total} do not match items {items_total}")]
    TotalsMismatch {
        order_id: String,
        items_total: Money,
        payments_total: Money,
    },

    /// Order item or payment referenced by id does not exist on the order.
    #[error("Order {order_id} has no line {line_id}")]
    LineNotFound { order_id: String, line_id: String },

    /// A cash register session is already open for the tenant.
    #[error("A cash register session is already open for tenant {0}")]
    CashRegisterAlreadyOpen(String),

    /// Operation requires an open cash register session.
    #[error("Cash register session {0} is closed")]
    CashRegisterClosed(String),

    /// Closing divergence exceeds the threshold and no justification was given.
    #[error("Divergence of {divergence} exceeds {threshold}; a justification is required")]
    JustificationRequired { divergence: Money, threshold: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid date range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
