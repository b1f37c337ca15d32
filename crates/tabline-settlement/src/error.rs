//! # Settlement Error Types
//!
//! ## Error Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Settlement Error Categories                         │
//! │                                                                         │
//! │  STRUCTURAL (returned, nothing mutated)     STORAGE                     │
//! │  ───────────────────────────────────        ───────                     │
//! │  NotFound            AlreadyClosed          Storage(DbError)            │
//! │  AlreadyCanceled     CashRegisterNotOpen                                │
//! │  ValidationFailed    InsufficientStock      CONFIGURATION               │
//! │                                             ─────────────               │
//! │                                             Config                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step-level degradations (catalog miss, failed stock movement, no
//! commission rule, unknown payment method) are NOT errors: they are logged
//! and collected in the settlement report. [`StepError`] names them while
//! they travel to the report.

use tabline_core::CoreError;
use tabline_db::DbError;
use thiserror::Error;

use crate::ports::PortError;

/// Result type alias for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

#[derive(Debug, Error)]
pub enum SettlementError {
    // =========================================================================
    // Structural Errors
    // =========================================================================
    /// The order (or another required record) does not exist for the tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Order {0} is already closed")]
    AlreadyClosed(String),

    #[error("Order {0} is already canceled")]
    AlreadyCanceled(String),

    /// No cash register session is open for the tenant.
    #[error("No cash register session is open for tenant {0}")]
    CashRegisterNotOpen(String),

    /// A domain rule rejected the operation (totals mismatch, empty order,
    /// justification required, register already open, ...).
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] CoreError),

    /// Only raised under the `reject` negative-stock policy.
    #[error("Insufficient stock for {product_id}: on hand {on_hand}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        on_hand: i64,
        requested: i64,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SettlementError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SettlementError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true if the request was rejected before any ledger was touched.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SettlementError::NotFound { .. }
                | SettlementError::AlreadyClosed(_)
                | SettlementError::AlreadyCanceled(_)
                | SettlementError::CashRegisterNotOpen(_)
                | SettlementError::ValidationFailed(_)
                | SettlementError::InsufficientStock { .. }
        )
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Lost races and a busy pool are retryable. Every ledger write of a
    /// close is keyed by its order line or payment, so a retry books only
    /// what the failed run left out.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::Storage(DbError::Conflict { .. } | DbError::PoolExhausted)
        )
    }
}

/// Why a best-effort step left a line unbooked.
///
/// Never returned from the engine. Its message lands in the step log.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{entity} {id} not found in catalog")]
    Missing { entity: &'static str, id: String },

    #[error("catalog lookup failed: {0}")]
    Catalog(#[source] PortError),

    #[error("stock movement failed: {0}")]
    Movement(#[source] PortError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SettlementError {
    fn from(err: std::io::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SettlementError {
    fn from(err: toml::de::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SettlementError {
    fn from(err: toml::ser::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors() {
        assert!(SettlementError::AlreadyClosed("o1".into()).is_structural());
        assert!(SettlementError::CashRegisterNotOpen("t".into()).is_structural());
        assert!(SettlementError::ValidationFailed(CoreError::EmptyOrder("o1".into())).is_structural());
        assert!(!SettlementError::Storage(DbError::PoolExhausted).is_structural());
        assert!(!SettlementError::Config("bad".into()).is_structural());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SettlementError::Storage(DbError::conflict("Order", "o1")).is_retryable());
        assert!(SettlementError::Storage(DbError::PoolExhausted).is_retryable());
        assert!(!SettlementError::Storage(DbError::not_found("Order", "o1")).is_retryable());
        assert!(!SettlementError::AlreadyCanceled("o1".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SettlementError::InsufficientStock {
            product_id: "prd-pomade".into(),
            on_hand: 1,
            requested: 3,
        };
        assert!(err.to_string().contains("prd-pomade"));
        assert!(err.to_string().contains("requested 3"));
    }

    #[test]
    fn test_step_error_display() {
        let missing = StepError::Missing {
            entity: "product",
            id: "prd-gone".into(),
        };
        assert_eq!(missing.to_string(), "product prd-gone not found in catalog");

        let down = StepError::Movement(PortError::Unavailable("service down".into()));
        assert_eq!(down.to_string(), "stock movement failed: Collaborator unavailable: service down");
        assert!(std::error::Error::source(&down).is_some());
    }
}
