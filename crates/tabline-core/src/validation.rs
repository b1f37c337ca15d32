//! # Validation Module
//!
//! Input validation utilities for orders, cash entries and rule setup.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP handlers, out of scope)                          │
//! │  └── Deserialization, basic format checks                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Aggregates (Rust)                                             │
//! │  └── THIS MODULE: field rules, called by Order / CashRegisterSession    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK constraints (quantity > 0, amount > 0)                       │
//! │  └── UNIQUE constraints (idempotency keys, one open register)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::{Money, Percentage};
use crate::{MAX_ITEM_QUANTITY, MAX_TEXT_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price (unit or final). Zero is allowed (courtesy items).
///
/// ## Example
/// ```rust
/// use tabline_core::money::Money;
/// use tabline_core::validation::validate_price;
///
/// assert!(validate_price("final_price", Money::from_cents(0)).is_ok());
/// assert!(validate_price("final_price", Money::from_cents(-1)).is_err());
/// ```
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates an amount that must be strictly positive
/// (payments and cash register entries).
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points: 0% to 100%.
pub fn validate_percentage(field: &str, rate: Percentage) -> ValidationResult<()> {
    if rate > Percentage::FULL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Percentage::FULL.bps() as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Text / Date Validators
// =============================================================================

/// Validates an optional free-text field (notes, justification, reason).
///
/// ## Returns
/// The trimmed text, or `None` when the input is empty after trimming.
pub fn validate_optional_text(field: &str, text: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LENGTH,
        });
    }

    Ok(Some(text.to_string()))
}

/// Validates a required free-text field.
pub fn validate_required_text(field: &str, text: &str) -> ValidationResult<String> {
    validate_optional_text(field, Some(text))?.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

/// Validates an effective date range (both ends inclusive, either open).
pub fn validate_date_range(from: Option<NaiveDate>, until: Option<NaiveDate>) -> ValidationResult<()> {
    if let (Some(from), Some(until)) = (from, until) {
        if until < from {
            return Err(ValidationError::InvalidFormat {
                field: "effective_until".to_string(),
                reason: format!("{} is before {}", until, from),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price("unit_price", Money::zero()).is_ok());
        assert!(validate_price("unit_price", Money::from_cents(-1)).is_err());
        assert!(validate_positive_amount("amount", Money::from_cents(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage("fee", Percentage::from_bps(300)).is_ok());
        assert!(validate_percentage("fee", Percentage::FULL).is_ok());
        assert!(validate_percentage("fee", Percentage::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_optional_text("notes", Some("  ")).unwrap(), None);
        assert_eq!(
            validate_optional_text("notes", Some(" counted twice ")).unwrap(),
            Some("counted twice".to_string())
        );
        let long = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(validate_optional_text("notes", Some(&long)).is_err());
        assert!(matches!(
            validate_required_text("reason", ""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_date_range() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1);
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1);
        assert!(validate_date_range(jan, feb).is_ok());
        assert!(validate_date_range(None, feb).is_ok());
        assert!(validate_date_range(feb, jan).is_err());
    }
}
