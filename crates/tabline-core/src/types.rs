//! # Domain Types
//!
//! Shared enums and reference records used throughout Tabline.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐   │
//! │  │  CatalogItem    │   │ PaymentMethodConfig  │   │ StockMovement   │   │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │   │
//! │  │  kind           │   │  settlement delay    │   │  kind (out/ret) │   │
//! │  │  name, active   │   │  fee %, fixed fee    │   │  quantity       │   │
//! │  │  on_hand        │   │  billing category    │   │  unit value     │   │
//! │  └─────────────────┘   └──────────────────────┘   └─────────────────┘   │
//! │                                                                         │
//! │  Aggregates live in their own modules:                                  │
//! │    order.rs (Order), cash_register.rs (CashRegisterSession),            │
//! │    commission.rs (CommissionRule/Item), receivable.rs (Receivables)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity carries a UUID v4 `id` (as `String`) and the `tenant_id`
//! that owns it. There are no cross-tenant references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Money, Percentage};

/// Generates a new entity identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Item Kind
// =============================================================================

/// Whether an order line sells a service or a retail product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A service performed by a professional.
    Service,
    /// A physical product taken from stock.
    Product,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Service => "service",
            ItemKind::Product => "product",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog metadata for a service or product, as read by the engine.
///
/// `on_hand` is only meaningful for products; services carry zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogItem {
    pub id: String,
    pub tenant_id: String,
    pub kind: ItemKind,
    pub name: String,
    pub is_active: bool,
    pub on_hand: i64,
    /// Unit cost used to value stock movements.
    pub unit_cost: Money,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the tenant books a payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BillingCategory {
    Cash,
    DebitCard,
    CreditCard,
    Transfer,
    Other,
}

/// Tenant configuration of a payment method.
///
/// ## Settlement Delay
/// ```text
/// delay = 0  → money is in hand: receivables are Settled immediately
/// delay > 0  → bank pays later: receivables are Confirmed and a
///              CompensationForecast predicts date and fees
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethodConfig {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Days until the acquirer settles the payment.
    pub settlement_delay_days: i64,
    /// Percentage fee charged by the acquirer.
    pub fee_percentage: Percentage,
    /// Fixed fee charged per transaction.
    pub fixed_fee: Money,
    pub billing_category: BillingCategory,
    pub is_active: bool,
}

impl PaymentMethodConfig {
    /// Name given to the fallback used when a payment's method cannot be resolved.
    pub const GENERIC_NAME: &'static str = "generic";

    /// A zero-delay, fee-free method standing in for an unresolvable one.
    pub fn generic(tenant_id: &str, id: &str) -> Self {
        PaymentMethodConfig {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: Self::GENERIC_NAME.to_string(),
            settlement_delay_days: 0,
            fee_percentage: Percentage::zero(),
            fixed_fee: Money::zero(),
            billing_category: BillingCategory::Other,
            is_active: true,
        }
    }

    /// Returns true if the bank settles this method after the sale date.
    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.settlement_delay_days > 0
    }

    /// Total acquirer fees for a payment of `amount` (percentage + fixed).
    pub fn fees_for(&self, amount: Money) -> Money {
        amount.apply_percentage(self.fee_percentage) + self.fixed_fee
    }

    /// Splits the fixed fee of one payment between its service and product
    /// shares.
    ///
    /// The service part is pro-rated and the product part takes the rest,
    /// so the two always add up to `fixed_fee`.
    pub fn fixed_fee_split(&self, service_share: Money, product_share: Money) -> (Money, Money) {
        let service_fee = self.fixed_fee.prorate(service_share, service_share + product_share);
        (service_fee, self.fixed_fee - service_fee)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Units leaving stock because they were sold.
    Out,
    /// Units coming back because a closed order was canceled.
    Return,
}

impl StockMovementKind {
    /// Signed quantity change this movement applies to on-hand stock.
    pub fn delta(&self, quantity: i64) -> i64 {
        match self {
            StockMovementKind::Out => -quantity,
            StockMovementKind::Return => quantity,
        }
    }
}

/// A single entry in the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub order_id: Option<String>,
    /// Order line that caused the movement. One Out and one Return per line.
    pub order_item_id: Option<String>,
    pub kind: StockMovementKind,
    /// Always positive; direction comes from `kind`.
    pub quantity: i64,
    pub unit_value: Money,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        tenant_id: &str,
        product_id: &str,
        order_id: Option<&str>,
        kind: StockMovementKind,
        quantity: i64,
        unit_value: Money,
    ) -> Self {
        StockMovement {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            product_id: product_id.to_string(),
            order_id: order_id.map(str::to_string),
            order_item_id: None,
            kind,
            quantity,
            unit_value,
            created_at: Utc::now(),
        }
    }

    /// Ties the movement to an order line, making it the line's only one of its kind.
    pub fn with_order_item(mut self, order_item_id: &str) -> Self {
        self.order_item_id = Some(order_item_id.to_string());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_payment_method_is_zero_delay() {
        let method = PaymentMethodConfig::generic("tenant", "pm-404");
        assert_eq!(method.id, "pm-404");
        assert!(!method.is_delayed());
        assert_eq!(method.fees_for(Money::from_cents(5000)), Money::zero());
    }

    #[test]
    fn test_fees_for_card() {
        let card = PaymentMethodConfig {
            settlement_delay_days: 2,
            fee_percentage: Percentage::from_bps(300),
            fixed_fee: Money::from_cents(50),
            billing_category: BillingCategory::CreditCard,
            ..PaymentMethodConfig::generic("tenant", "card")
        };
        assert!(card.is_delayed());
        // 3% of 40.00 = 1.20, plus 0.50 fixed
        assert_eq!(card.fees_for(Money::from_cents(4000)).cents(), 170);
    }

    #[test]
    fn test_fixed_fee_split_adds_up() {
        let card = PaymentMethodConfig {
            fixed_fee: Money::from_cents(50),
            ..PaymentMethodConfig::generic("tenant", "card")
        };
        let (service, product) = card.fixed_fee_split(Money::from_cents(3200), Money::from_cents(800));
        assert_eq!((service.cents(), product.cents()), (40, 10));

        // Pro-rating each half on its own would charge 0.01 twice
        let coin = PaymentMethodConfig {
            fixed_fee: Money::from_cents(1),
            ..PaymentMethodConfig::generic("tenant", "coin")
        };
        let (service, product) = coin.fixed_fee_split(Money::from_cents(5000), Money::from_cents(5000));
        assert_eq!(service + product, Money::from_cents(1));

        // A single-origin payment carries the whole fee
        assert_eq!(card.fixed_fee_split(Money::from_cents(4000), Money::zero()), (Money::from_cents(50), Money::zero()));
        assert_eq!(card.fixed_fee_split(Money::zero(), Money::from_cents(4000)), (Money::zero(), Money::from_cents(50)));
    }

    #[test]
    fn test_stock_movement_delta() {
        assert_eq!(StockMovementKind::Out.delta(3), -3);
        assert_eq!(StockMovementKind::Return.delta(3), 3);
    }

    #[test]
    fn test_stock_movement_line_link() {
        let manual = StockMovement::new("tenant", "prd-1", None, StockMovementKind::Out, 1, Money::zero());
        assert!(manual.order_item_id.is_none());

        let sold = StockMovement::new("tenant", "prd-1", Some("o1"), StockMovementKind::Out, 1, Money::zero())
            .with_order_item("line-1");
        assert_eq!(sold.order_item_id.as_deref(), Some("line-1"));
        assert_eq!(sold.order_id.as_deref(), Some("o1"));
    }

    #[test]
    fn test_enum_wire_format() {
        assert_eq!(serde_json::to_string(&ItemKind::Service).unwrap(), "\"service\"");
        assert_eq!(
            serde_json::to_string(&BillingCategory::CreditCard).unwrap(),
            "\"credit_card\""
        );
    }
}
