//! # Order Aggregate
//!
//! A customer's tab ("command"): items, payments and the status state machine.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order State Machine                              │
//! │                                                                         │
//! │            add/remove items & payments                                  │
//! │                 ┌──────┐                                                │
//! │                 ▼      │                                                │
//! │              ┌──────────┐   close(by)   ┌──────────┐                    │
//! │   new() ───► │   Open   │ ────────────► │  Closed  │                    │
//! │              └────┬─────┘               └────┬─────┘                    │
//! │                   │ cancel(by, reason)       │ cancel(by, reason)       │
//! │                   │                          │ (settlement reversed)    │
//! │                   ▼                          ▼                          │
//! │              ┌─────────────────────────────────────┐                    │
//! │              │              Canceled               │  terminal          │
//! │              └─────────────────────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once Closed or Canceled, items and payments are frozen; only the status
//! (and the closing/cancellation stamps) may change.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{new_id, ItemKind};
use crate::validation::{
    validate_optional_text, validate_positive_amount, validate_price, validate_quantity,
    validate_required_text,
};

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Items and payments are still being added.
    #[default]
    Open,
    /// Settled: stock, commissions, cash and receivables are booked.
    Closed,
    /// Terminal. Reached from Open directly or from Closed via reversal.
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Closed => "closed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line on an order.
///
/// `final_price` is the line amount after any per-line discount; the order
/// total is the sum of final prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub kind: ItemKind,
    /// Service or product id in the catalog.
    pub catalog_item_id: String,
    /// Professional credited with the sale (commission recipient).
    pub professional_id: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub final_price: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Builds a validated line: `final_price = unit_price × quantity − discount`.
    pub fn new(
        order_id: &str,
        kind: ItemKind,
        catalog_item_id: &str,
        professional_id: Option<&str>,
        quantity: i64,
        unit_price: Money,
        discount: Money,
    ) -> CoreResult<Self> {
        validate_quantity(quantity)?;
        validate_price("unit_price", unit_price)?;
        validate_price("discount", discount)?;
        let catalog_item_id = validate_required_text("catalog_item_id", catalog_item_id)?;

        let final_price = unit_price.multiply_quantity(quantity) - discount;
        validate_price("final_price", final_price)?;

        Ok(OrderItem {
            id: new_id(),
            order_id: order_id.to_string(),
            kind,
            catalog_item_id,
            professional_id: professional_id.map(str::to_string),
            quantity,
            unit_price,
            final_price,
            created_at: Utc::now(),
        })
    }

    #[inline]
    pub fn is_product(&self) -> bool {
        self.kind == ItemKind::Product
    }
}

// =============================================================================
// Order Payment
// =============================================================================

/// A payment received against an order. A tab may be split across methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderPayment {
    pub id: String,
    pub order_id: String,
    pub payment_method_id: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderPayment {
    pub fn new(order_id: &str, payment_method_id: &str, amount: Money) -> CoreResult<Self> {
        validate_positive_amount("payment amount", amount)?;
        let payment_method_id = validate_required_text("payment_method_id", payment_method_id)?;

        Ok(OrderPayment {
            id: new_id(),
            order_id: order_id.to_string(),
            payment_method_id,
            amount,
            created_at: Utc::now(),
        })
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer's tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    /// Branch where the order was taken (used by unit-level commission rules).
    pub unit_id: Option<String>,
    pub appointment_id: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub payments: Vec<OrderPayment>,
    /// Payments above the total are kept as a tip instead of failing the close.
    pub allow_tip_as_change: bool,
    /// Payments below the total leave the balance as a receivable.
    pub allow_balance_as_debt: bool,
    pub notes: Option<String>,
    /// Receivable auto-created for a balance left as debt.
    pub debt_receivable_id: Option<String>,
    /// Commission reference date.
    pub business_date: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub canceled_by: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Order {
    /// Starts a new, empty, open tab.
    pub fn new(tenant_id: &str, customer_id: &str, created_by: &str, business_date: NaiveDate) -> Self {
        let now = Utc::now();
        Order {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            customer_id: customer_id.to_string(),
            unit_id: None,
            appointment_id: None,
            status: OrderStatus::Open,
            items: Vec::new(),
            payments: Vec::new(),
            allow_tip_as_change: false,
            allow_balance_as_debt: false,
            notes: None,
            debt_receivable_id: None,
            business_date,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            closed_by: None,
            closed_at: None,
            canceled_by: None,
            canceled_at: None,
            cancel_reason: None,
        }
    }

    pub fn with_unit(mut self, unit_id: &str) -> Self {
        self.unit_id = Some(unit_id.to_string());
        self
    }

    pub fn with_appointment(mut self, appointment_id: &str) -> Self {
        self.appointment_id = Some(appointment_id.to_string());
        self
    }

    // =========================================================================
    // Editing (Open only)
    // =========================================================================

    /// Adds a line to the tab and returns it.
    pub fn add_item(
        &mut self,
        kind: ItemKind,
        catalog_item_id: &str,
        professional_id: Option<&str>,
        quantity: i64,
        unit_price: Money,
        discount: Money,
    ) -> CoreResult<&OrderItem> {
        self.ensure_open("add items")?;
        let item = OrderItem::new(
            &self.id,
            kind,
            catalog_item_id,
            professional_id,
            quantity,
            unit_price,
            discount,
        )?;
        self.items.push(item);
        self.touch();
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<OrderItem> {
        self.ensure_open("remove items")?;
        let idx = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| self.line_not_found(item_id))?;
        self.touch();
        Ok(self.items.remove(idx))
    }

    /// Records a payment on the tab and returns it.
    pub fn add_payment(&mut self, payment_method_id: &str, amount: Money) -> CoreResult<&OrderPayment> {
        self.ensure_open("add payments")?;
        let payment = OrderPayment::new(&self.id, payment_method_id, amount)?;
        self.payments.push(payment);
        self.touch();
        Ok(&self.payments[self.payments.len() - 1])
    }

    pub fn remove_payment(&mut self, payment_id: &str) -> CoreResult<OrderPayment> {
        self.ensure_open("remove payments")?;
        let idx = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or_else(|| self.line_not_found(payment_id))?;
        self.touch();
        Ok(self.payments.remove(idx))
    }

    pub fn set_notes(&mut self, notes: Option<&str>) -> CoreResult<()> {
        self.ensure_open("edit notes")?;
        self.notes = validate_optional_text("notes", notes)?;
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Sum of item final prices.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|i| i.final_price).sum()
    }

    /// Sum of final prices of Service lines.
    pub fn services_total(&self) -> Money {
        self.total_of(ItemKind::Service)
    }

    /// Sum of final prices of Product lines.
    pub fn products_total(&self) -> Money {
        self.total_of(ItemKind::Product)
    }

    pub fn payments_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// `items_total − payments_total`: positive means underpaid.
    pub fn balance(&self) -> Money {
        self.items_total() - self.payments_total()
    }

    /// Amount left as debt on close (zero unless underpaid and allowed).
    pub fn debt_amount(&self) -> Money {
        let balance = self.balance();
        if self.allow_balance_as_debt && balance.is_positive() {
            balance
        } else {
            Money::zero()
        }
    }

    /// Amount kept as tip on close (zero unless overpaid and allowed).
    pub fn tip_amount(&self) -> Money {
        let balance = self.balance();
        if self.allow_tip_as_change && balance.is_negative() {
            balance.abs()
        } else {
            Money::zero()
        }
    }

    fn total_of(&self, kind: ItemKind) -> Money {
        self.items
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.final_price)
            .sum()
    }

    // =========================================================================
    // State Machine
    // =========================================================================

    /// Checks whether the tab may be closed.
    ///
    /// ## Rules
    /// ```text
    /// status != Open                         → InvalidOrderStatus
    /// no items                               → EmptyOrder
    /// no payments                            → NoPayments
    /// |items − payments| <= tolerance        → OK
    /// underpaid and allow_balance_as_debt    → OK (balance becomes debt)
    /// overpaid  and allow_tip_as_change      → OK (excess is a tip)
    /// otherwise                              → TotalsMismatch
    /// ```
    pub fn can_close(&self, tolerance: Money) -> CoreResult<()> {
        self.ensure_open("close")?;

        if self.items.is_empty() {
            return Err(CoreError::EmptyOrder(self.id.clone()));
        }
        if self.payments.is_empty() {
            return Err(CoreError::NoPayments(self.id.clone()));
        }

        let balance = self.balance();
        if balance.abs() <= tolerance.abs() {
            return Ok(());
        }
        if balance.is_positive() && self.allow_balance_as_debt {
            return Ok(());
        }
        if balance.is_negative() && self.allow_tip_as_change {
            return Ok(());
        }

        Err(CoreError::TotalsMismatch {
            order_id: self.id.clone(),
            items_total: self.items_total(),
            payments_total: self.payments_total(),
        })
    }

    /// Transitions Open → Closed.
    pub fn close(&mut self, closed_by: &str) -> CoreResult<()> {
        self.ensure_open("close")?;
        let now = Utc::now();
        self.status = OrderStatus::Closed;
        self.closed_by = Some(closed_by.to_string());
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transitions Open/Closed → Canceled and returns the previous status.
    pub fn cancel(&mut self, canceled_by: &str, reason: &str) -> CoreResult<OrderStatus> {
        if self.status == OrderStatus::Canceled {
            return Err(self.invalid_status("cancel"));
        }
        let reason = validate_required_text("cancel_reason", reason)?;

        let previous = self.status;
        let now = Utc::now();
        self.status = OrderStatus::Canceled;
        self.canceled_by = Some(canceled_by.to_string());
        self.canceled_at = Some(now);
        self.cancel_reason = Some(reason);
        self.updated_at = now;
        Ok(previous)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    fn ensure_open(&self, operation: &str) -> CoreResult<()> {
        if self.status != OrderStatus::Open {
            return Err(self.invalid_status(operation));
        }
        Ok(())
    }

    fn invalid_status(&self, operation: &str) -> CoreError {
        CoreError::InvalidOrderStatus {
            order_id: self.id.clone(),
            current_status: self.status.to_string(),
            operation: operation.to_string(),
        }
    }

    fn line_not_found(&self, line_id: &str) -> CoreError {
        CoreError::LineNotFound {
            order_id: self.id.clone(),
            line_id: line_id.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    /// 80.00 haircut + 20.00 pomade, paid 60.00 cash + 40.00 card.
    fn sample_order() -> Order {
        let mut order = Order::new("tenant", "customer", "cashier", today());
        order
            .add_item(ItemKind::Service, "svc-cut", Some("pro-1"), 1, cents(8000), Money::zero())
            .unwrap();
        order
            .add_item(ItemKind::Product, "prd-pomade", Some("pro-1"), 1, cents(2000), Money::zero())
            .unwrap();
        order.add_payment("pm-cash", cents(6000)).unwrap();
        order.add_payment("pm-card", cents(4000)).unwrap();
        order
    }

    #[test]
    fn test_totals() {
        let order = sample_order();
        assert_eq!(order.items_total(), cents(10000));
        assert_eq!(order.services_total(), cents(8000));
        assert_eq!(order.products_total(), cents(2000));
        assert_eq!(order.payments_total(), cents(10000));
        assert_eq!(order.balance(), Money::zero());
    }

    #[test]
    fn test_item_final_price_applies_discount() {
        let item = OrderItem::new("o", ItemKind::Product, "p", None, 3, cents(500), cents(200)).unwrap();
        assert_eq!(item.final_price, cents(1300));

        let over = OrderItem::new("o", ItemKind::Product, "p", None, 1, cents(500), cents(600));
        assert!(over.is_err());
        assert!(OrderItem::new("o", ItemKind::Product, "p", None, 0, cents(500), Money::zero()).is_err());
    }

    #[test]
    fn test_payment_must_be_positive() {
        let mut order = Order::new("tenant", "customer", "cashier", today());
        assert!(order.add_payment("pm-cash", Money::zero()).is_err());
        assert!(order.add_payment("pm-cash", cents(-100)).is_err());
    }

    #[test]
    fn test_can_close_balanced() {
        assert!(sample_order().can_close(Money::zero()).is_ok());
    }

    #[test]
    fn test_can_close_requires_items_and_payments() {
        let order = Order::new("tenant", "customer", "cashier", today());
        assert!(matches!(order.can_close(Money::zero()), Err(CoreError::EmptyOrder(_))));

        let mut order = Order::new("tenant", "customer", "cashier", today());
        order
            .add_item(ItemKind::Service, "svc", None, 1, cents(1000), Money::zero())
            .unwrap();
        assert!(matches!(order.can_close(Money::zero()), Err(CoreError::NoPayments(_))));
    }

    #[test]
    fn test_can_close_mismatch_and_tolerance() {
        let mut order = sample_order();
        let card = order.payments[1].id.clone();
        order.remove_payment(&card).unwrap();
        order.add_payment("pm-card", cents(3999)).unwrap();

        assert!(matches!(
            order.can_close(Money::zero()),
            Err(CoreError::TotalsMismatch { .. })
        ));
        assert!(order.can_close(cents(1)).is_ok());
    }

    #[test]
    fn test_debt_and_tip_bypass_equality() {
        let mut order = sample_order();
        let card = order.payments[1].id.clone();
        order.remove_payment(&card).unwrap();
        assert!(order.can_close(Money::zero()).is_err());

        order.allow_balance_as_debt = true;
        assert!(order.can_close(Money::zero()).is_ok());
        assert_eq!(order.debt_amount(), cents(4000));
        assert_eq!(order.tip_amount(), Money::zero());

        let mut order = sample_order();
        order.add_payment("pm-cash", cents(500)).unwrap();
        assert!(order.can_close(Money::zero()).is_err());
        order.allow_tip_as_change = true;
        assert!(order.can_close(Money::zero()).is_ok());
        assert_eq!(order.tip_amount(), cents(500));
        assert_eq!(order.debt_amount(), Money::zero());
    }

    #[test]
    fn test_close_freezes_lines() {
        let mut order = sample_order();
        order.close("cashier").unwrap();
        assert_eq!(order.status, OrderStatus::Closed);
        assert_eq!(order.closed_by.as_deref(), Some("cashier"));
        assert!(order.closed_at.is_some());

        assert!(matches!(
            order.add_payment("pm-cash", cents(100)),
            Err(CoreError::InvalidOrderStatus { .. })
        ));
        assert!(order.close("cashier").is_err());
    }

    #[test]
    fn test_cancel_transitions() {
        let mut open = sample_order();
        assert_eq!(open.cancel("manager", "customer left").unwrap(), OrderStatus::Open);
        assert_eq!(open.status, OrderStatus::Canceled);

        let mut closed = sample_order();
        closed.close("cashier").unwrap();
        assert_eq!(closed.cancel("manager", "wrong tab").unwrap(), OrderStatus::Closed);
        assert_eq!(closed.cancel_reason.as_deref(), Some("wrong tab"));

        // Nothing leaves Canceled
        assert!(closed.cancel("manager", "again").is_err());
        assert!(closed.close("cashier").is_err());
    }

    #[test]
    fn test_cancel_requires_reason() {
        let mut order = sample_order();
        assert!(order.cancel("manager", "   ").is_err());
        assert_eq!(order.status, OrderStatus::Open);
    }
}
