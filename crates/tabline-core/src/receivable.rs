//! # Receivables and Compensation Forecasts
//!
//! Pure construction of the receivable ledger records produced by settlement.
//!
//! ## Payment → Receivables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment 40.00 (card, delay 2d, 3%, fixed 0.50)                         │
//! │  services 80.00 / products 20.00                                        │
//! │                                                                         │
//! │  RevenueSplit::split(40.00) → Service 32.00, Product 8.00               │
//! │                                                                         │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐    │
//! │  │ Receivable (service)         │   │ Receivable (product)         │    │
//! │  │ key  = {payment}:service     │   │ key  = {payment}:product     │    │
//! │  │ Confirmed, due today + 2d    │   │ Confirmed, due today + 2d    │    │
//! │  └──────────────┬───────────────┘   └──────────────┬───────────────┘    │
//! │                 ▼                                  ▼                    │
//! │  Forecast: 3% = 0.96, fixed 0.40     Forecast: 3% = 0.24, fixed 0.10    │
//! │                                                                         │
//! │  Zero-delay methods: receivables are Settled at once, no forecast.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Money, Percentage};
use crate::types::{new_id, PaymentMethodConfig};

// =============================================================================
// Enums
// =============================================================================

/// The revenue stream a receivable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReceivableOrigin {
    Service,
    Product,
    /// Recurring plans. Never produced by order settlement.
    Subscription,
}

impl ReceivableOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableOrigin::Service => "service",
            ReceivableOrigin::Product => "product",
            ReceivableOrigin::Subscription => "subscription",
        }
    }
}

impl fmt::Display for ReceivableOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    /// Owed, nothing received yet (balance left as debt).
    Pending,
    /// Paid by a delayed method, waiting for the bank.
    Confirmed,
    /// Money in hand.
    Settled,
    /// Undone by an order cancellation.
    Reversed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Forecast,
    Confirmed,
    Settled,
    Canceled,
}

// =============================================================================
// Revenue Split
// =============================================================================

/// Proportion between service and product revenue on an order.
///
/// The service share of an amount is pro-rated and rounded; the product
/// share is the remainder, so the two always add up to the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueSplit {
    pub services: Money,
    pub products: Money,
}

impl RevenueSplit {
    pub fn new(services: Money, products: Money) -> Self {
        RevenueSplit { services, products }
    }

    /// Returns `(service_share, product_share)` of `amount`.
    ///
    /// An order with nothing but zero-priced lines books everything as
    /// service revenue.
    pub fn split(&self, amount: Money) -> (Money, Money) {
        let whole = self.services + self.products;
        if whole.is_zero() {
            return (amount, Money::zero());
        }
        let service = amount.prorate(self.services, whole);
        (service, amount - service)
    }

    /// The origin carrying the larger share (ties go to services).
    pub fn dominant_origin(&self) -> ReceivableOrigin {
        if self.products > self.services {
            ReceivableOrigin::Product
        } else {
            ReceivableOrigin::Service
        }
    }
}

// =============================================================================
// Receivable Account
// =============================================================================

/// An amount owed to the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReceivableAccount {
    pub id: String,
    pub tenant_id: String,
    pub origin: ReceivableOrigin,
    pub amount: Money,
    /// Part of `amount` not yet received.
    pub open_amount: Money,
    pub status: ReceivableStatus,
    pub due_date: NaiveDate,
    pub settled_at: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    /// Natural key making creation idempotent.
    pub idempotency_key: String,
    pub reversal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReceivableAccount {
    /// `{payment_id}:{origin}`.
    pub fn payment_key(payment_id: &str, origin: ReceivableOrigin) -> String {
        format!("{}:{}", payment_id, origin)
    }

    /// `order:{order_id}:balance`.
    pub fn debt_key(order_id: &str) -> String {
        format!("order:{}:balance", order_id)
    }

    /// Receivable for one origin's share of a payment.
    ///
    /// Zero-delay methods are Settled at `now` with nothing left open.
    /// Delayed methods are Confirmed and due `delay` days after `now`.
    pub fn for_payment(
        tenant_id: &str,
        order_id: &str,
        payment_id: &str,
        origin: ReceivableOrigin,
        amount: Money,
        method: &PaymentMethodConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let (status, open_amount, settled_at) = if method.is_delayed() {
            (ReceivableStatus::Confirmed, amount, None)
        } else {
            (ReceivableStatus::Settled, Money::zero(), Some(now))
        };

        ReceivableAccount {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            origin,
            amount,
            open_amount,
            status,
            due_date: days_after(now, method.settlement_delay_days),
            settled_at,
            payment_id: Some(payment_id.to_string()),
            order_id: Some(order_id.to_string()),
            idempotency_key: Self::payment_key(payment_id, origin),
            reversal_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending receivable for a balance the customer left as debt.
    pub fn for_debt(
        tenant_id: &str,
        order_id: &str,
        origin: ReceivableOrigin,
        amount: Money,
        due_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        ReceivableAccount {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            origin,
            amount,
            open_amount: amount,
            status: ReceivableStatus::Pending,
            due_date: days_after(now, due_days),
            settled_at: None,
            payment_id: None,
            order_id: Some(order_id.to_string()),
            idempotency_key: Self::debt_key(order_id),
            reversal_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Compensation Forecast
// =============================================================================

/// When, and net of which fees, a delayed receivable is expected to land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompensationForecast {
    pub id: String,
    pub tenant_id: String,
    pub receivable_id: String,
    pub expected_date: NaiveDate,
    pub gross_amount: Money,
    pub fee_percentage: Percentage,
    /// `gross_amount × fee_percentage`.
    pub percentage_fee: Money,
    /// This share's part of the method fixed fee. The shares of one payment
    /// add up to the whole fee.
    pub fixed_fee: Money,
    pub net_amount: Money,
    pub status: ForecastStatus,
    pub created_at: DateTime<Utc>,
}

impl CompensationForecast {
    /// Forecast for `receivable`, one share of a payment.
    ///
    /// `fixed_fee` is the share's part of the method fixed fee, as given by
    /// [`PaymentMethodConfig::fixed_fee_split`].
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use tabline_core::money::{Money, Percentage};
    /// use tabline_core::receivable::{CompensationForecast, ReceivableAccount, ReceivableOrigin};
    /// use tabline_core::types::PaymentMethodConfig;
    ///
    /// let card = PaymentMethodConfig {
    ///     settlement_delay_days: 2,
    ///     fee_percentage: Percentage::from_bps(300),
    ///     fixed_fee: Money::from_cents(50),
    ///     ..PaymentMethodConfig::generic("t", "card")
    /// };
    /// let now = Utc::now();
    /// let share = ReceivableAccount::for_payment(
    ///     "t", "order", "pay", ReceivableOrigin::Product, Money::from_cents(800), &card, now,
    /// );
    /// let (_, product_fee) = card.fixed_fee_split(Money::from_cents(3200), Money::from_cents(800));
    /// let forecast = CompensationForecast::for_receivable(&share, &card, product_fee, now);
    /// assert_eq!(forecast.fixed_fee.cents(), 10);
    /// assert_eq!(forecast.percentage_fee.cents(), 24);
    /// assert_eq!(forecast.net_amount.cents(), 766);
    /// ```
    pub fn for_receivable(
        receivable: &ReceivableAccount,
        method: &PaymentMethodConfig,
        fixed_fee: Money,
        now: DateTime<Utc>,
    ) -> Self {
        let gross_amount = receivable.amount;
        let percentage_fee = gross_amount.apply_percentage(method.fee_percentage);

        CompensationForecast {
            id: new_id(),
            tenant_id: receivable.tenant_id.clone(),
            receivable_id: receivable.id.clone(),
            expected_date: days_after(now, method.settlement_delay_days),
            gross_amount,
            fee_percentage: method.fee_percentage,
            percentage_fee,
            fixed_fee,
            net_amount: gross_amount - percentage_fee - fixed_fee,
            status: ForecastStatus::Forecast,
            created_at: now,
        }
    }
}

fn days_after(now: DateTime<Utc>, days: i64) -> NaiveDate {
    (now + Duration::days(days.max(0))).date_naive()
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

    fn card() -> PaymentMethodConfig {
        PaymentMethodConfig {
            settlement_delay_days: 2,
            fee_percentage: Percentage::from_bps(300),
            fixed_fee: cents(50),
            ..PaymentMethodConfig::generic("tenant", "card")
        }
    }

    #[test]
    fn test_split_worked_example() {
        let split = RevenueSplit::new(cents(8000), cents(2000));
        assert_eq!(split.split(cents(6000)), (cents(4800), cents(1200)));
        assert_eq!(split.split(cents(4000)), (cents(3200), cents(800)));
    }

    #[test]
    fn test_split_degenerate_ratios() {
        assert_eq!(RevenueSplit::new(cents(5000), Money::zero()).split(cents(5000)), (cents(5000), Money::zero()));
        assert_eq!(RevenueSplit::new(Money::zero(), cents(5000)).split(cents(5000)), (Money::zero(), cents(5000)));
        assert_eq!(RevenueSplit::new(Money::zero(), Money::zero()).split(cents(300)), (cents(300), Money::zero()));
    }

    #[test]
    fn test_split_shares_always_add_up() {
        let split = RevenueSplit::new(cents(3333), cents(6667));
        for amount in [1, 7, 99, 1001, 123_457] {
            let (s, p) = split.split(cents(amount));
            assert_eq!(s + p, cents(amount));
        }
    }

    #[test]
    fn test_zero_delay_receivable_is_settled() {
        let cash = PaymentMethodConfig::generic("tenant", "cash");
        let now = Utc::now();
        let r = ReceivableAccount::for_payment("tenant", "order", "pay-1", ReceivableOrigin::Service, cents(4800), &cash, now);
        assert_eq!(r.status, ReceivableStatus::Settled);
        assert_eq!(r.settled_at, Some(now));
        assert_eq!(r.open_amount, Money::zero());
        assert_eq!(r.due_date, now.date_naive());
        assert_eq!(r.idempotency_key, "pay-1:service");
    }

    #[test]
    fn test_delayed_receivable_is_confirmed() {
        let now = Utc::now();
        let r = ReceivableAccount::for_payment("tenant", "order", "pay-2", ReceivableOrigin::Product, cents(800), &card(), now);
        assert_eq!(r.status, ReceivableStatus::Confirmed);
        assert_eq!(r.open_amount, cents(800));
        assert_eq!(r.due_date, (now + Duration::days(2)).date_naive());
        assert!(r.settled_at.is_none());
    }

    #[test]
    fn test_forecast_carries_its_fixed_fee_share() {
        let now = Utc::now();
        let method = card();
        let service = ReceivableAccount::for_payment("tenant", "o", "p", ReceivableOrigin::Service, cents(3200), &method, now);
        let (service_fee, _) = method.fixed_fee_split(cents(3200), cents(800));
        let forecast = CompensationForecast::for_receivable(&service, &method, service_fee, now);
        assert_eq!(forecast.fixed_fee, cents(40));
        assert_eq!(forecast.percentage_fee, cents(96));
        assert_eq!(forecast.net_amount, cents(3064));
        assert_eq!(forecast.receivable_id, service.id);
        assert_eq!(forecast.status, ForecastStatus::Forecast);
    }

    #[test]
    fn test_debt_receivable() {
        let now = Utc::now();
        let r = ReceivableAccount::for_debt("tenant", "ord-9", ReceivableOrigin::Service, cents(1000), 30, now);
        assert_eq!(r.status, ReceivableStatus::Pending);
        assert_eq!(r.open_amount, cents(1000));
        assert_eq!(r.idempotency_key, "order:ord-9:balance");
        assert!(r.payment_id.is_none());
    }

    #[test]
    fn test_dominant_origin() {
        assert_eq!(RevenueSplit::new(cents(10), cents(10)).dominant_origin(), ReceivableOrigin::Service);
        assert_eq!(RevenueSplit::new(cents(10), cents(11)).dominant_origin(), ReceivableOrigin::Product);
    }
}
