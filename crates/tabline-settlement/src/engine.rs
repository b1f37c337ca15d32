//! # Settlement Engine
//!
//! Closes and cancels orders, reconciling stock, commissions, the cash
//! register and receivables.
//!
//! ## Close Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          close_order                                    │
//! │                                                                         │
//! │  PRECONDITIONS (structural, nothing written on failure)                │
//! │  order exists · not closed · register open · can_close(tolerance)      │
//! │  [reject policy] every product has enough stock                        │
//! │                                                                         │
//! │  1. Stock        product lines → Out movement        (degrades)        │
//! │  2. Commissions  every line → resolve rule → item    (degrades)        │
//! │  3. Split        services / products ratio                             │
//! │  4. Payments     method (or generic fallback)                          │
//! │                  → Sale entry for the full amount                      │
//! │                  → receivable per non-zero origin   (idempotent key)   │
//! │                  → forecast if delayed              (one per rcv)      │
//! │     Debt         balance left as debt → Pending receivable             │
//! │  5. Order        Open → Closed (conditional update)                    │
//! │  6. Appointment  mark Done                          (degrades)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel Path
//! ```text
//! Canceled  → AlreadyCanceled
//! Open      → status only, nothing to reverse
//! Closed    → Return movements · commissions canceled · receivables
//!             reversed · forecasts canceled · Withdrawal per payment
//!             → Canceled
//! ```
//!
//! ## Partial Failure
//! Nothing is rolled back. Progress made before an error stays, and a
//! retried close books only what is missing: stock movements and
//! commissions are keyed by order line, cash entries by payment, and
//! receivables and forecasts by their idempotency key. Records an earlier
//! run left behind are reported as skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tabline_core::{
    resolve_rule, CashEntryKind, CashRegisterSession, CommissionItem, CompensationForecast, EntryLink, Money,
    Order, OrderItem, OrderPayment, OrderStatus, PaymentMethodConfig, ReceivableAccount, ReceivableOrigin,
    ResolutionContext, RevenueSplit, StockMovement, StockMovementKind, MAX_TEXT_LENGTH,
};
use tabline_db::{Database, DbError};

use crate::config::{NegativeStockPolicy, SettlementConfig};
use crate::error::{SettlementError, SettlementResult, StepError};
use crate::ports::{AppointmentUpdater, CatalogReader, PaymentMethodReader, StockLedger};
use crate::report::{CancellationResult, SettlementReport, Step, StepLog};

/// Per-call overrides of the order's balance flags.
///
/// `None` keeps what is stored on the order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    pub allow_tip_as_change: Option<bool>,
    pub allow_balance_as_debt: Option<bool>,
}

impl CloseOptions {
    pub fn tip_as_change() -> Self {
        CloseOptions {
            allow_tip_as_change: Some(true),
            ..Default::default()
        }
    }

    pub fn balance_as_debt() -> Self {
        CloseOptions {
            allow_balance_as_debt: Some(true),
            ..Default::default()
        }
    }

    fn apply(&self, order: &mut Order) {
        if let Some(allow) = self.allow_tip_as_change {
            order.allow_tip_as_change = allow;
        }
        if let Some(allow) = self.allow_balance_as_debt {
            order.allow_balance_as_debt = allow;
        }
    }
}

/// The settlement engine.
///
/// Owns the order, cash, commission, receivable and forecast ledgers through
/// [`Database`]. Catalog, stock, payment methods and appointments go through
/// the collaborator traits and default to the same database.
#[derive(Clone)]
pub struct SettlementEngine {
    db: Database,
    config: SettlementConfig,
    catalog: Arc<dyn CatalogReader>,
    stock: Arc<dyn StockLedger>,
    payment_methods: Arc<dyn PaymentMethodReader>,
    appointments: Arc<dyn AppointmentUpdater>,
}

impl SettlementEngine {
    pub fn new(db: Database, config: SettlementConfig) -> Self {
        let shared = Arc::new(db.clone());
        SettlementEngine {
            db,
            config,
            catalog: shared.clone(),
            stock: shared.clone(),
            payment_methods: shared.clone(),
            appointments: shared,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogReader>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_stock(mut self, stock: Arc<dyn StockLedger>) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_payment_methods(mut self, payment_methods: Arc<dyn PaymentMethodReader>) -> Self {
        self.payment_methods = payment_methods;
        self
    }

    pub fn with_appointments(mut self, appointments: Arc<dyn AppointmentUpdater>) -> Self {
        self.appointments = appointments;
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Closes an order and books its side effects.
    ///
    /// ## Errors
    /// - `NotFound`: no such order for the tenant
    /// - `AlreadyClosed`: the order is closed (or another close won the race)
    /// - `CashRegisterNotOpen`: the tenant has no open session
    /// - `ValidationFailed`: the order fails `can_close` (empty, unpaid,
    ///   totals mismatch, canceled)
    /// - `InsufficientStock`: only under the `reject` policy
    pub async fn close_order(
        &self,
        order_id: &str,
        tenant_id: &str,
        user_id: &str,
        options: CloseOptions,
    ) -> SettlementResult<SettlementReport> {
        info!(order_id = %order_id, tenant_id = %tenant_id, user_id = %user_id, "Closing order");

        let mut order = self.load_order(tenant_id, order_id).await?;
        if order.status == OrderStatus::Closed {
            return Err(SettlementError::AlreadyClosed(order.id));
        }
        options.apply(&mut order);

        let mut session = self.open_session(tenant_id).await?;
        order.can_close(self.config.close_tolerance())?;
        if self.config.negative_stock_policy() == NegativeStockPolicy::Reject {
            self.ensure_stock(&order).await?;
        }

        let now = Utc::now();
        let mut report = SettlementReport::new(&order.id);
        let methods = self.resolve_methods(&order, &mut report.steps).await;

        self.book_stock(&order, &mut report).await;
        self.book_commissions(&order, &methods, &mut report).await;
        let split = RevenueSplit::new(order.services_total(), order.products_total());
        self.book_payments(&order, &methods, split, &mut session, user_id, now, &mut report)
            .await?;
        self.book_debt(&mut order, split, now, &mut report).await?;
        report.tip_amount = order.tip_amount();

        order.close(user_id)?;
        if let Err(err) = self.db.orders().mark_closed(&order).await {
            return Err(self.transition_error(err, tenant_id, order_id).await);
        }

        self.complete_appointment(&order, &mut report).await;

        info!(
            order_id = %order.id,
            cash = %report.cash_booked,
            receivables = %report.receivables_booked,
            commissions = %report.commissions_booked,
            gaps = report.steps.failures().count(),
            "Order closed"
        );
        Ok(report)
    }

    /// Refuses the close if any product would go below zero.
    ///
    /// Quantities of the same product on several lines are added up. A
    /// product the catalog cannot resolve is left to the stock step.
    async fn ensure_stock(&self, order: &Order) -> SettlementResult<()> {
        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for item in order.items.iter().filter(|i| i.is_product()) {
            *requested.entry(item.catalog_item_id.as_str()).or_default() += item.quantity;
        }

        for (product_id, quantity) in requested {
            match self.catalog.item(&order.tenant_id, product_id).await {
                Ok(Some(product)) if product.on_hand < quantity => {
                    return Err(SettlementError::InsufficientStock {
                        product_id: product_id.to_string(),
                        on_hand: product.on_hand,
                        requested: quantity,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(order_id = %order.id, product_id = %product_id, error = %e, "Stock pre-check skipped");
                }
            }
        }
        Ok(())
    }

    /// Resolves every payment's method, falling back to a generic zero-delay
    /// method. The result is parallel to `order.payments`.
    async fn resolve_methods(&self, order: &Order, steps: &mut StepLog) -> Vec<PaymentMethodConfig> {
        let mut methods = Vec::with_capacity(order.payments.len());

        for payment in &order.payments {
            let reason = match self
                .payment_methods
                .method(&order.tenant_id, &payment.payment_method_id)
                .await
            {
                Ok(Some(method)) => {
                    methods.push(method);
                    continue;
                }
                Ok(None) => format!("payment method {} not found", payment.payment_method_id),
                Err(e) => format!("payment method lookup failed: {}", e),
            };

            warn!(
                order_id = %order.id,
                payment_id = %payment.id,
                payment_method_id = %payment.payment_method_id,
                reason = %reason,
                "Using generic zero-delay payment method"
            );
            steps.failed(Step::PaymentMethod, &payment.id, reason);
            methods.push(PaymentMethodConfig::generic(&order.tenant_id, &payment.payment_method_id));
        }

        methods
    }

    /// Step 1: one Out movement per product line.
    async fn book_stock(&self, order: &Order, report: &mut SettlementReport) {
        for item in order.items.iter().filter(|i| i.is_product()) {
            match self.move_stock(order, item, StockMovementKind::Out).await {
                Ok((_, None)) => {
                    debug!(order_id = %order.id, item_id = %item.id, "Stock already moved for line");
                    report.steps.skipped(Step::Stock, &item.id, "stock already moved for line");
                }
                Ok((movement, Some(on_hand))) => {
                    if on_hand < 0 {
                        warn!(
                            order_id = %order.id,
                            product_id = %item.catalog_item_id,
                            on_hand,
                            "Stock went negative"
                        );
                    }
                    report.steps.applied(Step::Stock, &item.id, &movement.id);
                    report.stock_movement_ids.push(movement.id);
                }
                Err(e) => report.steps.failed(Step::Stock, &item.id, e.to_string()),
            }
        }
    }

    /// Records a movement for one line.
    ///
    /// The on-hand quantity is `None` when the line already had a movement
    /// of this kind. Errors are logged before they come back.
    async fn move_stock(
        &self,
        order: &Order,
        item: &OrderItem,
        kind: StockMovementKind,
    ) -> Result<(StockMovement, Option<i64>), StepError> {
        let product = match self.catalog.item(&order.tenant_id, &item.catalog_item_id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                let missing = StepError::Missing {
                    entity: "product",
                    id: item.catalog_item_id.clone(),
                };
                return Err(self.stock_degraded(order, item, missing));
            }
            Err(e) => return Err(self.stock_degraded(order, item, StepError::Catalog(e))),
        };

        if kind == StockMovementKind::Out && !product.is_active {
            warn!(
                order_id = %order.id,
                item_id = %item.id,
                product_id = %product.id,
                "Selling inactive product"
            );
        }

        let movement = StockMovement::new(
            &order.tenant_id,
            &item.catalog_item_id,
            Some(&order.id),
            kind,
            item.quantity,
            product.unit_cost,
        )
        .with_order_item(&item.id);

        match self.stock.record_movement(&movement).await {
            Ok(on_hand) => Ok((movement, on_hand)),
            Err(e) => Err(self.stock_degraded(order, item, StepError::Movement(e))),
        }
    }

    fn stock_degraded(&self, order: &Order, item: &OrderItem, err: StepError) -> StepError {
        warn!(
            order_id = %order.id,
            item_id = %item.id,
            product_id = %item.catalog_item_id,
            reason = %err,
            "Stock step skipped"
        );
        err
    }

    /// Step 2: resolve a rule per line and book the commission.
    ///
    /// Lines under a `net` rule are reduced by their share of the order's
    /// payment fees, pro-rated by final price.
    async fn book_commissions(&self, order: &Order, methods: &[PaymentMethodConfig], report: &mut SettlementReport) {
        let rules = match self.db.commissions().active_rules(&order.tenant_id).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Commission rules unavailable, no commissions booked");
                for item in &order.items {
                    report
                        .steps
                        .failed(Step::Commission, &item.id, format!("commission rules unavailable: {}", e));
                }
                return;
            }
        };

        let total_fees: Money = order
            .payments
            .iter()
            .zip(methods)
            .map(|(payment, method)| method.fees_for(payment.amount))
            .sum();
        let items_total = order.items_total();

        for item in &order.items {
            let Some(professional_id) = item.professional_id.as_deref() else {
                debug!(order_id = %order.id, item_id = %item.id, "Line has no professional, no commission");
                report.steps.skipped(Step::Commission, &item.id, "no professional on line");
                continue;
            };

            let ctx = ResolutionContext {
                tenant_id: &order.tenant_id,
                unit_id: order.unit_id.as_deref(),
                professional_id,
                catalog_item_id: &item.catalog_item_id,
                kind: item.kind,
                date: order.business_date,
            };
            let Some(resolved) = resolve_rule(&rules, &ctx) else {
                warn!(
                    order_id = %order.id,
                    item_id = %item.id,
                    professional_id = %professional_id,
                    kind = %item.kind,
                    "No commission rule matched"
                );
                report.steps.skipped(Step::Commission, &item.id, "no matching rule");
                continue;
            };

            let fee_share = total_fees.prorate(item.final_price, items_total);
            let commission = CommissionItem::generate(
                &order.tenant_id,
                professional_id,
                item,
                &resolved,
                fee_share,
                order.business_date,
            );

            match self.db.commissions().insert_item(&commission).await {
                Ok(false) => {
                    debug!(item_id = %item.id, "Line already commissioned, skipping");
                    report.steps.skipped(Step::Commission, &item.id, "line already commissioned");
                }
                Ok(true) => {
                    debug!(
                        item_id = %item.id,
                        source = %resolved.source,
                        value = %commission.commission_value,
                        "Commission booked"
                    );
                    report.commissions_booked += commission.commission_value;
                    report.steps.applied(Step::Commission, &item.id, &commission.id);
                    report.commission_item_ids.push(commission.id);
                }
                Err(e) => {
                    warn!(order_id = %order.id, item_id = %item.id, error = %e, "Commission not booked");
                    report
                        .steps
                        .failed(Step::Commission, &item.id, format!("commission insert failed: {}", e));
                }
            }
        }
    }

    /// Steps 3 and 4: cash entry for the full amount, then receivables.
    #[allow(clippy::too_many_arguments)]
    async fn book_payments(
        &self,
        order: &Order,
        methods: &[PaymentMethodConfig],
        split: RevenueSplit,
        session: &mut CashRegisterSession,
        user_id: &str,
        now: DateTime<Utc>,
        report: &mut SettlementReport,
    ) -> SettlementResult<()> {
        for (payment, method) in order.payments.iter().zip(methods) {
            let description = format!("Order {} ({})", order.id, method.name);
            let entry = session.record_entry(
                CashEntryKind::Sale,
                payment.amount,
                user_id,
                Some(&description),
                EntryLink::payment(&order.id, &payment.id),
            )?;
            match self.db.cash_registers().append_entry(&entry).await {
                Ok(true) => {
                    report.cash_booked += payment.amount;
                    report.steps.applied(Step::CashEntry, &payment.id, &entry.id);
                    report.cash_entry_ids.push(entry.id);
                }
                Ok(false) => {
                    debug!(payment_id = %payment.id, "Payment already in the register, skipping");
                    report
                        .steps
                        .skipped(Step::CashEntry, &payment.id, "payment already in the register");
                }
                Err(err) => return Err(register_error(err, &order.tenant_id)),
            }

            let (service_share, product_share) = split.split(payment.amount);
            let (service_fee, product_fee) = method.fixed_fee_split(service_share, product_share);
            for (origin, share, fixed_fee) in [
                (ReceivableOrigin::Service, service_share, service_fee),
                (ReceivableOrigin::Product, product_share, product_fee),
            ] {
                if share.is_positive() {
                    self.book_receivable(order, payment, method, origin, share, fixed_fee, now, report)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// One origin's share of a payment, plus its forecast when delayed.
    ///
    /// A key booked by an earlier run is skipped, but its forecast is still
    /// ensured so a run that died between the two writes is completed.
    #[allow(clippy::too_many_arguments)]
    async fn book_receivable(
        &self,
        order: &Order,
        payment: &OrderPayment,
        method: &PaymentMethodConfig,
        origin: ReceivableOrigin,
        share: Money,
        fixed_fee: Money,
        now: DateTime<Utc>,
        report: &mut SettlementReport,
    ) -> SettlementResult<()> {
        let candidate =
            ReceivableAccount::for_payment(&order.tenant_id, &order.id, &payment.id, origin, share, method, now);

        let receivable = if self.db.receivables().insert_if_absent(&candidate).await? {
            report.receivables_booked += share;
            report.steps.applied(Step::Receivable, &payment.id, &candidate.id);
            report.receivable_ids.push(candidate.id.clone());
            candidate
        } else {
            debug!(key = %candidate.idempotency_key, "Receivable already booked, skipping");
            report.steps.skipped(
                Step::Receivable,
                &payment.id,
                format!("{} already booked", candidate.idempotency_key),
            );
            match self.db.receivables().find_by_key(&candidate.idempotency_key).await? {
                Some(existing) => existing,
                None => return Ok(()),
            }
        };

        if !method.is_delayed() {
            return Ok(());
        }

        let forecast = CompensationForecast::for_receivable(&receivable, method, fixed_fee, now);
        if self.db.forecasts().insert_if_absent(&forecast).await? {
            report.steps.applied(Step::Forecast, &receivable.id, &forecast.id);
            report.forecast_ids.push(forecast.id);
        } else {
            report
                .steps
                .skipped(Step::Forecast, &receivable.id, "forecast already exists");
        }
        Ok(())
    }

    /// Books the unpaid balance as a Pending receivable and links it.
    async fn book_debt(
        &self,
        order: &mut Order,
        split: RevenueSplit,
        now: DateTime<Utc>,
        report: &mut SettlementReport,
    ) -> SettlementResult<()> {
        let debt = order.debt_amount();
        if !debt.is_positive() {
            return Ok(());
        }

        let candidate = ReceivableAccount::for_debt(
            &order.tenant_id,
            &order.id,
            split.dominant_origin(),
            debt,
            self.config.close.debt_due_days,
            now,
        );

        let receivable_id = if self.db.receivables().insert_if_absent(&candidate).await? {
            info!(order_id = %order.id, amount = %debt, due_date = %candidate.due_date, "Balance left as debt");
            report.receivables_booked += debt;
            report.steps.applied(Step::Receivable, &order.id, &candidate.id);
            report.receivable_ids.push(candidate.id.clone());
            Some(candidate.id)
        } else {
            report
                .steps
                .skipped(Step::Receivable, &order.id, "debt receivable already booked");
            self.db
                .receivables()
                .find_by_key(&candidate.idempotency_key)
                .await?
                .map(|r| r.id)
        };

        order.debt_receivable_id = receivable_id.clone();
        report.debt_amount = debt;
        report.debt_receivable_id = receivable_id;
        Ok(())
    }

    /// Step 6. Best effort.
    async fn complete_appointment(&self, order: &Order, report: &mut SettlementReport) {
        let Some(appointment_id) = order.appointment_id.as_deref() else {
            return;
        };

        match self.appointments.mark_done(&order.tenant_id, appointment_id).await {
            Ok(()) => {
                debug!(order_id = %order.id, appointment_id = %appointment_id, "Appointment done");
                report.steps.applied(Step::Appointment, appointment_id, appointment_id);
            }
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    appointment_id = %appointment_id,
                    error = %e,
                    "Appointment not marked done"
                );
                report
                    .steps
                    .failed(Step::Appointment, appointment_id, format!("mark done failed: {}", e));
            }
        }
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels an order, reversing its settlement if it was closed.
    ///
    /// ## Errors
    /// - `NotFound`: no such order for the tenant
    /// - `AlreadyCanceled`: the order is canceled (or another cancel won)
    /// - `ValidationFailed`: empty reason
    /// - `CashRegisterNotOpen`: a closed order needs an open session to
    ///   book its withdrawals
    pub async fn cancel_order(
        &self,
        order_id: &str,
        tenant_id: &str,
        user_id: &str,
        reason: &str,
    ) -> SettlementResult<CancellationResult> {
        info!(order_id = %order_id, tenant_id = %tenant_id, user_id = %user_id, reason = %reason, "Canceling order");

        let mut order = self.load_order(tenant_id, order_id).await?;
        if order.status == OrderStatus::Canceled {
            return Err(SettlementError::AlreadyCanceled(order.id));
        }

        let previous = order.cancel(user_id, reason)?;
        let mut result = CancellationResult::new(&order.id, previous);

        if previous == OrderStatus::Closed {
            let mut session = self.open_session(tenant_id).await?;
            self.reverse_settlement(&order, &mut session, user_id, &mut result)
                .await?;
        } else {
            debug!(order_id = %order.id, "Order was never settled, nothing to reverse");
        }

        if let Err(err) = self.db.orders().mark_canceled(&order, previous).await {
            return Err(self.transition_error(err, tenant_id, order_id).await);
        }

        info!(
            order_id = %order.id,
            previous = %previous,
            reversed_receivables = result.reversed_receivable_ids.len(),
            withdrawn = %result.cash_withdrawn,
            "Order canceled"
        );
        Ok(result)
    }

    /// Mirror of close steps 1-4.
    async fn reverse_settlement(
        &self,
        order: &Order,
        session: &mut CashRegisterSession,
        user_id: &str,
        result: &mut CancellationResult,
    ) -> SettlementResult<()> {
        let now = Utc::now();
        let reason = order.cancel_reason.as_deref().unwrap_or_default();

        for item in order.items.iter().filter(|i| i.is_product()) {
            match self.move_stock(order, item, StockMovementKind::Return).await {
                Ok((_, None)) => result.steps.skipped(Step::Stock, &item.id, "stock already returned for line"),
                Ok((movement, Some(_))) => {
                    result.steps.applied(Step::Stock, &item.id, &movement.id);
                    result.stock_movement_ids.push(movement.id);
                }
                Err(e) => result.steps.failed(Step::Stock, &item.id, e.to_string()),
            }
        }

        match self.db.commissions().cancel_for_order(&order.id, now).await {
            Ok(count) => result.commissions_canceled = count,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Commissions not canceled");
                result
                    .steps
                    .failed(Step::Commission, &order.id, format!("commission cancel failed: {}", e));
            }
        }

        result.reversed_receivable_ids = self.db.receivables().reverse_for_order(&order.id, reason, now).await?;
        result.forecasts_canceled = self.db.forecasts().cancel_for_order(&order.id).await?;

        let description: String = format!("Cancellation: {}", reason).chars().take(MAX_TEXT_LENGTH).collect();
        for payment in &order.payments {
            let entry = session.record_entry(
                CashEntryKind::Withdrawal,
                payment.amount,
                user_id,
                Some(&description),
                EntryLink::payment(&order.id, &payment.id),
            )?;
            match self.db.cash_registers().append_entry(&entry).await {
                Ok(true) => {
                    result.cash_withdrawn += payment.amount;
                    result.steps.applied(Step::CashEntry, &payment.id, &entry.id);
                    result.cash_entry_ids.push(entry.id);
                }
                Ok(false) => result
                    .steps
                    .skipped(Step::CashEntry, &payment.id, "payment already withdrawn"),
                Err(err) => return Err(register_error(err, &order.tenant_id)),
            }
        }

        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_order(&self, tenant_id: &str, order_id: &str) -> SettlementResult<Order> {
        self.db
            .orders()
            .get(tenant_id, order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_id))
    }

    async fn open_session(&self, tenant_id: &str) -> SettlementResult<CashRegisterSession> {
        self.db
            .cash_registers()
            .find_open(tenant_id)
            .await?
            .ok_or_else(|| SettlementError::CashRegisterNotOpen(tenant_id.to_string()))
    }

    /// Maps a lost status transition to the state the winner left behind.
    async fn transition_error(&self, err: DbError, tenant_id: &str, order_id: &str) -> SettlementError {
        if !matches!(err, DbError::Conflict { .. }) {
            return err.into();
        }

        match self.db.orders().get(tenant_id, order_id).await {
            Ok(Some(current)) if current.status == OrderStatus::Closed => {
                SettlementError::AlreadyClosed(order_id.to_string())
            }
            Ok(Some(current)) if current.status == OrderStatus::Canceled => {
                SettlementError::AlreadyCanceled(order_id.to_string())
            }
            Ok(_) => err.into(),
            Err(reload) => reload.into(),
        }
    }
}

/// A session closed between lookup and append is reported as not open.
fn register_error(err: DbError, tenant_id: &str) -> SettlementError {
    match err {
        DbError::Conflict { .. } => SettlementError::CashRegisterNotOpen(tenant_id.to_string()),
        other => other.into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
