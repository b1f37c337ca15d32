//! # Settlement Reports
//!
//! What a close or cancel did, step by step.
//!
//! Step-level problems do not fail the operation. Each item and payment
//! produces a [`StepRecord`], and back-office reconciliation reads the
//! records whose outcome is not `Applied`.
//!
//! ```text
//! close(order)
//!   ├─ Stock       prd-pomade   Applied  { id: mov-1 }
//!   ├─ Commission  line-1       Applied  { id: com-1 }
//!   ├─ Commission  line-2       Skipped  { reason: "no matching rule" }
//!   ├─ Payment     pay-1        Applied  { id: entry-1 }
//!   ├─ Receivable  pay-1        Applied  { id: rcv-1 }
//!   └─ Appointment appt-9       Failed   { reason: "Appointment not found" }
//! ```

use serde::Serialize;

use tabline_core::{Money, OrderStatus};

/// The settlement step a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Stock,
    Commission,
    PaymentMethod,
    CashEntry,
    Receivable,
    Forecast,
    Appointment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step wrote the record with this id.
    Applied { id: String },
    /// Nothing to do (no rule, already booked, no professional).
    Skipped { reason: String },
    /// The step failed and was left behind; settlement went on.
    Failed { reason: String },
}

/// One step outcome, keyed by the item, payment or appointment it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub subject_id: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Collects step records; shared by both reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn applied(&mut self, step: Step, subject_id: &str, id: &str) {
        self.push(step, subject_id, StepOutcome::Applied { id: id.to_string() });
    }

    pub fn skipped(&mut self, step: Step, subject_id: &str, reason: impl Into<String>) {
        self.push(step, subject_id, StepOutcome::Skipped { reason: reason.into() });
    }

    pub fn failed(&mut self, step: Step, subject_id: &str, reason: impl Into<String>) {
        self.push(step, subject_id, StepOutcome::Failed { reason: reason.into() });
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Records of failed steps.
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }

    pub fn of(&self, step: Step) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(move |r| r.step == step)
    }

    fn push(&mut self, step: Step, subject_id: &str, outcome: StepOutcome) {
        self.records.push(StepRecord {
            step,
            subject_id: subject_id.to_string(),
            outcome,
        });
    }
}

// =============================================================================
// Close
// =============================================================================

/// Result of closing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub order_id: String,
    pub stock_movement_ids: Vec<String>,
    pub commission_item_ids: Vec<String>,
    pub cash_entry_ids: Vec<String>,
    /// Receivables created by this run. Keys booked by an earlier run are
    /// not repeated here.
    pub receivable_ids: Vec<String>,
    pub forecast_ids: Vec<String>,
    /// Sum of Sale entries booked (the full amount of every payment).
    pub cash_booked: Money,
    /// Sum of receivables created by this run, debt included.
    pub receivables_booked: Money,
    pub commissions_booked: Money,
    /// Overpayment kept as a tip.
    pub tip_amount: Money,
    /// Underpayment left as a receivable.
    pub debt_amount: Money,
    pub debt_receivable_id: Option<String>,
    pub steps: StepLog,
}

impl SettlementReport {
    pub fn new(order_id: &str) -> Self {
        SettlementReport {
            order_id: order_id.to_string(),
            stock_movement_ids: Vec::new(),
            commission_item_ids: Vec::new(),
            cash_entry_ids: Vec::new(),
            receivable_ids: Vec::new(),
            forecast_ids: Vec::new(),
            cash_booked: Money::zero(),
            receivables_booked: Money::zero(),
            commissions_booked: Money::zero(),
            tip_amount: Money::zero(),
            debt_amount: Money::zero(),
            debt_receivable_id: None,
            steps: StepLog::default(),
        }
    }

    /// Returns true if any step was left behind and needs reconciliation.
    pub fn has_gaps(&self) -> bool {
        self.steps.failures().next().is_some()
    }
}

// =============================================================================
// Cancel
// =============================================================================

/// Result of canceling an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationResult {
    pub order_id: String,
    /// Open means nothing had been settled and nothing was reversed.
    pub previous_status: OrderStatus,
    pub stock_movement_ids: Vec<String>,
    pub commissions_canceled: u64,
    pub reversed_receivable_ids: Vec<String>,
    pub forecasts_canceled: u64,
    pub cash_entry_ids: Vec<String>,
    /// Sum of Withdrawal entries booked.
    pub cash_withdrawn: Money,
    pub steps: StepLog,
}

impl CancellationResult {
    pub fn new(order_id: &str, previous_status: OrderStatus) -> Self {
        CancellationResult {
            order_id: order_id.to_string(),
            previous_status,
            stock_movement_ids: Vec::new(),
            commissions_canceled: 0,
            reversed_receivable_ids: Vec::new(),
            forecasts_canceled: 0,
            cash_entry_ids: Vec::new(),
            cash_withdrawn: Money::zero(),
            steps: StepLog::default(),
        }
    }

    /// Returns true if settlement side effects were undone.
    pub fn reversed_settlement(&self) -> bool {
        self.previous_status == OrderStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_log_failures() {
        let mut report = SettlementReport::new("o1");
        report.steps.applied(Step::Stock, "prd-1", "mov-1");
        report.steps.skipped(Step::Commission, "line-2", "no matching rule");
        assert!(!report.has_gaps());

        report.steps.failed(Step::Appointment, "appt-9", "not found");
        assert!(report.has_gaps());
        assert_eq!(report.steps.failures().count(), 1);
        assert_eq!(report.steps.of(Step::Commission).count(), 1);
    }

    #[test]
    fn test_report_serializes_flat_outcomes() {
        let mut report = SettlementReport::new("o1");
        report.steps.skipped(Step::Receivable, "pay-1", "already booked");

        let json = serde_json::to_value(&report).unwrap();
        let record = &json["steps"]["records"][0];
        assert_eq!(record["step"], "receivable");
        assert_eq!(record["outcome"], "skipped");
        assert_eq!(record["reason"], "already booked");
    }
}
