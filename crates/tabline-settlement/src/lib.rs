//! # tabline-settlement: Order Settlement for Tabline
//!
//! Turns a finished tab into ledger records, and undoes them on cancellation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Settlement Flow                                 │
//! │                                                                         │
//! │  operator (settle CLI, front desk)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               tabline-settlement (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   SettlementEngine          CashRegisterDesk                    │   │
//! │  │   close_order               open / close                        │   │
//! │  │   cancel_order              withdraw / reinforce / expense      │   │
//! │  │        │                                                        │   │
//! │  │        ├── ports: catalog · stock · methods · appointments      │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   SettlementReport / CancellationResult (step outcomes)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tabline-db: orders · cash · commissions · receivables · forecasts     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Close and cancel orchestration
//! - [`register`] - Cash register session operations
//! - [`ports`] - Collaborator traits and their database implementations
//! - [`report`] - Step-by-step settlement outcomes
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Settlement error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabline_settlement::{CloseOptions, SettlementConfig, SettlementEngine};
//!
//! let config = SettlementConfig::load_or_default(None);
//! let db = Database::new(config.db_config()).await?;
//! let engine = SettlementEngine::new(db, config);
//!
//! let report = engine.close_order(order_id, tenant_id, user_id, CloseOptions::default()).await?;
//! if report.has_gaps() {
//!     // hand report.steps.failures() to back-office reconciliation
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod register;
pub mod report;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{NegativeStockPolicy, SettlementConfig};
pub use engine::{CloseOptions, SettlementEngine};
pub use error::{SettlementError, SettlementResult, StepError};
pub use ports::{AppointmentUpdater, CatalogReader, PaymentMethodReader, PortError, PortResult, StockLedger};
pub use register::{CashRegisterDesk, SessionSummary};
pub use report::{CancellationResult, SettlementReport, Step, StepLog, StepOutcome, StepRecord};
