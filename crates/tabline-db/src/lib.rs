//! # tabline-db: Database Layer for Tabline
//!
//! SQLite storage for orders and the four ledgers settlement reconciles.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tabline Data Flow                                │
//! │                                                                         │
//! │  SettlementEngine::close_order                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tabline-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ OrderRepository    │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ CashRegisterRepo   │  │ 001_init   │  │   │
//! │  │   │ WAL, FKs on   │    │ StockRepository    │  │            │  │   │
//! │  │   │               │    │ CommissionRepo     │  │            │  │   │
//! │  │   │               │    │ ReceivableRepo ... │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table group
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tabline.db")).await?;
//! let session = db.cash_registers().find_open(tenant_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::appointment::{AppointmentRepository, AppointmentStatus};
pub use repository::cash_register::CashRegisterRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::commission::CommissionRepository;
pub use repository::forecast::ForecastRepository;
pub use repository::order::OrderRepository;
pub use repository::payment_method::PaymentMethodRepository;
pub use repository::receivable::ReceivableRepository;
pub use repository::stock::StockRepository;
