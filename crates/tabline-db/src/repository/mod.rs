//! # Repository Module
//!
//! One repository per table group. Each holds a clone of the pool.
//!
//! ## Ledgers and Their Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository              Concurrency / idempotency guard                │
//! │  ──────────              ───────────────────────────────                │
//! │  OrderRepository         UPDATE ... WHERE status = <expected>           │
//! │  CashRegisterRepository  partial UNIQUE index on open session,          │
//! │                          in-place total increments in the entry tx,     │
//! │                          version check on close                         │
//! │  StockRepository         on_hand = on_hand + delta in the movement tx   │
//! │  ReceivableRepository    INSERT ... ON CONFLICT(idempotency_key)        │
//! │  ForecastRepository      INSERT ... ON CONFLICT(receivable_id)          │
//! │  CommissionRepository    soft cancel (status), never DELETE             │
//! │                                                                         │
//! │  Read-side collaborators: CatalogRepository, PaymentMethodRepository,   │
//! │  AppointmentRepository                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod appointment;
pub mod cash_register;
pub mod catalog;
pub mod commission;
pub mod forecast;
pub mod order;
pub mod payment_method;
pub mod receivable;
pub mod stock;

pub use appointment::AppointmentRepository;
pub use cash_register::CashRegisterRepository;
pub use catalog::CatalogRepository;
pub use commission::CommissionRepository;
pub use forecast::ForecastRepository;
pub use order::OrderRepository;
pub use payment_method::PaymentMethodRepository;
pub use receivable::ReceivableRepository;
pub use stock::StockRepository;
