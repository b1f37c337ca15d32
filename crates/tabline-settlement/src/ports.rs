//! # Collaborator Ports
//!
//! The engine owns the order, cash, commission, receivable and forecast
//! ledgers. Everything else it touches belongs to another part of the
//! platform and is reached through these traits.
//!
//! ```text
//! ┌──────────────────────┐        ┌─────────────────────────────────────┐
//! │   SettlementEngine   │ ─────► │ CatalogReader        item metadata  │
//! │                      │ ─────► │ StockLedger          movements      │
//! │                      │ ─────► │ PaymentMethodReader  delay and fees │
//! │                      │ ─────► │ AppointmentUpdater   mark done      │
//! └──────────────────────┘        └─────────────────────────────────────┘
//!                                   Database implements all four
//! ```
//!
//! A port failure during settlement is a step-level degradation: it is
//! logged and reported, never propagated.

use async_trait::async_trait;
use thiserror::Error;

use tabline_core::{CatalogItem, PaymentMethodConfig, StockMovement};
use tabline_db::{Database, DbError};

pub type PortResult<T> = Result<T, PortError>;

#[derive(Debug, Error)]
pub enum PortError {
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The collaborator could not be reached or refused the call.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Reads service and product metadata.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn item(&self, tenant_id: &str, item_id: &str) -> PortResult<Option<CatalogItem>>;
}

/// Physical inventory.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Records a movement and returns the product's on-hand quantity after it.
    ///
    /// Returns `None` when the movement's order line already has a movement
    /// of the same kind, leaving inventory untouched.
    async fn record_movement(&self, movement: &StockMovement) -> PortResult<Option<i64>>;

    /// Sets the on-hand quantity after a physical count.
    async fn adjust_quantity(&self, tenant_id: &str, product_id: &str, quantity: i64) -> PortResult<()>;
}

#[async_trait]
pub trait PaymentMethodReader: Send + Sync {
    async fn method(&self, tenant_id: &str, method_id: &str) -> PortResult<Option<PaymentMethodConfig>>;
}

#[async_trait]
pub trait AppointmentUpdater: Send + Sync {
    async fn mark_done(&self, tenant_id: &str, appointment_id: &str) -> PortResult<()>;
}

// =============================================================================
// Database-backed implementations
// =============================================================================

#[async_trait]
impl CatalogReader for Database {
    async fn item(&self, tenant_id: &str, item_id: &str) -> PortResult<Option<CatalogItem>> {
        Ok(self.catalog().get(tenant_id, item_id).await?)
    }
}

#[async_trait]
impl StockLedger for Database {
    async fn record_movement(&self, movement: &StockMovement) -> PortResult<Option<i64>> {
        Ok(self.stock().apply_movement(movement).await?)
    }

    async fn adjust_quantity(&self, tenant_id: &str, product_id: &str, quantity: i64) -> PortResult<()> {
        Ok(self.stock().set_quantity(tenant_id, product_id, quantity).await?)
    }
}

#[async_trait]
impl PaymentMethodReader for Database {
    async fn method(&self, tenant_id: &str, method_id: &str) -> PortResult<Option<PaymentMethodConfig>> {
        Ok(self.payment_methods().get(tenant_id, method_id).await?)
    }
}

#[async_trait]
impl AppointmentUpdater for Database {
    async fn mark_done(&self, tenant_id: &str, appointment_id: &str) -> PortResult<()> {
        Ok(self.appointments().mark_done(tenant_id, appointment_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabline_core::{ItemKind, Money, StockMovementKind};
    use tabline_db::DbConfig;

    #[tokio::test]
    async fn test_database_ports() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .upsert(&CatalogItem {
                id: "prd-wax".to_string(),
                tenant_id: "tenant".to_string(),
                kind: ItemKind::Product,
                name: "Wax".to_string(),
                is_active: true,
                on_hand: 0,
                unit_cost: Money::from_cents(700),
            })
            .await
            .unwrap();

        let catalog: &dyn CatalogReader = &db;
        assert!(catalog.item("tenant", "prd-wax").await.unwrap().is_some());
        assert!(catalog.item("other-tenant", "prd-wax").await.unwrap().is_none());

        let stock: &dyn StockLedger = &db;
        stock.adjust_quantity("tenant", "prd-wax", 5).await.unwrap();
        let sale = StockMovement::new("tenant", "prd-wax", None, StockMovementKind::Out, 2, Money::from_cents(700));
        assert_eq!(stock.record_movement(&sale).await.unwrap(), Some(3));

        let missing = StockMovement::new("tenant", "prd-gone", None, StockMovementKind::Out, 1, Money::zero());
        assert!(matches!(
            stock.record_movement(&missing).await,
            Err(PortError::Storage(DbError::NotFound { .. }))
        ));

        let methods: &dyn PaymentMethodReader = &db;
        assert!(methods.method("tenant", "pm-nope").await.unwrap().is_none());

        let appointments: &dyn AppointmentUpdater = &db;
        assert!(appointments.mark_done("tenant", "appt-nope").await.is_err());
    }
}
