//! # Stock Repository
//!
//! The stock ledger: movements plus the product's on-hand counter.
//!
//! A movement and its on-hand change are written in one transaction, and
//! the counter is changed in place (`on_hand = on_hand + delta`), so
//! concurrent sales of the same product never overwrite each other.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tabline_core::StockMovement;

/// Repository for stock movements and on-hand quantities.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Records a movement and applies it to the product's on-hand quantity.
    ///
    /// ## Returns
    /// - `Some(on_hand)`: the quantity after the movement. It may be
    ///   negative; whether that is acceptable is the caller's policy.
    /// - `None`: the line already has a movement of this kind, and nothing
    ///   was changed.
    pub async fn apply_movement(&self, movement: &StockMovement) -> DbResult<Option<i64>> {
        let delta = movement.kind.delta(movement.quantity);
        debug!(
            product_id = %movement.product_id,
            order_id = ?movement.order_id,
            order_item_id = ?movement.order_item_id,
            delta,
            "Applying stock movement"
        );

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, tenant_id, product_id, order_id, order_item_id, kind, quantity, unit_value, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(&movement.product_id)
        .bind(&movement.order_id)
        .bind(&movement.order_item_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.unit_value)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            debug!(order_item_id = ?movement.order_item_id, kind = ?movement.kind, "Movement already recorded");
            return Ok(None);
        }

        let on_hand: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE catalog_items
            SET on_hand = on_hand + ?3,
                updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND kind = 'product'
            RETURNING on_hand
            "#,
        )
        .bind(&movement.product_id)
        .bind(&movement.tenant_id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction discards the movement row
        let Some(on_hand) = on_hand else {
            return Err(DbError::not_found("Product", &movement.product_id));
        };

        tx.commit().await?;
        Ok(Some(on_hand))
    }

    /// Sets the on-hand quantity outright (stock counts, seeding).
    pub async fn set_quantity(&self, tenant_id: &str, product_id: &str, quantity: i64) -> DbResult<()> {
        debug!(product_id = %product_id, quantity, "Setting on-hand quantity");

        let result = sqlx::query(
            r#"
            UPDATE catalog_items
            SET on_hand = ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND kind = 'product'
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }
        Ok(())
    }

    pub async fn on_hand(&self, tenant_id: &str, product_id: &str) -> DbResult<Option<i64>> {
        let on_hand = sqlx::query_scalar("SELECT on_hand FROM catalog_items WHERE id = ?1 AND tenant_id = ?2")
            .bind(product_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(on_hand)
    }

    /// Movements recorded for an order, oldest first.
    pub async fn movements_for_order(&self, order_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as(
            r#"
            SELECT id, tenant_id, product_id, order_id, order_item_id, kind, quantity, unit_value, created_at
            FROM stock_movements
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tabline_core::{CatalogItem, ItemKind, Money, StockMovementKind};

    async fn setup_with_product(on_hand: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .upsert(&CatalogItem {
                id: "pomade".to_string(),
                tenant_id: "tenant".to_string(),
                kind: ItemKind::Product,
                name: "Pomade".to_string(),
                is_active: true,
                on_hand,
                unit_cost: Money::from_cents(700),
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_out_and_return_are_symmetric() {
        let db = setup_with_product(5).await;

        let out = StockMovement::new("tenant", "pomade", Some("o1"), StockMovementKind::Out, 3, Money::from_cents(700));
        assert_eq!(db.stock().apply_movement(&out).await.unwrap(), Some(2));

        let back = StockMovement::new("tenant", "pomade", Some("o1"), StockMovementKind::Return, 3, Money::from_cents(700));
        assert_eq!(db.stock().apply_movement(&back).await.unwrap(), Some(5));

        assert_eq!(db.stock().movements_for_order("o1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stock_may_go_negative() {
        let db = setup_with_product(1).await;
        let out = StockMovement::new("tenant", "pomade", None, StockMovementKind::Out, 4, Money::zero());
        assert_eq!(db.stock().apply_movement(&out).await.unwrap(), Some(-3));
    }

    #[tokio::test]
    async fn test_unknown_product_records_nothing() {
        let db = setup_with_product(1).await;
        let out = StockMovement::new("tenant", "ghost", Some("o1"), StockMovementKind::Out, 1, Money::zero());
        assert!(matches!(db.stock().apply_movement(&out).await, Err(DbError::NotFound { .. })));
        assert!(db.stock().movements_for_order("o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_movement_per_line_and_kind() {
        let db = setup_with_product(5).await;
        let sale = |kind| {
            StockMovement::new("tenant", "pomade", Some("o1"), kind, 2, Money::from_cents(700)).with_order_item("line-1")
        };

        assert_eq!(db.stock().apply_movement(&sale(StockMovementKind::Out)).await.unwrap(), Some(3));
        // A retried close builds a fresh movement for the same line
        assert_eq!(db.stock().apply_movement(&sale(StockMovementKind::Out)).await.unwrap(), None);
        assert_eq!(db.stock().on_hand("tenant", "pomade").await.unwrap(), Some(3));

        assert_eq!(db.stock().apply_movement(&sale(StockMovementKind::Return)).await.unwrap(), Some(5));
        assert_eq!(db.stock().apply_movement(&sale(StockMovementKind::Return)).await.unwrap(), None);
        assert_eq!(db.stock().movements_for_order("o1").await.unwrap().len(), 2);

        // Movements without a line are never deduplicated
        let count = StockMovement::new("tenant", "pomade", None, StockMovementKind::Out, 1, Money::zero());
        let again = StockMovement::new("tenant", "pomade", None, StockMovementKind::Out, 1, Money::zero());
        assert_eq!(db.stock().apply_movement(&count).await.unwrap(), Some(4));
        assert_eq!(db.stock().apply_movement(&again).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_set_quantity() {
        let db = setup_with_product(1).await;
        db.stock().set_quantity("tenant", "pomade", 40).await.unwrap();
        assert_eq!(db.stock().on_hand("tenant", "pomade").await.unwrap(), Some(40));
        assert!(db.stock().set_quantity("tenant", "ghost", 1).await.is_err());
    }
}
