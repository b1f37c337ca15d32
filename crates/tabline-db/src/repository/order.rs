//! # Order Repository
//!
//! Persistence for the Order aggregate (order row + items + payments).
//!
//! ## Status Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert()          ──► orders + order_items + order_payments (one tx)   │
//! │  save_open()       ──► rewrite lines   WHERE status = 'open'            │
//! │  mark_closed()     ──► status=closed   WHERE status = 'open'            │
//! │  mark_canceled()   ──► status=canceled WHERE status = <previous>        │
//! │                                                                         │
//! │  A conditional update that matches no row means another request got    │
//! │  there first: DbError::Conflict.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tabline_core::{Order, OrderItem, OrderPayment, OrderStatus};

/// Scalar columns of `orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    tenant_id: String,
    customer_id: String,
    unit_id: Option<String>,
    appointment_id: Option<String>,
    status: OrderStatus,
    allow_tip_as_change: bool,
    allow_balance_as_debt: bool,
    notes: Option<String>,
    debt_receivable_id: Option<String>,
    business_date: NaiveDate,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_by: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    canceled_by: Option<String>,
    canceled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, payments: Vec<OrderPayment>) -> Order {
        Order {
            id: self.id,
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            unit_id: self.unit_id,
            appointment_id: self.appointment_id,
            status: self.status,
            items,
            payments,
            allow_tip_as_change: self.allow_tip_as_change,
            allow_balance_as_debt: self.allow_balance_as_debt,
            notes: self.notes,
            debt_receivable_id: self.debt_receivable_id,
            business_date: self.business_date,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_by: self.closed_by,
            closed_at: self.closed_at,
            canceled_by: self.canceled_by,
            canceled_at: self.canceled_at,
            cancel_reason: self.cancel_reason,
        }
    }
}

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Loads an order with its items and payments.
    ///
    /// Scoped by tenant: an order of another tenant is reported as missing.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, customer_id, unit_id, appointment_id, status,
                   allow_tip_as_change, allow_balance_as_debt, notes, debt_receivable_id,
                   business_date, created_by, created_at, updated_at,
                   closed_by, closed_at, canceled_by, canceled_at, cancel_reason
            FROM orders
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItem> = sqlx::query_as(
            r#"
            SELECT id, order_id, kind, catalog_item_id, professional_id,
                   quantity, unit_price, final_price, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments: Vec<OrderPayment> = sqlx::query_as(
            r#"
            SELECT id, order_id, payment_method_id, amount, created_at
            FROM order_payments
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_order(items, payments)))
    }

    /// Inserts a new order and its lines in one transaction.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, tenant_id = %order.tenant_id, "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tenant_id, customer_id, unit_id, appointment_id, status,
                allow_tip_as_change, allow_balance_as_debt, notes, debt_receivable_id,
                business_date, created_by, created_at, updated_at,
                closed_by, closed_at, canceled_by, canceled_at, cancel_reason
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.customer_id)
        .bind(&order.unit_id)
        .bind(&order.appointment_id)
        .bind(order.status)
        .bind(order.allow_tip_as_change)
        .bind(order.allow_balance_as_debt)
        .bind(&order.notes)
        .bind(&order.debt_receivable_id)
        .bind(order.business_date)
        .bind(&order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.closed_by)
        .bind(order.closed_at)
        .bind(&order.canceled_by)
        .bind(order.canceled_at)
        .bind(&order.cancel_reason)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, order).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Persists edits made to an open order (lines, notes, flags).
    ///
    /// Lines are rewritten wholesale. Fails with `Conflict` if the order is
    /// no longer open in storage.
    pub async fn save_open(&self, order: &Order) -> DbResult<()> {
        debug!(
            order_id = %order.id,
            items = order.items.len(),
            payments = order.payments.len(),
            "Saving open order"
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                notes = ?2,
                allow_tip_as_change = ?3,
                allow_balance_as_debt = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&order.id)
        .bind(&order.notes)
        .bind(order.allow_tip_as_change)
        .bind(order.allow_balance_as_debt)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Order", &order.id));
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM order_payments WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;

        insert_lines(&mut tx, order).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Transitions Open → Closed in storage, with the flags the close used.
    ///
    /// The `WHERE status = 'open'` guard makes this the single point where
    /// two racing closes are told apart: the loser gets `Conflict`.
    pub async fn mark_closed(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, "Marking order closed");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'closed',
                closed_by = ?2,
                closed_at = ?3,
                debt_receivable_id = ?4,
                allow_tip_as_change = ?5,
                allow_balance_as_debt = ?6,
                updated_at = ?7
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&order.id)
        .bind(&order.closed_by)
        .bind(order.closed_at)
        .bind(&order.debt_receivable_id)
        .bind(order.allow_tip_as_change)
        .bind(order.allow_balance_as_debt)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Order", &order.id));
        }
        Ok(())
    }

    /// Transitions `previous` → Canceled in storage.
    pub async fn mark_canceled(&self, order: &Order, previous: OrderStatus) -> DbResult<()> {
        debug!(order_id = %order.id, previous = %previous, "Marking order canceled");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'canceled',
                canceled_by = ?2,
                canceled_at = ?3,
                cancel_reason = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = ?6
            "#,
        )
        .bind(&order.id)
        .bind(&order.canceled_by)
        .bind(order.canceled_at)
        .bind(&order.cancel_reason)
        .bind(order.updated_at)
        .bind(previous)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Order", &order.id));
        }
        Ok(())
    }

    /// Counts orders of a tenant in a given status.
    pub async fn count_by_status(&self, tenant_id: &str, status: OrderStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tenant_id = ?1 AND status = ?2")
            .bind(tenant_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_lines(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, kind, catalog_item_id, professional_id,
                quantity, unit_price, final_price, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(item.kind)
        .bind(&item.catalog_item_id)
        .bind(&item.professional_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.final_price)
        .bind(item.created_at)
        .execute(&mut **tx)
        .await?;
    }

    for payment in &order.payments {
        sqlx::query(
            r#"
            INSERT INTO order_payments (id, order_id, payment_method_id, amount, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.payment_method_id)
        .bind(payment.amount)
        .bind(payment.created_at)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tabline_core::{ItemKind, Money};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_order() -> Order {
        let mut order = Order::new("tenant", "customer", "cashier", NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
            .with_unit("unit-1");
        order
            .add_item(ItemKind::Service, "haircut", Some("ana"), 1, Money::from_cents(8000), Money::zero())
            .unwrap();
        order
            .add_item(ItemKind::Product, "pomade", Some("ana"), 2, Money::from_cents(1000), Money::zero())
            .unwrap();
        order.add_payment("cash", Money::from_cents(10000)).unwrap();
        order
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = setup().await;
        let order = sample_order();
        db.orders().insert(&order).await.unwrap();

        let loaded = db.orders().get("tenant", &order.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.payments.len(), 1);
        assert_eq!(loaded.items_total(), Money::from_cents(10000));
        assert_eq!(loaded.unit_id.as_deref(), Some("unit-1"));
        assert_eq!(loaded.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_get_is_tenant_scoped() {
        let db = setup().await;
        let order = sample_order();
        db.orders().insert(&order).await.unwrap();

        assert!(db.orders().get("other-tenant", &order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_open_rewrites_lines() {
        let db = setup().await;
        let mut order = sample_order();
        db.orders().insert(&order).await.unwrap();

        let product_line = order.items[1].id.clone();
        order.remove_item(&product_line).unwrap();
        order.set_notes(Some("walk-in")).unwrap();
        db.orders().save_open(&order).await.unwrap();

        let loaded = db.orders().get("tenant", &order.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.notes.as_deref(), Some("walk-in"));
    }

    #[tokio::test]
    async fn test_second_close_conflicts() {
        let db = setup().await;
        let mut order = sample_order();
        db.orders().insert(&order).await.unwrap();

        order.close("cashier").unwrap();
        db.orders().mark_closed(&order).await.unwrap();
        let err = db.orders().mark_closed(&order).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        // Editing a closed order in storage is refused as well
        assert!(db.orders().save_open(&order).await.is_err());
        assert_eq!(db.orders().count_by_status("tenant", OrderStatus::Closed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_closed_order() {
        let db = setup().await;
        let mut order = sample_order();
        db.orders().insert(&order).await.unwrap();
        order.close("cashier").unwrap();
        db.orders().mark_closed(&order).await.unwrap();

        let previous = order.cancel("manager", "customer complaint").unwrap();
        db.orders().mark_canceled(&order, previous).await.unwrap();

        let loaded = db.orders().get("tenant", &order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Canceled);
        assert_eq!(loaded.cancel_reason.as_deref(), Some("customer complaint"));
    }
}
