//! # Payment Method Repository
//!
//! Tenant payment-method configuration (delay, fees, billing category).

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tabline_core::PaymentMethodConfig;

#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<PaymentMethodConfig>> {
        let method = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, settlement_delay_days, fee_percentage,
                   fixed_fee, billing_category, is_active
            FROM payment_methods
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(method)
    }

    pub async fn list_active(&self, tenant_id: &str) -> DbResult<Vec<PaymentMethodConfig>> {
        let methods = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, settlement_delay_days, fee_percentage,
                   fixed_fee, billing_category, is_active
            FROM payment_methods
            WHERE tenant_id = ?1 AND is_active = 1
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }

    pub async fn upsert(&self, method: &PaymentMethodConfig) -> DbResult<()> {
        debug!(id = %method.id, name = %method.name, "Upserting payment method");

        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                id, tenant_id, name, settlement_delay_days, fee_percentage,
                fixed_fee, billing_category, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                settlement_delay_days = excluded.settlement_delay_days,
                fee_percentage = excluded.fee_percentage,
                fixed_fee = excluded.fixed_fee,
                billing_category = excluded.billing_category,
                is_active = excluded.is_active
            "#,
        )
        .bind(&method.id)
        .bind(&method.tenant_id)
        .bind(&method.name)
        .bind(method.settlement_delay_days)
        .bind(method.fee_percentage)
        .bind(method.fixed_fee)
        .bind(method.billing_category)
        .bind(method.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tabline_core::{BillingCategory, Money, Percentage};

    #[tokio::test]
    async fn test_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let card = PaymentMethodConfig {
            name: "Credit card".to_string(),
            settlement_delay_days: 30,
            fee_percentage: Percentage::from_bps(349),
            fixed_fee: Money::from_cents(50),
            billing_category: BillingCategory::CreditCard,
            ..PaymentMethodConfig::generic("tenant", "card")
        };
        db.payment_methods().upsert(&card).await.unwrap();

        assert_eq!(db.payment_methods().get("tenant", "card").await.unwrap(), Some(card));
        assert!(db.payment_methods().get("tenant", "pix").await.unwrap().is_none());
        assert_eq!(db.payment_methods().list_active("tenant").await.unwrap().len(), 1);
    }
}
