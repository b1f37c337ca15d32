//! # Commission Repository
//!
//! Commission rules (read during settlement) and generated commission items.
//! Items are never deleted: cancellation flips their status.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tabline_core::{CommissionItem, CommissionRule};

const ITEM_COLUMNS: &str = r#"
    id, tenant_id, professional_id, order_id, order_item_id, rule_id, source, base,
    gross_value, base_value, rate_kind, rate_value, commission_value,
    reference_date, status, created_at, canceled_at
"#;

#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Active rules of a tenant. Effective-date filtering is the resolver's job.
    pub async fn active_rules(&self, tenant_id: &str) -> DbResult<Vec<CommissionRule>> {
        let rules = sqlx::query_as(
            r#"
            SELECT id, tenant_id, scope, service_id, professional_id, unit_id, item_kind,
                   rate_kind, rate_value, base, effective_from, effective_until, is_active
            FROM commission_rules
            WHERE tenant_id = ?1 AND is_active = 1
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }

    pub async fn insert_rule(&self, rule: &CommissionRule) -> DbResult<()> {
        debug!(rule_id = %rule.id, scope = %rule.scope, "Inserting commission rule");

        sqlx::query(
            r#"
            INSERT INTO commission_rules (
                id, tenant_id, scope, service_id, professional_id, unit_id, item_kind,
                rate_kind, rate_value, base, effective_from, effective_until, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.tenant_id)
        .bind(rule.scope)
        .bind(&rule.service_id)
        .bind(&rule.professional_id)
        .bind(&rule.unit_id)
        .bind(rule.item_kind)
        .bind(rule.rate_kind)
        .bind(rule.rate_value)
        .bind(rule.base)
        .bind(rule.effective_from)
        .bind(rule.effective_until)
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Inserts an active commission unless its order line already has one.
    ///
    /// ## Returns
    /// `false` when the line was already commissioned and nothing was written.
    pub async fn insert_item(&self, item: &CommissionItem) -> DbResult<bool> {
        debug!(
            order_id = %item.order_id,
            order_item_id = %item.order_item_id,
            professional_id = %item.professional_id,
            value = %item.commission_value,
            "Inserting commission item"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO commission_items (
                id, tenant_id, professional_id, order_id, order_item_id, rule_id, source, base,
                gross_value, base_value, rate_kind, rate_value, commission_value,
                reference_date, status, created_at, canceled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(&item.professional_id)
        .bind(&item.order_id)
        .bind(&item.order_item_id)
        .bind(&item.rule_id)
        .bind(item.source)
        .bind(item.base)
        .bind(item.gross_value)
        .bind(item.base_value)
        .bind(item.rate_kind)
        .bind(item.rate_value)
        .bind(item.commission_value)
        .bind(item.reference_date)
        .bind(item.status)
        .bind(item.created_at)
        .bind(item.canceled_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn items_for_order(&self, order_id: &str) -> DbResult<Vec<CommissionItem>> {
        let sql = format!(
            "SELECT {} FROM commission_items WHERE order_id = ?1 ORDER BY created_at, id",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?;
        Ok(items)
    }

    /// Soft-deletes every active commission of an order.
    ///
    /// ## Returns
    /// Number of items canceled.
    pub async fn cancel_for_order(&self, order_id: &str, at: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE commission_items
            SET status = 'canceled', canceled_at = ?2
            WHERE order_id = ?1 AND status = 'active'
            "#,
        )
        .bind(order_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order_id, canceled = result.rows_affected(), "Canceled commission items");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use tabline_core::{
        CalculationBase, CommissionRateKind, CommissionScope, CommissionStatus, ItemKind, Money, OrderItem,
        ResolvedRule,
    };

    fn tenant_rule() -> CommissionRule {
        CommissionRule {
            id: "r1".to_string(),
            tenant_id: "tenant".to_string(),
            scope: CommissionScope::Tenant,
            service_id: None,
            professional_id: None,
            unit_id: None,
            item_kind: Some(ItemKind::Service),
            rate_kind: CommissionRateKind::Percentage,
            rate_value: 4000,
            base: CalculationBase::Gross,
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            effective_until: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_rules_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rule = tenant_rule();
        db.commissions().insert_rule(&rule).await.unwrap();
        db.commissions()
            .insert_rule(&CommissionRule {
                id: "r2".to_string(),
                is_active: false,
                ..tenant_rule()
            })
            .await
            .unwrap();

        assert_eq!(db.commissions().active_rules("tenant").await.unwrap(), vec![rule]);
    }

    #[tokio::test]
    async fn test_cancel_for_order_is_soft() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rule = tenant_rule();
        let line = OrderItem::new("o1", ItemKind::Service, "haircut", Some("ana"), 1, Money::from_cents(8000), Money::zero())
            .unwrap();
        let resolved = ResolvedRule {
            rule: &rule,
            source: CommissionScope::Tenant,
        };
        let item = CommissionItem::generate(
            "tenant",
            "ana",
            &line,
            &resolved,
            Money::zero(),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        );
        assert!(db.commissions().insert_item(&item).await.unwrap());

        assert_eq!(db.commissions().cancel_for_order("o1", Utc::now()).await.unwrap(), 1);
        assert_eq!(db.commissions().cancel_for_order("o1", Utc::now()).await.unwrap(), 0);

        let items = db.commissions().items_for_order("o1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, CommissionStatus::Canceled);
        assert!(items[0].canceled_at.is_some());
    }

    #[tokio::test]
    async fn test_one_active_commission_per_line() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rule = tenant_rule();
        let line = OrderItem::new("o1", ItemKind::Service, "haircut", Some("ana"), 1, Money::from_cents(8000), Money::zero())
            .unwrap();
        let resolved = ResolvedRule {
            rule: &rule,
            source: CommissionScope::Tenant,
        };
        let generate = || {
            CommissionItem::generate(
                "tenant",
                "ana",
                &line,
                &resolved,
                Money::zero(),
                NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            )
        };

        assert!(db.commissions().insert_item(&generate()).await.unwrap());
        assert!(!db.commissions().insert_item(&generate()).await.unwrap());
        assert_eq!(db.commissions().items_for_order("o1").await.unwrap().len(), 1);

        // A canceled commission leaves room for the line to be commissioned again
        db.commissions().cancel_for_order("o1", Utc::now()).await.unwrap();
        assert!(db.commissions().insert_item(&generate()).await.unwrap());
        assert_eq!(db.commissions().items_for_order("o1").await.unwrap().len(), 2);
    }
}
