//! # Catalog Repository
//!
//! Read access to services and products. Catalog CRUD belongs to another
//! part of the platform; `upsert` exists for seeding and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tabline_core::{CatalogItem, ItemKind};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<CatalogItem>> {
        let item = sqlx::query_as(
            r#"
            SELECT id, tenant_id, kind, name, is_active, on_hand, unit_cost
            FROM catalog_items
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    pub async fn upsert(&self, item: &CatalogItem) -> DbResult<()> {
        debug!(id = %item.id, kind = %item.kind, "Upserting catalog item");

        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, tenant_id, kind, name, is_active, on_hand, unit_cost, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                is_active = excluded.is_active,
                on_hand = excluded.on_hand,
                unit_cost = excluded.unit_cost,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(item.kind)
        .bind(&item.name)
        .bind(item.is_active)
        .bind(item.on_hand)
        .bind(item.unit_cost)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self, tenant_id: &str, kind: ItemKind) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_items WHERE tenant_id = ?1 AND kind = ?2")
            .bind(tenant_id)
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tabline_core::Money;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut haircut = CatalogItem {
            id: "haircut".to_string(),
            tenant_id: "tenant".to_string(),
            kind: ItemKind::Service,
            name: "Haircut".to_string(),
            is_active: true,
            on_hand: 0,
            unit_cost: Money::zero(),
        };
        db.catalog().upsert(&haircut).await.unwrap();
        haircut.is_active = false;
        db.catalog().upsert(&haircut).await.unwrap();

        let loaded = db.catalog().get("tenant", "haircut").await.unwrap().unwrap();
        assert!(!loaded.is_active);
        assert!(db.catalog().get("other", "haircut").await.unwrap().is_none());
        assert_eq!(db.catalog().count("tenant", ItemKind::Service).await.unwrap(), 1);
    }
}
