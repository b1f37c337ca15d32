//! # Compensation Forecast Repository
//!
//! At most one forecast per receivable (`receivable_id` is UNIQUE).

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tabline_core::CompensationForecast;

const COLUMNS: &str = r#"
    f.id, f.tenant_id, f.receivable_id, f.expected_date, f.gross_amount, f.fee_percentage,
    f.percentage_fee, f.fixed_fee, f.net_amount, f.status, f.created_at
"#;

#[derive(Debug, Clone)]
pub struct ForecastRepository {
    pool: SqlitePool,
}

impl ForecastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ForecastRepository { pool }
    }

    /// Inserts the forecast unless its receivable already has one.
    ///
    /// ## Returns
    /// `true` if a row was created.
    pub async fn insert_if_absent(&self, forecast: &CompensationForecast) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO compensation_forecasts (
                id, tenant_id, receivable_id, expected_date, gross_amount, fee_percentage,
                percentage_fee, fixed_fee, net_amount, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(receivable_id) DO NOTHING
            "#,
        )
        .bind(&forecast.id)
        .bind(&forecast.tenant_id)
        .bind(&forecast.receivable_id)
        .bind(forecast.expected_date)
        .bind(forecast.gross_amount)
        .bind(forecast.fee_percentage)
        .bind(forecast.percentage_fee)
        .bind(forecast.fixed_fee)
        .bind(forecast.net_amount)
        .bind(forecast.status)
        .bind(forecast.created_at)
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(receivable_id = %forecast.receivable_id, expected_date = %forecast.expected_date, created, "Booking forecast");
        Ok(created)
    }

    pub async fn for_receivable(&self, receivable_id: &str) -> DbResult<Option<CompensationForecast>> {
        let sql = format!("SELECT {} FROM compensation_forecasts f WHERE f.receivable_id = ?1", COLUMNS);
        let forecast = sqlx::query_as(&sql).bind(receivable_id).fetch_optional(&self.pool).await?;
        Ok(forecast)
    }

    /// Forecasts of every receivable linked to an order.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<CompensationForecast>> {
        let sql = format!(
            "SELECT {} FROM compensation_forecasts f \
             JOIN receivable_accounts r ON r.id = f.receivable_id \
             WHERE r.order_id = ?1 ORDER BY f.created_at, f.id",
            COLUMNS
        );
        let forecasts = sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?;
        Ok(forecasts)
    }

    /// Cancels the pending forecasts of an order's receivables.
    ///
    /// ## Returns
    /// Number of forecasts canceled.
    pub async fn cancel_for_order(&self, order_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE compensation_forecasts
            SET status = 'canceled'
            WHERE status IN ('forecast', 'confirmed')
              AND receivable_id IN (SELECT id FROM receivable_accounts WHERE order_id = ?1)
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order_id, canceled = result.rows_affected(), "Canceled forecasts");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use tabline_core::{ForecastStatus, Money, PaymentMethodConfig, Percentage, ReceivableAccount, ReceivableOrigin};

    #[tokio::test]
    async fn test_one_forecast_per_receivable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let card = PaymentMethodConfig {
            settlement_delay_days: 2,
            fee_percentage: Percentage::from_bps(300),
            fixed_fee: Money::from_cents(50),
            ..PaymentMethodConfig::generic("tenant", "card")
        };
        let now = Utc::now();
        let receivable =
            ReceivableAccount::for_payment("tenant", "o1", "p2", ReceivableOrigin::Service, Money::from_cents(3200), &card, now);
        db.receivables().insert_if_absent(&receivable).await.unwrap();

        let (service_fee, _) = card.fixed_fee_split(Money::from_cents(3200), Money::from_cents(800));
        let first = CompensationForecast::for_receivable(&receivable, &card, service_fee, now);
        let again = CompensationForecast::for_receivable(&receivable, &card, service_fee, now);
        assert!(db.forecasts().insert_if_absent(&first).await.unwrap());
        assert!(!db.forecasts().insert_if_absent(&again).await.unwrap());

        let stored = db.forecasts().for_receivable(&receivable.id).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.fixed_fee, Money::from_cents(40));

        assert_eq!(db.forecasts().cancel_for_order("o1").await.unwrap(), 1);
        let forecasts = db.forecasts().for_order("o1").await.unwrap();
        assert_eq!(forecasts.len(), 1);
        assert_eq!(forecasts[0].status, ForecastStatus::Canceled);
    }
}
