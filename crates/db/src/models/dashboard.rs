use serde::{Deserialize, Serialize};
use sqlx::AnyPool;
use ts_rs::TS;

use super::pay_term::PayTerm;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardStats {
    pub customer_count: i64,
    pub active_project_count: i64,
    pub open_estimate_count: i64,
    pub outstanding_cents: i64,
    pub overdue_invoice_count: i64,
    pub paid_this_month_cents: i64,
    pub upcoming_pay_terms: Vec<PayTerm>,
}

/// Date bounds the dashboard is computed for, all `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct DashboardWindow {
    pub today: String,
    pub month_start: String,
    pub horizon_end: String,
}

async fn count(pool: &AnyPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).fetch_one(pool).await
}

impl DashboardStats {
    pub async fn load(pool: &AnyPool, window: &DashboardWindow) -> Result<Self, sqlx::Error> {
        let customer_count = count(pool, "SELECT COUNT(*) FROM customers").await?;
        let active_project_count =
            count(pool, "SELECT COUNT(*) FROM projects WHERE status = 'active'").await?;
        let open_estimate_count =
            count(pool, "SELECT COUNT(*) FROM estimates WHERE status IN ('draft', 'sent')").await?;
        let overdue_invoice_count =
            count(pool, "SELECT COUNT(*) FROM invoices WHERE status = 'overdue'").await?;

        let outstanding_cents = count(
            pool,
            r#"SELECT CAST(COALESCE(SUM(
                   i.total_cents - COALESCE((SELECT SUM(pay.amount_cents) FROM payments pay WHERE pay.invoice_id = i.id), 0)
               ), 0) AS BIGINT)
               FROM invoices i
               WHERE i.status IN ('sent', 'partial', 'overdue')"#,
        )
        .await?;

        let paid_this_month_cents: i64 = sqlx::query_scalar(
            r#"SELECT CAST(COALESCE(SUM(amount_cents), 0) AS BIGINT)
               FROM payments
               WHERE paid_on >= $1 AND paid_on <= $2"#,
        )
        .bind(window.month_start.clone())
        .bind(window.today.clone())
        .fetch_one(pool)
        .await?;

        let upcoming_pay_terms = PayTerm::find_upcoming(pool, &window.today, &window.horizon_end).await?;

        Ok(Self {
            customer_count,
            active_project_count,
            open_estimate_count,
            outstanding_cents,
            overdue_invoice_count,
            paid_this_month_cents,
            upcoming_pay_terms,
        })
    }
}
