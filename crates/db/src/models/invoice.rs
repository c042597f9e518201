use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

use super::{Totals, line_item::LineItemInput};
use crate::dialect::{Dialect, Filter};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Partial,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    /// Statuses that still expect money to come in.
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Invoice {
    pub id: i64,
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub invoice_number: String,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub issue_date: String,
    pub due_date: Option<String>,
    pub tax_rate: f64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Invoice {
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
        }
    }
}

/// Invoice with payment progress and the names shown in list views.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub invoice: Invoice,
    pub amount_paid_cents: i64,
    pub balance_cents: i64,
    pub project_name: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateInvoice {
    pub project_id: i64,
    pub title: String,
    pub issue_date: Option<String>,
    pub due_date: Option<String>, // Defaults to issue date + configured days
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateInvoice {
    pub title: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct InvoiceFields {
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub title: String,
    pub status: InvoiceStatus,
    pub issue_date: String,
    pub due_date: Option<String>,
    pub tax_rate: f64,
    pub notes: Option<String>,
    pub totals: Totals,
}

impl From<&Invoice> for InvoiceFields {
    fn from(invoice: &Invoice) -> Self {
        Self {
            project_id: invoice.project_id,
            estimate_id: invoice.estimate_id,
            title: invoice.title.clone(),
            status: invoice.status,
            issue_date: invoice.issue_date.clone(),
            due_date: invoice.due_date.clone(),
            tax_rate: invoice.tax_rate,
            notes: invoice.notes.clone(),
            totals: invoice.totals(),
        }
    }
}

const SUMMARY_SELECT: &str = r#"SELECT i.*,
       (SELECT CAST(COALESCE(SUM(pay.amount_cents), 0) AS BIGINT) FROM payments pay WHERE pay.invoice_id = i.id) AS amount_paid_cents,
       i.total_cents - (SELECT CAST(COALESCE(SUM(pay.amount_cents), 0) AS BIGINT) FROM payments pay WHERE pay.invoice_id = i.id) AS balance_cents,
       p.name AS project_name,
       c.name AS customer_name
  FROM invoices i
  JOIN projects p ON p.id = i.project_id
  JOIN customers c ON c.id = p.customer_id"#;

impl Invoice {
    pub async fn find_filtered<'e, E>(
        executor: E,
        dialect: Dialect,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceSummary>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let where_filter = Filter::new(dialect)
            .eq_text("i.status", filter.status.map(|s| s.to_string()))
            .eq_i64("i.project_id", filter.project_id);
        let sql = format!(
            "{SUMMARY_SELECT}{} ORDER BY i.issue_date DESC, i.id DESC",
            where_filter.where_clause()
        );
        where_filter
            .bind_as(sqlx::query_as::<_, InvoiceSummary>(&sql))
            .fetch_all(executor)
            .await
    }

    pub async fn find_summary<'e, E>(executor: E, id: i64) -> Result<Option<InvoiceSummary>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let sql = format!("{SUMMARY_SELECT} WHERE i.id = $1");
        sqlx::query_as::<_, InvoiceSummary>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_project_id<'e, E>(executor: E, project_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE project_id = $1 ORDER BY issue_date DESC, id DESC",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    /// A non-void invoice that bills `estimate_id`, either whole or through
    /// one of its pay terms.
    pub async fn find_open_for_estimate<'e, E>(executor: E, estimate_id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE estimate_id = $1 AND status <> 'void' ORDER BY id ASC LIMIT 1",
        )
        .bind(estimate_id)
        .fetch_optional(executor)
        .await
    }

    /// A non-void invoice that bills the whole of `estimate_id`, i.e. one no
    /// pay term points at.
    pub async fn find_whole_for_estimate<'e, E>(executor: E, estimate_id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"SELECT * FROM invoices i
               WHERE i.estimate_id = $1
                 AND i.status <> 'void'
                 AND NOT EXISTS (SELECT 1 FROM pay_terms t WHERE t.invoice_id = i.id)
               ORDER BY i.id ASC
               LIMIT 1"#,
        )
        .bind(estimate_id)
        .fetch_optional(executor)
        .await
    }

    /// Sent or partially paid invoices due strictly before `today`.
    pub async fn find_overdue_candidates<'e, E>(executor: E, today: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"SELECT * FROM invoices
               WHERE status IN ('sent', 'partial')
                 AND due_date IS NOT NULL
                 AND due_date < $1
               ORDER BY due_date ASC"#,
        )
        .bind(today.to_string())
        .fetch_all(executor)
        .await
    }

    pub async fn amount_paid<'e, E>(executor: E, id: i64) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount_cents), 0) AS BIGINT) FROM payments WHERE invoice_id = $1",
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Next free number in the `INV-0001` sequence.
    pub async fn next_number<'e, E>(executor: E) -> Result<String, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let max_id: i64 =
            sqlx::query_scalar("SELECT CAST(COALESCE(MAX(id), 0) AS BIGINT) FROM invoices")
                .fetch_one(executor)
                .await?;
        Ok(format!("INV-{:04}", max_id + 1))
    }

    pub async fn create<'e, E>(executor: E, number: &str, data: &InvoiceFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"INSERT INTO invoices (project_id, estimate_id, invoice_number, title, status, issue_date, due_date, tax_rate,
                                     subtotal_cents, tax_cents, total_cents, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
               RETURNING *"#,
        )
        .bind(data.project_id)
        .bind(data.estimate_id)
        .bind(number.to_string())
        .bind(data.title.clone())
        .bind(data.status.to_string())
        .bind(data.issue_date.clone())
        .bind(data.due_date.clone())
        .bind(data.tax_rate)
        .bind(data.totals.subtotal_cents)
        .bind(data.totals.tax_cents)
        .bind(data.totals.total_cents)
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: &InvoiceFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"UPDATE invoices
               SET title = $2, status = $3, issue_date = $4, due_date = $5, tax_rate = $6,
                   subtotal_cents = $7, tax_cents = $8, total_cents = $9, notes = $10, updated_at = $11
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.title.clone())
        .bind(data.status.to_string())
        .bind(data.issue_date.clone())
        .bind(data.due_date.clone())
        .bind(data.tax_rate)
        .bind(data.totals.subtotal_cents)
        .bind(data.totals.tax_cents)
        .bind(data.totals.total_cents)
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update_status<'e, E>(executor: E, id: i64, status: InvoiceStatus) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query("UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .bind(now_timestamp())
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        DBService,
        models::project::{
            Project,
            tests::{fields, seed_customer},
        },
    };

    pub(crate) fn invoice_fields(project_id: i64, total_cents: i64) -> InvoiceFields {
        InvoiceFields {
            project_id,
            estimate_id: None,
            title: "Progress billing".to_string(),
            status: InvoiceStatus::Sent,
            issue_date: "2025-04-01".to_string(),
            due_date: Some("2025-05-01".to_string()),
            tax_rate: 0.0,
            notes: None,
            totals: Totals {
                subtotal_cents: total_cents,
                tax_cents: 0,
                total_cents,
            },
        }
    }

    #[tokio::test]
    async fn summary_reports_paid_and_balance() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = Project::create(&db.pool, &fields(customer.id, "Deck"), 1).await.unwrap();
        let invoice = Invoice::create(&db.pool, "INV-0001", &invoice_fields(project.id, 50_000))
            .await
            .unwrap();

        sqlx::query("INSERT INTO payments (invoice_id, amount_cents, paid_on, method, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(invoice.id)
            .bind(20_000_i64)
            .bind("2025-04-10".to_string())
            .bind("check".to_string())
            .bind(now_timestamp())
            .execute(&db.pool)
            .await
            .unwrap();

        let summary = Invoice::find_summary(&db.pool, invoice.id).await.unwrap().unwrap();
        assert_eq!(summary.amount_paid_cents, 20_000);
        assert_eq!(summary.balance_cents, 30_000);
        assert_eq!(summary.customer_name, "Hale");
        assert_eq!(summary.project_name, "Deck");
        assert_eq!(Invoice::amount_paid(&db.pool, invoice.id).await.unwrap(), 20_000);

        let sent = Invoice::find_filtered(
            &db.pool,
            db.dialect,
            &InvoiceFilter {
                status: Some(InvoiceStatus::Sent),
                project_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(sent.len(), 1);
        let paid = Invoice::find_filtered(
            &db.pool,
            db.dialect,
            &InvoiceFilter {
                status: Some(InvoiceStatus::Paid),
                project_id: Some(project.id),
            },
        )
        .await
        .unwrap();
        assert!(paid.is_empty());
    }

    #[tokio::test]
    async fn overdue_candidates_skip_drafts_and_future_dates() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = Project::create(&db.pool, &fields(customer.id, "Deck"), 1).await.unwrap();

        let past_due = Invoice::create(&db.pool, "INV-0001", &invoice_fields(project.id, 100))
            .await
            .unwrap();
        let mut draft = invoice_fields(project.id, 100);
        draft.status = InvoiceStatus::Draft;
        Invoice::create(&db.pool, "INV-0002", &draft).await.unwrap();
        let mut later = invoice_fields(project.id, 100);
        later.due_date = Some("2025-07-01".to_string());
        Invoice::create(&db.pool, "INV-0003", &later).await.unwrap();

        let candidates = Invoice::find_overdue_candidates(&db.pool, "2025-06-01").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, past_due.id);

        // due today is not yet overdue
        let on_due_date = Invoice::find_overdue_candidates(&db.pool, "2025-05-01").await.unwrap();
        assert!(on_due_date.is_empty());
    }
}
