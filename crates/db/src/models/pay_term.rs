use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayTermKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayTermStatus {
    #[default]
    Pending,
    Invoiced,
    Paid,
}

/// A scheduled partial payment, later converted into an invoice.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PayTerm {
    pub id: i64,
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub position: i64,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub kind: PayTermKind,
    pub percentage: Option<f64>, // Only for percentage terms
    pub amount_cents: i64,       // Resolved amount for both kinds
    pub due_date: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PayTermStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePayTerm {
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub description: String,
    pub kind: PayTermKind,
    pub percentage: Option<f64>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdatePayTerm {
    pub description: Option<String>,
    pub kind: Option<PayTermKind>,
    pub percentage: Option<f64>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PayTermFields {
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub position: i64,
    pub description: String,
    pub kind: PayTermKind,
    pub percentage: Option<f64>,
    pub amount_cents: i64,
    pub due_date: Option<String>,
}

impl From<&PayTerm> for PayTermFields {
    fn from(term: &PayTerm) -> Self {
        Self {
            project_id: term.project_id,
            estimate_id: term.estimate_id,
            position: term.position,
            description: term.description.clone(),
            kind: term.kind,
            percentage: term.percentage,
            amount_cents: term.amount_cents,
            due_date: term.due_date.clone(),
        }
    }
}

impl PayTerm {
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>("SELECT * FROM pay_terms WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_project_id<'e, E>(executor: E, project_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>(
            "SELECT * FROM pay_terms WHERE project_id = $1 ORDER BY position ASC, id ASC",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_estimate_id<'e, E>(executor: E, estimate_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>(
            "SELECT * FROM pay_terms WHERE estimate_id = $1 ORDER BY position ASC, id ASC",
        )
        .bind(estimate_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_invoice_id<'e, E>(executor: E, invoice_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>("SELECT * FROM pay_terms WHERE invoice_id = $1")
            .bind(invoice_id)
            .fetch_all(executor)
            .await
    }

    /// Pending terms due between `from` and `to`, both inclusive.
    pub async fn find_upcoming<'e, E>(executor: E, from: &str, to: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>(
            r#"SELECT * FROM pay_terms
               WHERE status = 'pending'
                 AND due_date IS NOT NULL
                 AND due_date >= $1
                 AND due_date <= $2
               ORDER BY due_date ASC, position ASC"#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(executor)
        .await
    }

    pub async fn next_position<'e, E>(executor: E, project_id: i64) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let max: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(MAX(position), 0) AS BIGINT) FROM pay_terms WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(executor)
        .await?;
        Ok(max + 1)
    }

    pub async fn create<'e, E>(executor: E, data: &PayTermFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>(
            r#"INSERT INTO pay_terms (project_id, estimate_id, position, description, kind, percentage, amount_cents, due_date,
                                      status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $9)
               RETURNING *"#,
        )
        .bind(data.project_id)
        .bind(data.estimate_id)
        .bind(data.position)
        .bind(data.description.clone())
        .bind(data.kind.to_string())
        .bind(data.percentage)
        .bind(data.amount_cents)
        .bind(data.due_date.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: &PayTermFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PayTerm>(
            r#"UPDATE pay_terms
               SET position = $2, description = $3, kind = $4, percentage = $5, amount_cents = $6, due_date = $7,
                   updated_at = $8
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.position)
        .bind(data.description.clone())
        .bind(data.kind.to_string())
        .bind(data.percentage)
        .bind(data.amount_cents)
        .bind(data.due_date.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    /// Link a pending term to `invoice_id`. Returns 0 when the term was no
    /// longer pending.
    pub async fn mark_invoiced<'e, E>(executor: E, id: i64, invoice_id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query(
            r#"UPDATE pay_terms SET invoice_id = $2, status = 'invoiced', updated_at = $3
               WHERE id = $1 AND status = 'pending' AND invoice_id IS NULL"#,
        )
        .bind(id)
        .bind(invoice_id)
        .bind(now_timestamp())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set the status of every term billed on `invoice_id`.
    pub async fn update_status_for_invoice<'e, E>(
        executor: E,
        invoice_id: i64,
        status: PayTermStatus,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("UPDATE pay_terms SET status = $2, updated_at = $3 WHERE invoice_id = $1")
            .bind(invoice_id)
            .bind(status.to_string())
            .bind(now_timestamp())
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Detach terms from an invoice that is going away so they can be billed again.
    pub async fn release_invoice<'e, E>(executor: E, invoice_id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query(
            "UPDATE pay_terms SET invoice_id = NULL, status = 'pending', updated_at = $2 WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .bind(now_timestamp())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM pay_terms WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            invoice::{Invoice, tests::invoice_fields},
            project::{
                Project,
                tests::{fields, seed_customer},
            },
        },
    };

    fn term(project_id: i64, position: i64, due_date: &str) -> PayTermFields {
        PayTermFields {
            project_id,
            estimate_id: None,
            position,
            description: format!("Draw {position}"),
            kind: PayTermKind::Fixed,
            percentage: None,
            amount_cents: 25_000,
            due_date: Some(due_date.to_string()),
        }
    }

    #[tokio::test]
    async fn upcoming_only_returns_pending_terms_in_window() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = Project::create(&db.pool, &fields(customer.id, "Deck"), 1).await.unwrap();
        let invoice = Invoice::create(&db.pool, "INV-0001", &invoice_fields(project.id, 25_000))
            .await
            .unwrap();

        let first = PayTerm::create(&db.pool, &term(project.id, 1, "2025-04-05")).await.unwrap();
        PayTerm::create(&db.pool, &term(project.id, 2, "2025-04-20")).await.unwrap();
        PayTerm::create(&db.pool, &term(project.id, 3, "2025-06-01")).await.unwrap();
        assert_eq!(first.status, PayTermStatus::Pending);
        assert_eq!(PayTerm::next_position(&db.pool, project.id).await.unwrap(), 4);

        assert_eq!(PayTerm::mark_invoiced(&db.pool, first.id, invoice.id).await.unwrap(), 1);
        assert_eq!(PayTerm::mark_invoiced(&db.pool, first.id, invoice.id).await.unwrap(), 0);

        let upcoming = PayTerm::find_upcoming(&db.pool, "2025-04-01", "2025-04-30").await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].position, 2);

        assert_eq!(PayTerm::release_invoice(&db.pool, invoice.id).await.unwrap(), 1);
        let released = PayTerm::find_by_id(&db.pool, first.id).await.unwrap().unwrap();
        assert_eq!(released.status, PayTermStatus::Pending);
        assert!(released.invoice_id.is_none());
    }
}
