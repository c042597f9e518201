use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

use super::{Totals, line_item::LineItemInput};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EstimateStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Estimate {
    pub id: i64,
    pub project_id: i64,
    pub estimate_number: String,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub status: EstimateStatus,
    pub issue_date: String,
    pub valid_until: Option<String>,
    pub tax_rate: f64, // Percent, e.g. 8.25
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>, // Combined sections, see EstimateNotes
    pub created_at: String,
    pub updated_at: String,
}

impl Estimate {
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
        }
    }
}

/// The sections stored together in an estimate's `notes` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct EstimateNotes {
    pub general: String,
    pub scope: String,
    pub exclusions: String,
    pub terms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateEstimate {
    pub project_id: i64,
    pub title: String,
    pub issue_date: Option<String>, // Defaults to today
    pub valid_until: Option<String>,
    pub tax_rate: Option<f64>, // Defaults to the configured rate
    pub notes: Option<EstimateNotes>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateEstimate {
    pub title: Option<String>,
    pub status: Option<EstimateStatus>,
    pub issue_date: Option<String>,
    pub valid_until: Option<String>,
    pub tax_rate: Option<f64>,
    pub notes: Option<EstimateNotes>,
    pub items: Option<Vec<LineItemInput>>, // Replaces all items when present
}

#[derive(Debug, Clone)]
pub struct EstimateFields {
    pub project_id: i64,
    pub title: String,
    pub status: EstimateStatus,
    pub issue_date: String,
    pub valid_until: Option<String>,
    pub tax_rate: f64,
    pub notes: Option<String>,
    pub totals: Totals,
}

impl From<&Estimate> for EstimateFields {
    fn from(estimate: &Estimate) -> Self {
        Self {
            project_id: estimate.project_id,
            title: estimate.title.clone(),
            status: estimate.status,
            issue_date: estimate.issue_date.clone(),
            valid_until: estimate.valid_until.clone(),
            tax_rate: estimate.tax_rate,
            notes: estimate.notes.clone(),
            totals: estimate.totals(),
        }
    }
}

impl Estimate {
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Estimate>("SELECT * FROM estimates WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_project_id<'e, E>(executor: E, project_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Estimate>(
            "SELECT * FROM estimates WHERE project_id = $1 ORDER BY issue_date DESC, id DESC",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    /// Next free number in the `EST-0001` sequence.
    pub async fn next_number<'e, E>(executor: E) -> Result<String, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let max_id: i64 =
            sqlx::query_scalar("SELECT CAST(COALESCE(MAX(id), 0) AS BIGINT) FROM estimates")
                .fetch_one(executor)
                .await?;
        Ok(format!("EST-{:04}", max_id + 1))
    }

    pub async fn create<'e, E>(executor: E, number: &str, data: &EstimateFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Estimate>(
            r#"INSERT INTO estimates (project_id, estimate_number, title, status, issue_date, valid_until, tax_rate,
                                      subtotal_cents, tax_cents, total_cents, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
               RETURNING *"#,
        )
        .bind(data.project_id)
        .bind(number.to_string())
        .bind(data.title.clone())
        .bind(data.status.to_string())
        .bind(data.issue_date.clone())
        .bind(data.valid_until.clone())
        .bind(data.tax_rate)
        .bind(data.totals.subtotal_cents)
        .bind(data.totals.tax_cents)
        .bind(data.totals.total_cents)
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: &EstimateFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Estimate>(
            r#"UPDATE estimates
               SET title = $2, status = $3, issue_date = $4, valid_until = $5, tax_rate = $6,
                   subtotal_cents = $7, tax_cents = $8, total_cents = $9, notes = $10, updated_at = $11
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.title.clone())
        .bind(data.status.to_string())
        .bind(data.issue_date.clone())
        .bind(data.valid_until.clone())
        .bind(data.tax_rate)
        .bind(data.totals.subtotal_cents)
        .bind(data.totals.tax_cents)
        .bind(data.totals.total_cents)
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update_status<'e, E>(executor: E, id: i64, status: EstimateStatus) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query("UPDATE estimates SET status = $2, updated_at = $3 WHERE id = $1")
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
        let result = sqlx::query("DELETE FROM estimates WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
