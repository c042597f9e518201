use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    #[default]
    Check,
    Card,
    Transfer,
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: i64,
    pub amount_cents: i64,
    pub paid_on: String,
    #[sqlx(try_from = "String")]
    pub method: PaymentMethod,
    pub reference: Option<String>, // Check number, transaction id, ...
    pub notes: Option<String>,
    pub created_at: String,
}

/// Payment joined with the invoice it settles, for the payments ledger.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PaymentWithInvoice {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub payment: Payment,
    pub invoice_number: String,
    pub project_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePayment {
    pub amount_cents: i64,
    pub paid_on: Option<String>, // Defaults to today
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl Payment {
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<PaymentWithInvoice>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, PaymentWithInvoice>(
            r#"SELECT pay.*, i.invoice_number, i.project_id
                 FROM payments pay
                 JOIN invoices i ON i.id = pay.invoice_id
                ORDER BY pay.paid_on DESC, pay.id DESC"#,
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_invoice_id<'e, E>(executor: E, invoice_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE invoice_id = $1 ORDER BY paid_on ASC, id ASC",
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await
    }

    pub async fn count_for_project<'e, E>(executor: E, project_id: i64) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM payments pay
                 JOIN invoices i ON i.id = pay.invoice_id
                WHERE i.project_id = $1"#,
        )
        .bind(project_id)
        .fetch_one(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        invoice_id: i64,
        paid_on: &str,
        method: PaymentMethod,
        data: &CreatePayment,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Payment>(
            r#"INSERT INTO payments (invoice_id, amount_cents, paid_on, method, reference, notes, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(invoice_id)
        .bind(data.amount_cents)
        .bind(paid_on.to_string())
        .bind(method.to_string())
        .bind(data.reference.clone())
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
