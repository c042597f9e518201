use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use ts_rs::TS;
use utils::dates::now_timestamp;

use crate::dialect::{Dialect, Filter};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl Customer {
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY name ASC, id ASC")
            .fetch_all(executor)
            .await
    }

    /// Case-insensitive match on name, email or phone.
    pub async fn search<'e, E>(
        executor: E,
        dialect: Dialect,
        term: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let filter = Filter::new(dialect).like_ci(&["name", "email", "phone"], term);
        let sql = format!(
            "SELECT * FROM customers{} ORDER BY name ASC, id ASC",
            filter.where_clause()
        );
        filter
            .bind_as(sqlx::query_as::<_, Customer>(&sql))
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, data: &CreateCustomer) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let now = now_timestamp();
        sqlx::query_as::<_, Customer>(
            r#"INSERT INTO customers (name, email, phone, address, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               RETURNING *"#,
        )
        .bind(data.name.clone())
        .bind(data.email.clone())
        .bind(data.phone.clone())
        .bind(data.address.clone())
        .bind(data.notes.clone())
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: &CreateCustomer) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Customer>(
            r#"UPDATE customers
               SET name = $2, email = $3, phone = $4, address = $5, notes = $6, updated_at = $7
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.name.clone())
        .bind(data.email.clone())
        .bind(data.phone.clone())
        .bind(data.address.clone())
        .bind(data.notes.clone())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
