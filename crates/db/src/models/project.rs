use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

use crate::dialect::{Dialect, Filter};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Lead,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: i64,
    pub customer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub site_address: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ProjectStatus,
    pub priority: i64, // 1-based, dense across all projects
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub budget_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Project row joined with its customer's name, for list views.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectWithCustomer {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub project: Project,
    pub customer_name: String,
}

impl std::ops::Deref for ProjectWithCustomer {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub customer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub site_address: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<i64>, // Appended last when omitted
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub budget_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub customer_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub site_address: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<i64>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub budget_cents: Option<i64>,
}

/// Column values written on create/update; priority is managed separately.
#[derive(Debug, Clone)]
pub struct ProjectFields {
    pub customer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub site_address: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub budget_cents: i64,
}

impl From<&Project> for ProjectFields {
    fn from(project: &Project) -> Self {
        Self {
            customer_id: project.customer_id,
            name: project.name.clone(),
            description: project.description.clone(),
            site_address: project.site_address.clone(),
            status: project.status,
            start_date: project.start_date.clone(),
            due_date: project.due_date.clone(),
            budget_cents: project.budget_cents,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ProjectFilter {
    pub customer_id: Option<i64>,
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
}

const WITH_CUSTOMER: &str =
    "SELECT p.*, c.name AS customer_name FROM projects p JOIN customers c ON c.id = p.customer_id";

impl Project {
    pub async fn find_filtered<'e, E>(
        executor: E,
        dialect: Dialect,
        filter: &ProjectFilter,
    ) -> Result<Vec<ProjectWithCustomer>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let where_filter = Filter::new(dialect)
            .eq_i64("p.customer_id", filter.customer_id)
            .eq_text("p.status", filter.status.map(|s| s.to_string()))
            .like_ci(&["p.name", "p.site_address", "c.name"], filter.search.as_deref());
        let sql = format!(
            "{WITH_CUSTOMER}{} ORDER BY p.priority ASC, p.id ASC",
            where_filter.where_clause()
        );
        where_filter
            .bind_as(sqlx::query_as::<_, ProjectWithCustomer>(&sql))
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_customer_id<'e, E>(executor: E, customer_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE customer_id = $1 ORDER BY priority ASC, id ASC",
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_with_customer<'e, E>(executor: E, id: i64) -> Result<Option<ProjectWithCustomer>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let sql = format!("{WITH_CUSTOMER} WHERE p.id = $1");
        sqlx::query_as::<_, ProjectWithCustomer>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// `(id, priority)` of every project, in priority order.
    pub async fn priorities<'e, E>(executor: E) -> Result<Vec<(i64, i64)>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, (i64, i64)>("SELECT id, priority FROM projects ORDER BY priority ASC, id ASC")
            .fetch_all(executor)
            .await
    }

    pub async fn count_for_customer<'e, E>(executor: E, customer_id: i64) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, data: &ProjectFields, priority: i64) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (customer_id, name, description, site_address, status, priority, start_date, due_date, budget_cents, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
               RETURNING *"#,
        )
        .bind(data.customer_id)
        .bind(data.name.clone())
        .bind(data.description.clone())
        .bind(data.site_address.clone())
        .bind(data.status.to_string())
        .bind(priority)
        .bind(data.start_date.clone())
        .bind(data.due_date.clone())
        .bind(data.budget_cents)
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: &ProjectFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Project>(
            r#"UPDATE projects
               SET customer_id = $2, name = $3, description = $4, site_address = $5, status = $6,
                   start_date = $7, due_date = $8, budget_cents = $9, updated_at = $10
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.customer_id)
        .bind(data.name.clone())
        .bind(data.description.clone())
        .bind(data.site_address.clone())
        .bind(data.status.to_string())
        .bind(data.start_date.clone())
        .bind(data.due_date.clone())
        .bind(data.budget_cents)
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn set_priority<'e, E>(executor: E, id: i64, priority: i64) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query("UPDATE projects SET priority = $2 WHERE id = $1")
            .bind(id)
            .bind(priority)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
