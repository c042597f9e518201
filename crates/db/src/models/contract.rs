use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::now_timestamp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Draft,
    Sent,
    Signed,
    Void,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Contract {
    pub id: i64,
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub title: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub status: ContractStatus,
    pub signer_name: Option<String>,
    pub signature: Option<String>, // PNG data URL captured from the signature pad
    pub signed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateContract {
    pub project_id: i64,
    pub estimate_id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>, // Generated from the template when omitted
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateContract {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SignContract {
    pub signer_name: String,
    pub signature: String,
}

impl Contract {
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_project_id<'e, E>(executor: E, project_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts WHERE project_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    pub async fn count_signed_for_project<'e, E>(executor: E, project_id: i64) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM contracts WHERE project_id = $1 AND status = 'signed'")
            .bind(project_id)
            .fetch_one(executor)
            .await
    }

    pub async fn create<'e, E>(
        executor: E,
        project_id: i64,
        estimate_id: Option<i64>,
        title: &str,
        body: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Contract>(
            r#"INSERT INTO contracts (project_id, estimate_id, title, body, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 'draft', $5, $5)
               RETURNING *"#,
        )
        .bind(project_id)
        .bind(estimate_id)
        .bind(title.to_string())
        .bind(body.to_string())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        title: &str,
        body: &str,
        status: ContractStatus,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Contract>(
            r#"UPDATE contracts SET title = $2, body = $3, status = $4, updated_at = $5
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(title.to_string())
        .bind(body.to_string())
        .bind(status.to_string())
        .bind(now_timestamp())
        .fetch_one(executor)
        .await
    }

    pub async fn sign<'e, E>(
        executor: E,
        id: i64,
        signer_name: &str,
        signature: &str,
        signed_at: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query_as::<_, Contract>(
            r#"UPDATE contracts
               SET status = 'signed', signer_name = $2, signature = $3, signed_at = $4, updated_at = $4
               WHERE id = $1 AND status IN ('draft', 'sent')
               RETURNING *"#,
        )
        .bind(id)
        .bind(signer_name.to_string())
        .bind(signature.to_string())
        .bind(signed_at.to_string())
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
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
        models::project::{
            Project,
            tests::{fields, seed_customer},
        },
    };

    #[tokio::test]
    async fn sign_records_signer_and_status() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = Project::create(&db.pool, &fields(customer.id, "Deck"), 1).await.unwrap();
        let contract = Contract::create(&db.pool, project.id, None, "Agreement", "Body").await.unwrap();
        assert_eq!(contract.status, ContractStatus::Draft);
        assert!(contract.signed_at.is_none());

        let signed = Contract::sign(
            &db.pool,
            contract.id,
            "Pat Hale",
            "data:image/png;base64,AAAA",
            "2025-04-03T10:00:00.000Z",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(signed.status, ContractStatus::Signed);
        assert_eq!(signed.signer_name.as_deref(), Some("Pat Hale"));
        assert_eq!(signed.signed_at.as_deref(), Some("2025-04-03T10:00:00.000Z"));
        assert_eq!(Contract::count_signed_for_project(&db.pool, project.id).await.unwrap(), 1);

        let again = Contract::sign(&db.pool, contract.id, "Someone Else", "data:image/png;base64,BBBB", "2025-04-04T10:00:00.000Z")
            .await
            .unwrap();
        assert!(again.is_none());
        let stored = Contract::find_by_id(&db.pool, contract.id).await.unwrap().unwrap();
        assert_eq!(stored.signer_name.as_deref(), Some("Pat Hale"));
    }
}
