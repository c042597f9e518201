//! Startup check that the schema is migrated and the business tables exist

use db::{DBService, Dialect};
use sqlx::AnyPool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables every deployment needs before the API can serve requests.
pub const REQUIRED_TABLES: &[&str] = &[
    "customers",
    "projects",
    "estimates",
    "invoices",
    "line_items",
    "payments",
    "pay_terms",
    "contracts",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: AnyPool,
    dialect: Dialect,
}

impl DatabaseValidator {
    pub fn new(db: &DBService) -> Self {
        Self {
            pool: db.pool.clone(),
            dialect: db.dialect,
        }
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(self.dialect.table_exists_sql())
            .bind(table.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Check that migrations have run and every required table is present
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        if !self.table_exists("_sqlx_migrations").await? {
            warn!(dialect = %self.dialect, "Database not initialized - _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
                warnings: vec!["Database has not been initialized. Run migrations.".to_string()],
            });
        }

        let migrations_applied: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = TRUE")
                .fetch_one(&self.pool)
                .await?;
        let latest_migration = self.get_latest_migration().await?;
        let missing_tables = self.validate_tables(REQUIRED_TABLES).await?;

        let warnings = if missing_tables.is_empty() {
            vec![]
        } else {
            vec![format!("missing tables: {}", missing_tables.join(", "))]
        };

        info!(
            dialect = %self.dialect,
            migrations_applied,
            latest_migration = ?latest_migration,
            "Database validation complete"
        );

        Ok(ValidationResult {
            is_initialized: true,
            migrations_applied: migrations_applied as usize,
            latest_migration,
            missing_tables,
            warnings,
        })
    }

    /// Names from `required_tables` that do not exist
    pub async fn validate_tables(&self, required_tables: &[&str]) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing_tables = Vec::new();
        for table in required_tables {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }
        Ok(missing_tables)
    }

    pub async fn get_latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        let migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = TRUE ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(migration)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.warnings.is_empty() {
            format!("Database validation warnings: {}", self.warnings.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrated_database_passes() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = DatabaseValidator::new(&db).validate().await.unwrap();

        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(result.migrations_applied, 1);
        assert_eq!(result.latest_migration.as_deref(), Some("init"));
        assert!(result.summary().starts_with("Database OK"));
    }

    #[tokio::test]
    async fn reports_unknown_tables_as_missing() {
        let db = DBService::new_in_memory().await.unwrap();
        let validator = DatabaseValidator::new(&db);

        let missing = validator.validate_tables(&["customers", "timesheets"]).await.unwrap();
        assert_eq!(missing, vec!["timesheets".to_string()]);
    }
}
