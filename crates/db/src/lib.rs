use std::str::FromStr;

use sqlx::{
    AnyConnection, AnyPool, Error,
    any::{AnyConnectOptions, AnyPoolOptions, install_default_drivers},
    migrate::{MigrateError, Migrator},
};
use tracing::info;
use utils::assets::sqlite_path;

pub mod dialect;
pub mod models;

pub use dialect::Dialect;

static SQLITE_MIGRATOR: Migrator = sqlx::migrate!("./migrations/sqlite");
static POSTGRES_MIGRATOR: Migrator = sqlx::migrate!("./migrations/postgres");

#[derive(Debug, thiserror::Error)]
pub enum DBError {
    #[error(transparent)]
    Sqlx(#[from] Error),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Dialect(#[from] dialect::DialectError),
}

/// Shared handle to the application database.
///
/// The pool is an `AnyPool` so the same model code runs against SQLite and
/// PostgreSQL; `dialect` records which one is behind it.
#[derive(Clone)]
pub struct DBService {
    pub pool: AnyPool,
    pub dialect: Dialect,
}

impl DBService {
    /// Connect using `DATABASE_URL`, or the SQLite file in the asset directory.
    pub async fn new() -> Result<DBService, DBError> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("sqlite://{}?mode=rwc", sqlite_path().to_string_lossy()));
        Self::connect(&database_url).await
    }

    pub async fn connect(database_url: &str) -> Result<DBService, DBError> {
        install_default_drivers();
        let dialect = Dialect::from_url(database_url)?;
        let options = AnyConnectOptions::from_str(database_url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(dialect.default_max_connections())
            .connect_with(options)
            .await?;

        let service = DBService { pool, dialect };
        service.migrate().await?;
        info!(dialect = %dialect, "Database ready");
        Ok(service)
    }

    /// Private in-memory SQLite database with migrations applied.
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the pool
    /// is pinned to a single connection that never idles out.
    pub async fn new_in_memory() -> Result<DBService, DBError> {
        install_default_drivers();
        let options = AnyConnectOptions::from_str("sqlite::memory:")?;
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let service = DBService {
            pool,
            dialect: Dialect::Sqlite,
        };
        service.migrate().await?;
        Ok(service)
    }

    /// Serialise writers to `table` for the rest of the transaction open on
    /// `conn`. Guards that read before they write take this first.
    pub async fn lock_for_write(&self, conn: &mut AnyConnection, table: &str) -> Result<(), Error> {
        sqlx::query(&self.dialect.write_lock_sql(table)).execute(conn).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), MigrateError> {
        match self.dialect {
            Dialect::Sqlite => SQLITE_MIGRATOR.run(&self.pool).await,
            Dialect::Postgres => POSTGRES_MIGRATOR.run(&self.pool).await,
        }
    }
}
