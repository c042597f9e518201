use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use db::{DBError, DBService};
use services::services::{
    config::{Config, ConfigError, save_config_to_file},
    database_validator::DatabaseValidationError,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DBError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] DatabaseValidationError),
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn config_path(&self) -> &Path;

    /// Validate `new_config`, persist it, then swap it in for every handler.
    async fn update_config(&self, new_config: Config) -> Result<Config, DeploymentError> {
        new_config.validate()?;
        save_config_to_file(&new_config, self.config_path()).await?;

        let mut config = self.config().write().await;
        *config = new_config.clone();
        info!(path = %self.config_path().display(), "Configuration updated");
        Ok(new_config)
    }
}
