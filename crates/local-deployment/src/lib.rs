use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::{Config, load_config_from_file},
    database_validator::DatabaseValidator,
    invoice_overdue::InvoiceOverdueService,
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use utils::assets::config_path;

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    config: Arc<RwLock<Config>>,
    config_path: PathBuf,
}

impl LocalDeployment {
    /// Assemble a deployment from already opened parts without starting
    /// background services.
    pub fn from_parts(db: DBService, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            config_path,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config_path = config_path();
        let config = load_config_from_file(&config_path).await;
        let db = DBService::new().await?;

        let validation = DatabaseValidator::new(&db).validate().await?;
        if validation.is_ok() {
            info!("{}", validation.summary());
        } else {
            warn!("{}", validation.summary());
        }

        let deployment = Self::from_parts(db, config, config_path);
        InvoiceOverdueService::spawn(deployment.db.clone(), deployment.config.clone()).await;

        Ok(deployment)
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_config_persists_and_swaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let db = DBService::new_in_memory().await.unwrap();
        let deployment = LocalDeployment::from_parts(db, Config::default(), path.clone());

        let mut changed = Config::default();
        changed.company.name = "Birch & Stone Builders".to_string();
        changed.invoice_due_days = 15;
        deployment.update_config(changed.clone()).await.unwrap();

        assert_eq!(*deployment.config().read().await, changed);
        assert_eq!(load_config_from_file(&path).await, changed);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_and_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let db = DBService::new_in_memory().await.unwrap();
        let deployment = LocalDeployment::from_parts(db, Config::default(), path.clone());

        let mut bad = Config::default();
        bad.default_tax_rate = 140.0;
        assert!(deployment.update_config(bad).await.is_err());
        assert!(!path.exists());
        assert_eq!(*deployment.config().read().await, Config::default());
    }
}
