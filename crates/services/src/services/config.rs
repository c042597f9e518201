use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Letterhead printed on estimates, invoices and contracts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(default)]
pub struct CompanyProfile {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub license_number: Option<String>,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "Your Company".to_string(),
            address: None,
            phone: None,
            email: None,
            license_number: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(default)]
pub struct Config {
    pub company: CompanyProfile,
    pub default_tax_rate: f64,
    pub invoice_due_days: i64,
    pub estimate_valid_days: i64,
    pub overdue_check_interval_secs: u64,
    pub contract_template: Option<String>, // Built-in template when unset
}

impl Default for Config {
    fn default() -> Self {
        Self {
            company: CompanyProfile::default(),
            default_tax_rate: 0.0,
            invoice_due_days: 30,
            estimate_valid_days: 30,
            overdue_check_interval_secs: 3600,
            contract_template: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.company.name.trim().is_empty() {
            return Err(ConfigError::Invalid("company.name is required".to_string()));
        }
        if !self.default_tax_rate.is_finite() || !(0.0..=100.0).contains(&self.default_tax_rate) {
            return Err(ConfigError::Invalid(
                "default_tax_rate must be between 0 and 100".to_string(),
            ));
        }
        if self.invoice_due_days < 0 || self.estimate_valid_days < 0 {
            return Err(ConfigError::Invalid(
                "invoice_due_days and estimate_valid_days cannot be negative".to_string(),
            ));
        }
        if self.overdue_check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "overdue_check_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read the config file, falling back to defaults (written back) when it is
/// missing or unreadable.
pub async fn load_config_from_file(config_path: &PathBuf) -> Config {
    match read_config(config_path).await {
        Ok(config) => config,
        Err(e) => {
            if config_path.exists() {
                warn!(path = %config_path.display(), error = %e, "Invalid config file, using defaults");
            } else {
                info!(path = %config_path.display(), "No config file found, creating defaults");
            }
            let config = Config::default();
            if let Err(e) = save_config_to_file(&config, config_path).await {
                warn!(path = %config_path.display(), error = %e, "Failed to write default config");
            }
            config
        }
    }
}

async fn read_config(config_path: &Path) -> Result<Config, ConfigError> {
    let raw = tokio::fs::read_to_string(config_path).await?;
    let config: Config = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, raw).await?;
    Ok(())
}
