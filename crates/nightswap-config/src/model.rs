use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const DEFAULT_REQUEST_TTL_HOURS: u32 = 48;
pub const DEFAULT_BACKUP_RETENTION: usize = 5;
pub const DEFAULT_LOG_FILTER: &str = "nightswap=info";

/// Shell preferences and exchange tuning shared by every lease on this machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    /// Hours a request may stay pending before the expiry sweep closes it.
    #[serde(default = "Config::default_request_ttl_hours")]
    pub request_ttl_hours: u32,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_opened_lease: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root for lease files. Defaults to the platform data dir.
    pub data_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: "USD".into(),
            request_ttl_hours: Self::default_request_ttl_hours(),
            backup_retention: Self::default_backup_retention(),
            log_filter: Self::default_log_filter(),
            ui_color_enabled: Self::default_ui_color_enabled(),
            last_opened_lease: None,
            data_root: None,
        }
    }
}

impl Config {
    pub fn default_request_ttl_hours() -> u32 {
        DEFAULT_REQUEST_TTL_HOURS
    }

    pub fn default_backup_retention() -> usize {
        DEFAULT_BACKUP_RETENTION
    }

    pub fn default_log_filter() -> String {
        DEFAULT_LOG_FILTER.into()
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("nightswap")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_ttl_hours == 0 {
            return Err(ConfigError::Invalid(
                "request_ttl_hours must be at least 1".into(),
            ));
        }
        if self.backup_retention == 0 {
            return Err(ConfigError::Invalid(
                "backup_retention must be at least 1".into(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("currency must not be empty".into()));
        }
        Ok(())
    }
}
