use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::core::utils::{app_data_dir, config_file_in, ensure_dir, write_atomic};
use crate::errors::{LedgerError, Result};

const DEFAULT_STORE_FILE: &str = "transactions.json";
const DEFAULT_LOG_FILTER: &str = "recurring_ledger=info";
const DEFAULT_UPCOMING_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Overrides the directory the store file lives in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub store_file: String,
    pub log_filter: String,
    /// Whether a retryable bulk failure is retried once record by record.
    pub bulk_fallback: bool,
    pub upcoming_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            store_file: DEFAULT_STORE_FILE.into(),
            log_filter: DEFAULT_LOG_FILTER.into(),
            bulk_fallback: true,
            upcoming_window_days: DEFAULT_UPCOMING_WINDOW_DAYS,
        }
    }
}

impl EngineConfig {
    /// Location of the JSON store, relative to `base` unless `data_dir` is set.
    pub fn store_path(&self, base: &Path) -> PathBuf {
        self.data_dir
            .as_deref()
            .unwrap_or(base)
            .join(&self.store_file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upcoming_window_days < 0 {
            return Err(LedgerError::InvalidInput(format!(
                "upcoming_window_days must not be negative, got {}",
                self.upcoming_window_days
            )));
        }
        if self.store_file.trim().is_empty() {
            return Err(LedgerError::InvalidInput("store_file must not be empty".into()));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    base: PathBuf,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        Ok(Self {
            path: config_file_in(&base),
            base,
        })
    }

    pub fn load(&self) -> Result<EngineConfig> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            let config: EngineConfig = serde_json::from_str(&data)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(EngineConfig::default())
        }
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn store_path(&self, config: &EngineConfig) -> PathBuf {
        config.store_path(&self.base)
    }
}
