use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const DEFAULT_THEME: &str = "Hospitals";
pub const DEFAULT_CATALOG_ENDPOINT: &str =
    "https://data.cms.gov/provider-data/api/1/metastore/schemas/dataset/items";
pub const DEFAULT_OUTPUT_DIR: &str = "hospital_datasets";
pub const DEFAULT_CHECKPOINT_PATH: &str = "run_metadata.json";
pub const DEFAULT_CONCURRENCY: usize = 8;

/// On-disk configuration. Every field is optional; unset fields fall back to
/// the defaults above.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub catalog_endpoint: Option<String>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub checkpoint_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub catalog_retry_delay_ms: Option<u64>,
}

/// Values supplied on the command line or through the environment. They win
/// over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub catalog_endpoint: Option<String>,
    pub output_dir: Option<Utf8PathBuf>,
    pub checkpoint_path: Option<Utf8PathBuf>,
    pub concurrency_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    pub theme: String,
    pub catalog_endpoint: String,
    pub output_dir: Utf8PathBuf,
    pub checkpoint_path: Utf8PathBuf,
    pub concurrency_limit: usize,
    pub request_timeout_secs: u64,
    pub catalog_retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            catalog_endpoint: DEFAULT_CATALOG_ENDPOINT.to_string(),
            output_dir: Utf8PathBuf::from(DEFAULT_OUTPUT_DIR),
            checkpoint_path: Utf8PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            concurrency_limit: DEFAULT_CONCURRENCY,
            request_timeout_secs: 300,
            catalog_retry_delay_ms: 500,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<SyncConfig, SyncError> {
        let config = match path {
            Some(path) => {
                let config_path = PathBuf::from(path);
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| SyncError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<SyncConfig, SyncError> {
        let defaults = SyncConfig::default();
        let resolved = SyncConfig {
            theme: overrides
                .theme
                .or(config.theme)
                .unwrap_or(defaults.theme),
            catalog_endpoint: overrides
                .catalog_endpoint
                .or(config.catalog_endpoint)
                .unwrap_or(defaults.catalog_endpoint),
            output_dir: overrides
                .output_dir
                .or(config.output_dir)
                .unwrap_or(defaults.output_dir),
            checkpoint_path: overrides
                .checkpoint_path
                .or(config.checkpoint_path)
                .unwrap_or(defaults.checkpoint_path),
            concurrency_limit: overrides
                .concurrency_limit
                .or(config.concurrency_limit)
                .unwrap_or(defaults.concurrency_limit),
            request_timeout_secs: config
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            catalog_retry_delay_ms: config
                .catalog_retry_delay_ms
                .unwrap_or(defaults.catalog_retry_delay_ms),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.theme.trim().is_empty() {
            return Err(SyncError::InvalidConfig("theme must not be empty".to_string()));
        }
        if self.catalog_endpoint.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "catalog endpoint must not be empty".to_string(),
            ));
        }
        if self.concurrency_limit == 0 {
            return Err(SyncError::InvalidConfig(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let resolved =
            ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default()).unwrap();
        assert_eq!(resolved, SyncConfig::default());
        assert_eq!(resolved.concurrency_limit, 8);
    }
}
