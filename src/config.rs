//! Runtime configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an empty
//! object (or no file at all) is a valid configuration.

use crate::error::ConfigError;
use crate::identifiers::SymbolOverrides;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ASSET_CORRELATION_CONFIG";
/// Environment variable overriding the store location.
pub const STORE_ENV: &str = "ASSET_CORRELATION_STORE";

const APP_DIR: &str = "asset-correlation";
const STORE_FILE: &str = "data.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Location of the identifier cache / watch-list document
    pub store_path: PathBuf,
    pub provider: ProviderConfig,
    /// Default history window when the caller gives no start date
    pub lookback_days: i64,
    /// Extra identifier → symbol mappings, layered over the built-in table
    pub symbol_overrides: SymbolOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            provider: ProviderConfig::default(),
            lookback_days: 365,
            symbol_overrides: SymbolOverrides::empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 1,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Config {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the file named by `ASSET_CORRELATION_CONFIG`, then
    /// `ASSET_CORRELATION_STORE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(store) = std::env::var_os(STORE_ENV) {
            config.store_path = PathBuf::from(store);
        }
        Ok(config)
    }

    /// Built-in overrides with the configured ones on top.
    pub fn overrides(&self) -> SymbolOverrides {
        let mut overrides = SymbolOverrides::builtin();
        overrides.extend(&self.symbol_overrides);
        overrides
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join(STORE_FILE))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE))
}
