//! Wallet configuration
//!
//! Defaults, overridden by an optional `config.json` in the data directory,
//! overridden in turn by command-line flags and environment variables.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the optional configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Wallet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub data_dir: PathBuf,
    pub keystore_file: String,
    pub rpc_url: String,
    /// Directory transaction files are written to
    pub output_dir: PathBuf,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".wallet_data"),
            keystore_file: "keystore.json".to_string(),
            rpc_url: "http://127.0.0.1:20336".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl WalletConfig {
    /// Load `config.json` from `data_dir` if it exists
    ///
    /// The data directory itself always comes from the caller, whatever the
    /// file says.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let config: WalletConfig =
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
            debug!("Loaded configuration from {}", path.display());
            config
        } else {
            Self::default()
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Apply command-line or environment overrides
    pub fn with_overrides(mut self, rpc_url: Option<String>, output_dir: Option<PathBuf>) -> Self {
        if let Some(url) = rpc_url {
            self.rpc_url = url;
        }
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        self
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.data_dir.join(&self.keystore_file)
    }
}
