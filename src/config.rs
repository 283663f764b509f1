use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::{MemoryStorage, Storage, VaultKvStorage};

const API_TOKEN_ENV: &str = "MATRIX_SECRETS_API_TOKEN";

fn default_port() -> u16 {
    8200
}

/// Where homeserver and user records are kept.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Vault {
        address: String,
        token: String,
        mount: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_token: None,
            storage: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: Config = serde_json::from_str(&raw).context("parsing config JSON")?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            self.api_token = Some(token);
        }
    }

    /// Build the configured storage backend. Without a `storage` section the
    /// Vault backend is taken from `VAULT_*` variables, falling back to memory.
    pub fn build_storage(&self) -> Result<Arc<dyn Storage>> {
        match &self.storage {
            Some(StorageConfig::Memory) => {
                info!("using in-memory storage");
                Ok(Arc::new(MemoryStorage::new()))
            }
            Some(StorageConfig::Vault {
                address,
                token,
                mount,
            }) => {
                info!(address = %address, mount = %mount, "using Vault storage");
                let storage = VaultKvStorage::new(address.as_str(), token.as_str(), mount.as_str())
                    .context("creating Vault storage")?;
                Ok(Arc::new(storage))
            }
            None => match VaultKvStorage::from_env().context("creating Vault storage")? {
                Some(storage) => {
                    info!("using Vault storage from environment");
                    Ok(Arc::new(storage))
                }
                None => {
                    warn!("no storage configured, records will not survive a restart");
                    Ok(Arc::new(MemoryStorage::new()))
                }
            },
        }
    }
}
