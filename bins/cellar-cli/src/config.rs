//! CLI configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cellar_core::constants::{BASE_WORKCHAIN, DEFAULT_TTL_SECS};
use cellar_wallet::WalletConfig;

#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the key file used when no public key is given.
    pub key_file: PathBuf,
    /// Wallet settings (workchain, TTL, send flags).
    pub wallet: WalletConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let key_file = std::env::var("CELLAR_KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_key_file());

        let workchain: i32 = match std::env::var("CELLAR_WORKCHAIN") {
            Ok(v) => v
                .parse()
                .context("CELLAR_WORKCHAIN must be an integer")?,
            Err(_) => BASE_WORKCHAIN,
        };

        let ttl_secs: u32 = match std::env::var("CELLAR_TTL_SECS") {
            Ok(v) => v
                .parse()
                .context("CELLAR_TTL_SECS must be a positive integer")?,
            Err(_) => DEFAULT_TTL_SECS,
        };

        Ok(Config {
            key_file,
            wallet: WalletConfig {
                workchain,
                ttl_secs,
                ..WalletConfig::default()
            },
        })
    }
}

fn default_key_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cellar")
        .join("keypair.json")
}
