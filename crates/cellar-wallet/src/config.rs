//! Wallet handle configuration.

use cellar_core::constants::{BASE_WORKCHAIN, DEFAULT_SEND_FLAGS, DEFAULT_TTL_SECS, MASTERCHAIN};
use serde::{Deserialize, Serialize};

/// Settings shared by every wallet handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Workchain the wallet address is computed in.
    pub workchain: i32,
    /// Default validity window of an envelope, in seconds.
    pub ttl_secs: u32,
    /// Send mode attached to messages built by [`Wallet::send`](crate::Wallet::send).
    pub default_flags: u8,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            workchain: BASE_WORKCHAIN,
            ttl_secs: DEFAULT_TTL_SECS,
            default_flags: DEFAULT_SEND_FLAGS,
        }
    }
}

impl WalletConfig {
    /// Preset for wallets living in the masterchain.
    pub fn masterchain() -> Self {
        Self {
            workchain: MASTERCHAIN,
            ..Self::default()
        }
    }

    /// Same settings in another workchain.
    pub fn with_workchain(self, workchain: i32) -> Self {
        Self { workchain, ..self }
    }

    /// Expiration timestamp for an envelope composed at `now_sec`.
    pub fn expire_at(&self, now_sec: u32, ttl: Option<u32>) -> u32 {
        now_sec.saturating_add(ttl.unwrap_or(self.ttl_secs))
    }
}
