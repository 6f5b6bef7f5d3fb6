//! Giver configuration.

use cellar_core::constants::{BASE_WORKCHAIN, DEFAULT_TTL_SECS, ONE_TOKEN};
use serde::{Deserialize, Serialize};

/// Settings for deploying and using a giver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiverConfig {
    /// Workchain the giver lives in.
    pub workchain: i32,
    /// Balance (nano-tokens) an uninitialized giver must hold before its
    /// constructor is sent.
    pub minimum_balance: u128,
    /// Validity window of signed giver calls, in seconds.
    pub ttl_secs: u32,
}

impl Default for GiverConfig {
    fn default() -> Self {
        Self {
            workchain: BASE_WORKCHAIN,
            minimum_balance: ONE_TOKEN,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl GiverConfig {
    pub fn with_workchain(self, workchain: i32) -> Self {
        Self { workchain, ..self }
    }
}
