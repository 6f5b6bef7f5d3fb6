//! # cellar-giver — faucet contracts for funding fresh wallets.
//!
//! Two giver contracts are supported: the keyless template giver
//! ([`GiverV1`]) and the owner-keyed giver ([`GiverV2`]). Both can bootstrap
//! themselves on a fresh network, funded by any other [`Giver`] (another
//! giver contract or a deployed wallet).
//!
//! # Modules
//!
//! - [`error`] — `GiverError` enum
//! - [`config`] — `GiverConfig` (workchain, minimum balance, TTL)
//! - [`bootstrap`] — funding checks and constructor submission
//! - [`giver_v1`] — template giver
//! - [`giver_v2`] — keyed giver

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod giver_v1;
pub mod giver_v2;

pub use bootstrap::Readiness;
pub use cellar_wallet::Giver;
pub use config::GiverConfig;
pub use error::GiverError;
pub use giver_v1::GiverV1;
pub use giver_v2::GiverV2;
