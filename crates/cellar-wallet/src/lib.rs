//! # cellar-wallet — wallet contracts and envelope composition.
//!
//! Turns transfer requests into signed external messages for three wallet
//! contract versions, deploying the wallet on its first send.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`config`] — `WalletConfig` (workchain, TTL, default send flags)
//! - [`protocol`] — `WalletProtocol` and the EverWallet, WalletV3 and
//!   HighloadWalletV2 envelope layouts
//! - [`tracker`] — deployment state and on-chain counters
//! - [`wallet`] — `Wallet` handle
//! - [`giver`] — `Giver` funding trait, implemented by every wallet

pub mod config;
pub mod error;
pub mod giver;
pub mod protocol;
pub mod tracker;
pub mod wallet;

pub use config::WalletConfig;
pub use error::WalletError;
pub use giver::Giver;
pub use protocol::{
    CounterKind, Counters, EnvelopeContext, EverWallet, HighloadWalletV2, OutgoingMessage,
    WalletProtocol, WalletV3,
};
pub use tracker::{DeploymentState, DeploymentStateTracker, Resolved};
pub use wallet::Wallet;
