//! Giver error types.

use cellar_core::address::Address;
use cellar_core::error::{AbiError, CellError, TransportError};
use cellar_wallet::WalletError;
use thiserror::Error;

/// Errors raised while deploying or using a giver contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GiverError {
    /// The giver account is frozen and cannot be deployed.
    #[error("giver account {0} is frozen")]
    FrozenAccount(Address),

    /// The account lacks the minimum balance and no other giver can fund it.
    #[error("account {0} does not have enough balance")]
    InsufficientFunding(Address),

    /// The constructor message expired before it was included.
    #[error("message expired")]
    MessageExpired,

    /// Funding through another giver failed.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Abi(#[from] AbiError),
}
