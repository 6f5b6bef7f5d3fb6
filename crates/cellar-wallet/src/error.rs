//! Wallet error types.

use cellar_core::address::Address;
use cellar_core::error::{AbiError, AddressError, CellError, CryptoError, TransportError};
use thiserror::Error;

/// Errors that can occur while composing or sending wallet messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The envelope expired before it was included. Retry with a fresh one.
    #[error("message expired")]
    MessageExpired,

    /// The batch exceeds what the wallet version accepts in one envelope.
    #[error("too many messages at once: {count} > {max}")]
    TooManyMessages {
        /// Messages in the rejected batch.
        count: usize,
        /// Maximum for this wallet version.
        max: usize,
    },

    /// An active account reported no init data to read counters from.
    #[error("account {0} does not contain state data")]
    MissingStateData(Address),

    /// A wallet known to be deployed is no longer active on-chain.
    #[error("account {0} is not active")]
    AccountNotActive(Address),

    /// The wallet version cannot express the request.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Address(#[from] AddressError),

    /// Network failure reported by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
