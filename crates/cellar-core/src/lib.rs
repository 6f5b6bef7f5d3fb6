//! # cellar-core
//! Foundation types, cell layer and traits for Cellar wallets.

pub mod abi;
pub mod address;
pub mod cell;
pub mod clock;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod models;
pub mod traits;
pub mod types;

pub use address::Address;
pub use cell::{Cell, CellBuilder, CellSlice, Dict};
pub use crypto::{KeyPair, PublicKey, Signature};
pub use error::{AbiError, AddressError, CellError, CryptoError, TransportError};
pub use models::{
    AccountState, AccountStatus, InternalMessage, SignedExternalMessage, StateInit, Transaction,
};
pub use traits::{Clock, Signer, Transport};
pub use types::Hash256;
