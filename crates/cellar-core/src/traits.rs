//! Trait interfaces consumed by the wallet layer.
//!
//! - [`Signer`] — produces signatures for the wallet owner (`KeyPair` implements)
//! - [`Clock`] — current time, injectable for tests
//! - [`Transport`] — network access (account states, message submission, tracing)

use async_trait::async_trait;

use crate::address::Address;
use crate::crypto::{PublicKey, Signature};
use crate::error::TransportError;
use crate::models::{AccountState, SignedExternalMessage, Transaction};

/// Signs payload hashes on behalf of a wallet owner.
pub trait Signer: Send + Sync {
    /// Public key matching the signatures this signer produces.
    fn public_key(&self) -> PublicKey;

    /// Sign `data`, prefixing the big-endian `signature_id` when present.
    fn sign(&self, data: &[u8], signature_id: Option<i32>) -> Signature;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Seconds since the Unix epoch.
    fn now_sec(&self) -> u32 {
        (self.now_ms() / 1000) as u32
    }
}

/// Network access used to read account states and broadcast messages.
///
/// Implementations are shared between handles (`Arc<dyn Transport>`), so all
/// methods take `&self`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Clock used to compute message expiration.
    fn clock(&self) -> &dyn Clock;

    /// Current state of an account. Returns `None` if the account does not exist.
    async fn get_account_state(&self, address: &Address)
    -> Result<Option<AccountState>, TransportError>;

    /// Network signature domain id, if the network uses one.
    async fn get_signature_id(&self) -> Result<Option<i32>, TransportError>;

    /// Broadcast an external message and wait for the transaction it produced.
    ///
    /// Returns `None` if the message expired without being included.
    async fn send_external_message(
        &self,
        message: &SignedExternalMessage,
    ) -> Result<Option<Transaction>, TransportError>;

    /// Wait until the whole tree of transactions caused by `transaction` is
    /// produced and return it (the root excluded).
    async fn trace_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Vec<Transaction>, TransportError>;
}
