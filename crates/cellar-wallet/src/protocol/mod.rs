//! Wallet contract versions.
//!
//! Each version is a [`WalletProtocol`]: it knows its contract code, lays out
//! the per-instance init data (and therefore the address), parses the
//! counters it keeps on-chain, and packs outgoing messages into a signed
//! external envelope.
//!
//! | Version | Type | Max messages | On-chain counter |
//! |---|---|---|---|
//! | A | [`EverWallet`] | 1 | none (expiration header) |
//! | B | [`WalletV3`] | 4 | seqno |
//! | C | [`HighloadWalletV2`] | 255 | wallet_id, read once (query id from batch hash) |

mod ever_wallet;
mod highload_v2;
mod wallet_v3;

pub use ever_wallet::EverWallet;
pub use highload_v2::HighloadWalletV2;
pub use wallet_v3::WalletV3;

use std::sync::OnceLock;

use cellar_core::address::Address;
use cellar_core::cell::{Cell, boc};
use cellar_core::constants::DEFAULT_SEND_FLAGS;
use cellar_core::crypto::PublicKey;
use cellar_core::error::CellError;
use cellar_core::models::{InternalMessage, SignedExternalMessage, StateInit};
use cellar_core::traits::Signer;

use crate::error::WalletError;

/// How a wallet version protects against replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Nothing to read back once deployed.
    None,
    /// Fixed at deployment; read from the account once per handle.
    Static,
    /// Sequence number that must be re-read before every envelope.
    Seqno,
}

/// Values forwarded from the account's init data into new envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub seqno: u32,
    pub wallet_id: u32,
}

/// One outgoing internal message with its send mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub message: InternalMessage,
    pub flags: u8,
}

impl OutgoingMessage {
    pub fn new(message: InternalMessage, flags: u8) -> Self {
        Self { message, flags }
    }
}

impl From<InternalMessage> for OutgoingMessage {
    fn from(message: InternalMessage) -> Self {
        Self::new(message, DEFAULT_SEND_FLAGS)
    }
}

/// Everything a protocol needs besides the messages to compose an envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeContext {
    /// Wallet address (destination of the external message).
    pub address: Address,
    /// Current time in milliseconds.
    pub time_ms: u64,
    /// Expiration timestamp in seconds.
    pub expire_at: u32,
    /// Network signature domain id.
    pub signature_id: Option<i32>,
    /// Freshly resolved counters.
    pub counters: Counters,
    /// Own state-init, present while the wallet is not deployed.
    pub state_init: Option<StateInit>,
}

/// A wallet contract version.
pub trait WalletProtocol: Send + Sync {
    /// Short human-readable version name.
    fn name(&self) -> &'static str;

    /// Largest batch accepted in one envelope.
    fn max_messages(&self) -> usize;

    fn counter_kind(&self) -> CounterKind;

    /// Contract code shared by every instance of this version.
    fn code(&self) -> Result<Cell, CellError>;

    /// Init data for `public_key` with this instance's parameters.
    fn compute_init_data(&self, public_key: &PublicKey) -> Result<Cell, CellError>;

    /// Counters a fresh (not yet deployed) instance starts with.
    fn initial_counters(&self) -> Counters;

    /// Read counters back from the init data of an active account.
    fn parse_counters(&self, data: &Cell) -> Result<Counters, CellError>;

    /// Lay out, sign and wrap `messages` into an external message.
    fn build_envelope(
        &self,
        ctx: EnvelopeContext,
        messages: &[OutgoingMessage],
        signer: &dyn Signer,
    ) -> Result<SignedExternalMessage, WalletError>;

    fn compute_state_init(&self, public_key: &PublicKey) -> Result<StateInit, CellError> {
        Ok(StateInit::new(self.code()?, self.compute_init_data(public_key)?))
    }

    /// Deployment address of the wallet owned by `public_key`. Pure.
    fn compute_address(&self, public_key: &PublicKey, workchain: i32) -> Result<Address, CellError> {
        self.compute_state_init(public_key)?.compute_address(workchain)
    }

    /// Reject batches the version cannot carry.
    fn check_batch(&self, messages: &[OutgoingMessage]) -> Result<(), WalletError> {
        if messages.len() > self.max_messages() {
            return Err(WalletError::TooManyMessages {
                count: messages.len(),
                max: self.max_messages(),
            });
        }
        Ok(())
    }
}

/// Decode an embedded code BOC once and hand out clones.
pub(crate) fn cached_code(cache: &'static OnceLock<Cell>, boc_base64: &str) -> Result<Cell, CellError> {
    if let Some(cell) = cache.get() {
        return Ok(cell.clone());
    }
    let cell = boc::decode_base64(boc_base64)?;
    Ok(cache.get_or_init(|| cell).clone())
}
