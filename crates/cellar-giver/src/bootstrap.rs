//! Giver deployment procedure shared by every giver contract.
//!
//! ```text
//! absent ──(other giver funds)──▶ re-read
//! Active  ─▶ done, no constructor
//! Frozen  ─▶ FrozenAccount
//! Uninit / absent with balance < minimum ─▶ top up or InsufficientFunding
//! otherwise ─▶ send constructor with state-init, wait for settlement
//! ```

use std::sync::OnceLock;

use tracing::{debug, info};

use cellar_core::abi::UnsignedCall;
use cellar_core::address::Address;
use cellar_core::cell::{Cell, boc};
use cellar_core::crypto::Signature;
use cellar_core::error::CellError;
use cellar_core::models::{AccountStatus, SignedExternalMessage, StateInit, Transaction};
use cellar_core::traits::Transport;
use cellar_wallet::Giver;

use crate::config::GiverConfig;
use crate::error::GiverError;

/// What the account needs after funding checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Already deployed.
    Active,
    /// Funded; the constructor must be sent.
    NeedsConstructor,
}

/// Make sure the account at `address` can be deployed.
pub async fn prepare_account(
    transport: &dyn Transport,
    address: &Address,
    config: &GiverConfig,
    other_giver: Option<&dyn Giver>,
) -> Result<Readiness, GiverError> {
    let mut state = transport.get_account_state(address).await?;

    if state.is_none() {
        let giver = other_giver.ok_or(GiverError::InsufficientFunding(*address))?;
        info!(giver = %address, from = %giver.address(), "funding missing giver account");
        giver.give(address, config.minimum_balance).await?;
        state = transport.get_account_state(address).await?;
    }

    let balance = match &state {
        Some(s) if s.status == AccountStatus::Active => {
            debug!(giver = %address, "giver already active");
            return Ok(Readiness::Active);
        }
        Some(s) if s.status == AccountStatus::Frozen => {
            return Err(GiverError::FrozenAccount(*address));
        }
        Some(s) => s.balance,
        None => 0,
    };

    if balance < config.minimum_balance {
        let giver = other_giver.ok_or(GiverError::InsufficientFunding(*address))?;
        info!(
            giver = %address,
            from = %giver.address(),
            balance,
            minimum = config.minimum_balance,
            "topping up giver account"
        );
        giver.give(address, config.minimum_balance).await?;
    }

    Ok(Readiness::NeedsConstructor)
}

/// Broadcast `message` and wait for its whole transaction tree.
pub async fn send_and_settle(
    transport: &dyn Transport,
    message: &SignedExternalMessage,
) -> Result<Transaction, GiverError> {
    let tx = transport
        .send_external_message(message)
        .await?
        .ok_or(GiverError::MessageExpired)?;
    let children = transport.trace_transaction(&tx).await?;
    debug!(tx = %tx.hash, children = children.len(), "giver call settled");
    Ok(tx)
}

/// Wrap an encoded call into an external message.
pub(crate) fn external_message(
    dst: Address,
    call: UnsignedCall,
    body: Cell,
    signature: Option<Signature>,
    state_init: Option<StateInit>,
) -> SignedExternalMessage {
    SignedExternalMessage {
        dst,
        expire_at: call.expire_at,
        signature,
        payload: call.payload,
        body,
        state_init,
    }
}

/// Decode an embedded contract image once.
pub(crate) fn cached_state_init(
    cache: &'static OnceLock<Cell>,
    boc_base64: &str,
) -> Result<StateInit, CellError> {
    let cell = match cache.get() {
        Some(cell) => cell.clone(),
        None => {
            let cell = boc::decode_base64(boc_base64)?;
            cache.get_or_init(|| cell).clone()
        }
    };
    StateInit::from_cell(&cell)
}
