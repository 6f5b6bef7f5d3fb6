//! On-chain structures handled by the wallet layer.
//!
//! Message layouts follow the block schema:
//!
//! ```text
//! int_msg_info$0 ihr_disabled:Bool bounce:Bool bounced:Bool
//!   src:MsgAddress dest:MsgAddressInt value:CurrencyCollection
//!   ihr_fee:Grams fwd_fee:Grams created_lt:uint64 created_at:uint32
//! ext_in_msg_info$10 src:MsgAddressExt dest:MsgAddressInt import_fee:Grams
//! message$_ info:CommonMsgInfo init:(Maybe (Either StateInit ^StateInit))
//!   body:(Either X ^X)
//! ```
//!
//! Fee, lt and timestamp fields of outgoing internal messages are left zero;
//! the contract that sends them fills these in.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cell::{Cell, CellBuilder, Dict};
use crate::crypto::Signature;
use crate::error::CellError;
use crate::types::Hash256;

/// Initial code and data of a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateInit {
    pub code: Cell,
    pub data: Cell,
    /// Root of the `HashmapE 256 SimpleLib` library dictionary, if any.
    pub library: Option<Cell>,
}

impl StateInit {
    pub fn new(code: Cell, data: Cell) -> Self {
        Self {
            code,
            data,
            library: None,
        }
    }

    /// Serialize as `split_depth:(Maybe ..) special:(Maybe ..) code:(Maybe ^Cell)
    /// data:(Maybe ^Cell) library:(HashmapE 256 SimpleLib)`.
    pub fn build_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bit(false)?
            .store_bit(false)?
            .store_bit(true)?
            .store_reference(self.code.clone())?
            .store_bit(true)?
            .store_reference(self.data.clone())?;
        match &self.library {
            Some(root) => b.store_bit(true)?.store_reference(root.clone())?,
            None => b.store_bit(false)?,
        };
        b.build()
    }

    /// Parse a serialized state-init. Code and data must be present.
    pub fn from_cell(cell: &Cell) -> Result<Self, CellError> {
        let mut s = cell.as_slice();
        if s.load_bit()? {
            s.skip_bits(5)?;
        }
        if s.load_bit()? {
            s.skip_bits(2)?;
        }
        if !s.load_bit()? {
            return Err(CellError::Unsupported("state-init without code".into()));
        }
        let code = s.load_reference()?.clone();
        if !s.load_bit()? {
            return Err(CellError::Unsupported("state-init without data".into()));
        }
        let data = s.load_reference()?.clone();
        let library = if s.load_bit()? {
            Some(s.load_reference()?.clone())
        } else {
            None
        };
        Ok(Self {
            code,
            data,
            library,
        })
    }

    /// Representation hash of the serialized state-init.
    pub fn hash(&self) -> Result<Hash256, CellError> {
        Ok(*self.build_cell()?.repr_hash())
    }

    /// Address the contract is deployed at in `workchain`.
    pub fn compute_address(&self, workchain: i32) -> Result<Address, CellError> {
        Ok(Address::new(workchain, self.hash()?))
    }

    /// Data cell read as a `HashmapE` with `key_bits`-wide keys, the layout
    /// of compiler-generated contracts.
    pub fn data_dict(&self, key_bits: usize) -> Result<Dict, CellError> {
        Dict::load(&mut self.data.as_slice(), key_bits)
    }
}

fn store_init(b: &mut CellBuilder, state_init: Option<&StateInit>) -> Result<(), CellError> {
    match state_init {
        Some(init) => {
            b.store_bit(true)?
                .store_bit(true)?
                .store_reference(init.build_cell()?)?;
        }
        None => {
            b.store_bit(false)?;
        }
    }
    Ok(())
}

/// An internal message emitted by a wallet on the owner's behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalMessage {
    pub dst: Address,
    /// Attached value in nano-tokens.
    pub value: u128,
    pub bounce: bool,
    pub body: Option<Cell>,
    /// Deploys the destination when present.
    pub state_init: Option<StateInit>,
}

impl InternalMessage {
    /// Plain value transfer.
    pub fn transfer(dst: Address, value: u128, bounce: bool) -> Self {
        Self {
            dst,
            value,
            bounce,
            body: None,
            state_init: None,
        }
    }

    pub fn build_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address_none()?
            .store_address(&self.dst)?
            .store_tokens(self.value)?
            .store_bit(false)? // no extra currencies
            .store_tokens(0)? // ihr_fee
            .store_tokens(0)? // fwd_fee
            .store_u64(0)?
            .store_u32(0)?;
        store_init(&mut b, self.state_init.as_ref())?;
        match &self.body {
            Some(body) => {
                b.store_bit(true)?.store_reference(body.clone())?;
            }
            None => {
                b.store_bit(false)?;
            }
        }
        b.build()
    }
}

/// An inbound external message ready for broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedExternalMessage {
    /// Wallet (or giver) address the message is addressed to.
    pub dst: Address,
    /// Unix time in seconds after which the contract rejects the message.
    pub expire_at: u32,
    /// `None` for calls the contract accepts without a signature.
    pub signature: Option<Signature>,
    /// Unsigned payload the signature covers.
    pub payload: Cell,
    /// Full message body as delivered to the contract.
    pub body: Cell,
    /// Attached only while the destination is not deployed.
    pub state_init: Option<StateInit>,
}

impl SignedExternalMessage {
    pub fn build_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_uint(0b10, 2)? // ext_in_msg_info$10
            .store_address_none()?
            .store_address(&self.dst)?
            .store_tokens(0)?; // import_fee
        store_init(&mut b, self.state_init.as_ref())?;
        b.store_bit(true)?.store_reference(self.body.clone())?;
        b.build()
    }

    /// Message hash, as used to look up the resulting transaction.
    pub fn hash(&self) -> Result<Hash256, CellError> {
        Ok(*self.build_cell()?.repr_hash())
    }
}

/// Lifecycle status of an existing account.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Holds a balance but no code.
    Uninit,
    /// Deployed and executing.
    Active,
    /// Suspended for unpaid storage.
    Frozen,
}

/// Snapshot of an account as returned by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub status: AccountStatus,
    /// Balance in nano-tokens.
    pub balance: u128,
    /// Present for active accounts.
    pub state_init: Option<StateInit>,
}

impl AccountState {
    pub fn uninit(balance: u128) -> Self {
        Self {
            status: AccountStatus::Uninit,
            balance,
            state_init: None,
        }
    }

    pub fn active(balance: u128, state_init: StateInit) -> Self {
        Self {
            status: AccountStatus::Active,
            balance,
            state_init: Some(state_init),
        }
    }

    pub fn frozen(balance: u128) -> Self {
        Self {
            status: AccountStatus::Frozen,
            balance,
            state_init: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// A produced transaction, identified by hash and logical time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash256,
    pub lt: u64,
    pub account: Address,
    pub out_msg_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Cell {
        let mut b = CellBuilder::new();
        b.store_u8(byte).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn state_init_layout() {
        let init = StateInit::new(leaf(1), leaf(2));
        let cell = init.build_cell().unwrap();
        assert_eq!(cell.bit_len(), 5);
        assert_eq!(cell.data(), &[0b0011_0000]);
        assert_eq!(cell.references().len(), 2);
    }

    #[test]
    fn state_init_roundtrip() {
        let init = StateInit::new(leaf(1), leaf(2));
        let back = StateInit::from_cell(&init.build_cell().unwrap()).unwrap();
        assert_eq!(back, init);
    }

    #[test]
    fn address_depends_only_on_state_init() {
        let init = StateInit::new(leaf(1), leaf(2));
        let a = init.compute_address(0).unwrap();
        let b = init.compute_address(-1).unwrap();
        assert_eq!(a.account(), b.account());
        assert_ne!(
            a,
            StateInit::new(leaf(1), leaf(3)).compute_address(0).unwrap()
        );
    }

    #[test]
    fn internal_message_with_body_and_init() {
        let dst = Address::new(0, Hash256([1; 32]));
        let msg = InternalMessage {
            dst,
            value: 1_000_000_000,
            bounce: true,
            body: Some(leaf(9)),
            state_init: Some(StateInit::new(leaf(1), leaf(2))),
        };
        let cell = msg.build_cell().unwrap();
        assert_eq!(cell.references().len(), 2);

        let mut s = cell.as_slice();
        assert!(!s.load_bit().unwrap());
        assert!(s.load_bit().unwrap());
        assert!(s.load_bit().unwrap());
        assert!(!s.load_bit().unwrap());
        assert_eq!(s.load_uint(2).unwrap(), 0);
        assert_eq!(s.load_address().unwrap(), dst);
        assert_eq!(s.load_tokens().unwrap(), 1_000_000_000);
    }

    #[test]
    fn transfer_without_body_is_single_cell() {
        let msg = InternalMessage::transfer(Address::new(0, Hash256::ZERO), 5, false);
        let cell = msg.build_cell().unwrap();
        assert!(cell.references().is_empty());
    }

    #[test]
    fn external_message_carries_init_only_when_given() {
        let mut msg = SignedExternalMessage {
            dst: Address::new(0, Hash256([3; 32])),
            expire_at: 100,
            signature: None,
            payload: leaf(1),
            body: leaf(1),
            state_init: None,
        };
        assert_eq!(msg.build_cell().unwrap().references().len(), 1);

        let without = msg.hash().unwrap();
        msg.state_init = Some(StateInit::new(leaf(1), leaf(2)));
        assert_eq!(msg.build_cell().unwrap().references().len(), 2);
        assert_ne!(msg.hash().unwrap(), without);
    }

    #[test]
    fn account_state_constructors() {
        assert!(!AccountState::uninit(0).is_active());
        assert!(AccountState::active(1, StateInit::new(leaf(1), leaf(2))).is_active());
        assert_eq!(AccountState::frozen(0).status, AccountStatus::Frozen);
    }
}
