//! Account addresses.
//!
//! An address is a `(workchain, account)` pair. The account id is the
//! representation hash of the contract's initial state, so the same
//! state-init always lands on the same account regardless of workchain.
//!
//! The canonical text form is `<workchain>:<64 hex chars>`, e.g.
//! `0:841288ed3b55d9cdafa806807f02a0ae0c169aa5edfe88a789a6482429756a94`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::types::Hash256;

/// A standard internal account address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    workchain: i32,
    account: Hash256,
}

impl Address {
    /// Create an address from its parts.
    pub fn new(workchain: i32, account: Hash256) -> Self {
        Self { workchain, account }
    }

    /// Workchain id.
    pub fn workchain(&self) -> i32 {
        self.workchain
    }

    /// 32-byte account id.
    pub fn account(&self) -> &Hash256 {
        &self.account
    }

    /// Move this handle to another workchain.
    ///
    /// Only the local value changes; the account id is kept as is.
    pub fn set_workchain(&mut self, workchain: i32) {
        self.workchain = workchain;
    }

    /// Workchain as stored in `addr_std` (signed 8 bits).
    pub fn workchain_i8(&self) -> Result<i8, AddressError> {
        i8::try_from(self.workchain).map_err(|_| AddressError::WorkchainOutOfRange(self.workchain))
    }

    /// Encode as `<workchain>:<hex>`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.workchain, self.account)
    }

    /// Decode from `<workchain>:<hex>`.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let (wc, account) = s.trim().split_once(':').ok_or(AddressError::MissingSeparator)?;
        let workchain = wc
            .parse::<i32>()
            .map_err(|_| AddressError::InvalidWorkchain(wc.to_string()))?;
        if account.len() != 64 {
            return Err(AddressError::InvalidAccount(account.to_string()));
        }
        let account = Hash256::from_hex(account)
            .map_err(|_| AddressError::InvalidAccount(account.to_string()))?;
        Ok(Self { workchain, account })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, self.account)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
