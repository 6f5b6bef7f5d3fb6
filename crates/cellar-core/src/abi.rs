//! Minimal ABI call encoder for wallet and giver functions.
//!
//! Only what external calls to the bundled contracts need is supported:
//! `address`, `uintN`, `bool` and `cell` inputs, the `pubkey`, `time` and
//! `expire` headers, and ABI versions 1, 2.0 and 2.3.
//!
//! # Body layout
//!
//! ```text
//! v1:    sig:(Maybe ^[signature:bits512 pubkey:bits256]) fn_id:uint32 inputs..
//! v2.x:  sig:(Maybe bits512) headers.. fn_id:uint32 inputs..
//! ```
//!
//! Inputs are packed greedily; when the next value does not fit, a new cell
//! is started and linked from the previous one through its last reference.
//! The first cell keeps room for the signature so signing never overflows.
//!
//! The signed hash is the representation hash of the body without the
//! signature slot. From 2.3 on, the destination address is prepended to that
//! body before hashing, binding the signature to one contract.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::Address;
use crate::cell::{Cell, CellBuilder};
use crate::constants::{MAX_CELL_BITS, MAX_CELL_REFS};
use crate::crypto::{PublicKey, Signature};
use crate::error::{AbiError, CellError};
use crate::types::Hash256;

/// Supported ABI versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AbiVersion {
    V1,
    V2_0,
    V2_3,
}

impl AbiVersion {
    pub fn major(&self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2_0 | Self::V2_3 => 2,
        }
    }

    /// Bits and references the first cell reserves for the signature slot.
    fn signature_reserve(&self) -> (usize, usize) {
        match self {
            Self::V1 => (1, 1),
            Self::V2_0 | Self::V2_3 => (1 + 512, 0),
        }
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
            Self::V2_0 => write!(f, "2.0"),
            Self::V2_3 => write!(f, "2.3"),
        }
    }
}

/// Function header fields, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiHeader {
    /// `Maybe bits256` public key.
    PubKey,
    /// Call time in milliseconds, `uint64`.
    Time,
    /// Expiration in seconds, `uint32`.
    Expire,
}

/// Parameter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint(usize),
    Bool,
    Cell,
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Bool => write!(f, "bool"),
            Self::Cell => write!(f, "cell"),
        }
    }
}

/// Named function parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbiParam {
    pub name: &'static str,
    pub kind: AbiType,
}

impl AbiParam {
    pub const fn new(name: &'static str, kind: AbiType) -> Self {
        Self { name, kind }
    }
}

/// Input value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(u128),
    Bool(bool),
    Cell(Cell),
}

impl AbiValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Uint(_) => "uint",
            Self::Bool(_) => "bool",
            Self::Cell(_) => "cell",
        }
    }
}

/// Header values supplied by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeaderValues {
    pub pubkey: Option<PublicKey>,
    pub time_ms: u64,
    pub expire_at: u32,
}

/// A contract function description.
#[derive(Clone, Copy, Debug)]
pub struct AbiFunction {
    pub name: &'static str,
    pub version: AbiVersion,
    pub headers: &'static [AbiHeader],
    pub inputs: &'static [AbiParam],
    pub outputs: &'static [AbiParam],
}

impl AbiFunction {
    /// `name(inputs)(outputs)vN`.
    pub fn signature(&self) -> String {
        let join = |params: &[AbiParam]| {
            params
                .iter()
                .map(|p| p.kind.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "{}({})({})v{}",
            self.name,
            join(self.inputs),
            join(self.outputs),
            self.version.major()
        )
    }

    /// Id used in inbound messages (high bit cleared).
    pub fn input_id(&self) -> u32 {
        let hash = Sha256::digest(self.signature().as_bytes());
        u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]) & 0x7FFF_FFFF
    }

    /// Encode an external call to `dst`.
    pub fn encode_external(
        &self,
        dst: &Address,
        header: &HeaderValues,
        inputs: &[AbiValue],
    ) -> Result<UnsignedCall, AbiError> {
        if inputs.len() != self.inputs.len() {
            return Err(AbiError::InputCount {
                function: self.name.to_string(),
                expected: self.inputs.len(),
                got: inputs.len(),
            });
        }

        let mut values = Vec::with_capacity(self.headers.len() + 1 + inputs.len());
        for h in self.headers {
            let mut b = CellBuilder::new();
            match h {
                AbiHeader::PubKey => match &header.pubkey {
                    Some(key) => {
                        b.store_bit(true)?.store_public_key(key)?;
                    }
                    None => {
                        b.store_bit(false)?;
                    }
                },
                AbiHeader::Time => {
                    b.store_u64(header.time_ms)?;
                }
                AbiHeader::Expire => {
                    b.store_u32(header.expire_at)?;
                }
            }
            values.push(b);
        }

        let mut id = CellBuilder::new();
        id.store_u32(self.input_id())?;
        values.push(id);

        for (param, value) in self.inputs.iter().zip(inputs) {
            values.push(encode_value(param, value)?);
        }

        let (reserve_bits, reserve_refs) = self.version.signature_reserve();
        let payload = pack_into_chain(values, reserve_bits, reserve_refs)?;

        let hash = if self.version >= AbiVersion::V2_3 {
            let mut b = CellBuilder::new();
            b.store_address(dst)?.store_slice(&payload.as_slice())?;
            *b.build()?.repr_hash()
        } else {
            *payload.repr_hash()
        };

        let expire_at = if self.headers.contains(&AbiHeader::Expire) {
            header.expire_at
        } else {
            u32::MAX
        };

        Ok(UnsignedCall {
            version: self.version,
            payload,
            hash,
            expire_at,
        })
    }
}

/// An encoded call waiting for its signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedCall {
    pub version: AbiVersion,
    /// Body without the signature slot.
    pub payload: Cell,
    /// Hash to sign.
    pub hash: Hash256,
    /// Value of the `expire` header, or `u32::MAX` when the function has none.
    pub expire_at: u32,
}

impl UnsignedCall {
    /// Body with the signature (and, for v1, the signer's key) filled in.
    pub fn with_signature(&self, signature: &Signature, pubkey: &PublicKey) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        match self.version {
            AbiVersion::V1 => {
                let mut sig = CellBuilder::new();
                sig.store_signature(signature)?.store_public_key(pubkey)?;
                b.store_bit(true)?.store_reference(sig.build()?)?;
            }
            AbiVersion::V2_0 | AbiVersion::V2_3 => {
                b.store_bit(true)?.store_signature(signature)?;
            }
        }
        b.store_slice(&self.payload.as_slice())?;
        b.build()
    }

    /// Body with an empty signature slot.
    pub fn without_signature(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_bit(false)?.store_slice(&self.payload.as_slice())?;
        b.build()
    }
}

fn type_error(param: &AbiParam, value: &AbiValue) -> AbiError {
    AbiError::InputType {
        name: param.name.to_string(),
        expected: param.kind.to_string(),
        got: value.type_name().to_string(),
    }
}

fn encode_value(param: &AbiParam, value: &AbiValue) -> Result<CellBuilder, AbiError> {
    let mut b = CellBuilder::new();
    match (param.kind, value) {
        (AbiType::Address, AbiValue::Address(addr)) => {
            b.store_address(addr)?;
        }
        (AbiType::Uint(bits), AbiValue::Uint(v)) => {
            b.store_u128_bits(*v, bits)?;
        }
        (AbiType::Bool, AbiValue::Bool(v)) => {
            b.store_bit(*v)?;
        }
        (AbiType::Cell, AbiValue::Cell(cell)) => {
            b.store_reference(cell.clone())?;
        }
        _ => return Err(type_error(param, value)),
    }
    Ok(b)
}

/// Pack values into a chain of cells, starting with `reserve_bits` and
/// `reserve_refs` already taken in the first one.
fn pack_into_chain(
    values: Vec<CellBuilder>,
    reserve_bits: usize,
    reserve_refs: usize,
) -> Result<Cell, CellError> {
    let mut cells = vec![CellBuilder::new()];
    let mut used = (reserve_bits, reserve_refs);

    for value in values {
        let bits_free = MAX_CELL_BITS - used.0;
        // One reference stays free for the continuation.
        let refs_free = (MAX_CELL_REFS - 1).saturating_sub(used.1);
        if value.bit_len() > bits_free || value.reference_count() > refs_free {
            cells.push(CellBuilder::new());
            used = (0, 0);
        }
        if let Some(current) = cells.last_mut() {
            current.store_builder(&value)?;
        }
        used.0 += value.bit_len();
        used.1 += value.reference_count();
    }

    let mut next: Option<Cell> = None;
    while let Some(mut builder) = cells.pop() {
        if let Some(child) = next.take() {
            builder.store_reference(child)?;
        }
        next = Some(builder.build()?);
    }
    next.ok_or(CellError::UnexpectedEnd)
}
