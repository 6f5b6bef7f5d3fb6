//! Sequential cell reader.

use crate::address::Address;
use crate::crypto::{PublicKey, Signature};
use crate::error::CellError;
use crate::types::Hash256;

use super::{Cell, CellBuilder};

/// A read cursor over one cell's bits and references.
#[derive(Clone, Debug)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: usize,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_offset: 0,
            ref_offset: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_offset
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.references().len() - self.ref_offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if bits > self.remaining_bits() {
            return Err(CellError::UnexpectedEnd);
        }
        Ok(())
    }

    fn bit_at(&self, offset: usize) -> bool {
        self.cell.data()[offset / 8] & (0x80 >> (offset % 8)) != 0
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_offset);
        self.bit_offset += 1;
        Ok(bit)
    }

    pub fn skip_bits(&mut self, bits: usize) -> Result<(), CellError> {
        self.ensure_bits(bits)?;
        self.bit_offset += bits;
        Ok(())
    }

    /// Load an unsigned integer of up to 128 bits.
    pub fn load_u128_bits(&mut self, bits: usize) -> Result<u128, CellError> {
        if bits > 128 {
            return Err(CellError::IntegerOverflow { bits });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for i in 0..bits {
            value = (value << 1) | self.bit_at(self.bit_offset + i) as u128;
        }
        self.bit_offset += bits;
        Ok(value)
    }

    /// Load an unsigned integer of up to 64 bits.
    pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
        if bits > 64 {
            return Err(CellError::IntegerOverflow { bits });
        }
        Ok(self.load_u128_bits(bits)? as u64)
    }

    pub fn load_u8(&mut self) -> Result<u8, CellError> {
        Ok(self.load_uint(8)? as u8)
    }

    pub fn load_u16(&mut self) -> Result<u16, CellError> {
        Ok(self.load_uint(16)? as u16)
    }

    pub fn load_u32(&mut self) -> Result<u32, CellError> {
        Ok(self.load_uint(32)? as u32)
    }

    pub fn load_u64(&mut self) -> Result<u64, CellError> {
        self.load_uint(64)
    }

    /// Load `bits` bits, left-aligned into bytes.
    pub fn load_raw(&mut self, bits: usize) -> Result<Vec<u8>, CellError> {
        self.ensure_bits(bits)?;
        let mut out = vec![0u8; bits.div_ceil(8)];
        for i in 0..bits {
            if self.bit_at(self.bit_offset + i) {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        self.bit_offset += bits;
        Ok(out)
    }

    pub fn load_hash(&mut self) -> Result<Hash256, CellError> {
        let raw = self.load_raw(256)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Hash256(bytes))
    }

    pub fn load_public_key(&mut self) -> Result<PublicKey, CellError> {
        let hash = self.load_hash()?;
        PublicKey::from_bytes(hash.as_bytes())
            .map_err(|e| CellError::Unsupported(e.to_string()))
    }

    pub fn load_signature(&mut self) -> Result<Signature, CellError> {
        let raw = self.load_raw(512)?;
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&raw);
        Ok(Signature(bytes))
    }

    /// Load an `addr_std` without anycast.
    pub fn load_address(&mut self) -> Result<Address, CellError> {
        let tag = self.load_uint(2)?;
        if tag != 0b10 {
            return Err(CellError::InvalidTag(format!("address tag {tag:02b}")));
        }
        if self.load_bit()? {
            return Err(CellError::Unsupported("anycast address".into()));
        }
        let workchain = self.load_u8()? as i8;
        let account = self.load_hash()?;
        Ok(Address::new(workchain as i32, account))
    }

    /// Load a `Grams` amount.
    pub fn load_tokens(&mut self) -> Result<u128, CellError> {
        let bytes = self.load_uint(4)? as usize;
        self.load_u128_bits(bytes * 8)
    }

    /// Next unread reference.
    pub fn load_reference(&mut self) -> Result<&'a Cell, CellError> {
        let cell = self
            .cell
            .reference(self.ref_offset)
            .ok_or(CellError::NoMoreReferences)?;
        self.ref_offset += 1;
        Ok(cell)
    }

    /// Copy the unread remainder into a new cell.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_slice(self)?;
        b.build()
    }
}
