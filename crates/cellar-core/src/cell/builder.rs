//! Incremental cell construction.

use crate::address::Address;
use crate::constants::{MAX_CELL_BITS, MAX_CELL_REFS, MAX_GRAMS_BYTES};
use crate::crypto::{PublicKey, Signature};
use crate::error::{AddressError, CellError};

use super::{Cell, CellSlice};

/// Appends bits and references, then freezes them into a [`Cell`].
///
/// Every `store_*` method checks capacity first and leaves the builder
/// untouched on overflow.
#[derive(Clone, Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Cell>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits stored so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Number of references stored so far.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Bits that can still be stored.
    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    /// References that can still be stored.
    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::BitsOverflow {
                bits: self.bit_len + bits,
                max: MAX_CELL_BITS,
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        let byte = self.bit_len / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    pub fn store_zeros(&mut self, bits: usize) -> Result<&mut Self, CellError> {
        self.ensure_bits(bits)?;
        for _ in 0..bits {
            self.push_bit(false);
        }
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, most significant first.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        self.store_u128_bits(value as u128, bits)
    }

    /// Store the low `bits` bits (up to 128) of `value`, most significant first.
    pub fn store_u128_bits(&mut self, value: u128, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(CellError::IntegerOverflow { bits });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    pub fn store_u8(&mut self, value: u8) -> Result<&mut Self, CellError> {
        self.store_uint(value as u64, 8)
    }

    pub fn store_u16(&mut self, value: u16) -> Result<&mut Self, CellError> {
        self.store_uint(value as u64, 16)
    }

    pub fn store_u32(&mut self, value: u32) -> Result<&mut Self, CellError> {
        self.store_uint(value as u64, 32)
    }

    pub fn store_u64(&mut self, value: u64) -> Result<&mut Self, CellError> {
        self.store_uint(value, 64)
    }

    /// Store the first `bits` bits of `bytes`.
    pub fn store_raw(&mut self, bytes: &[u8], bits: usize) -> Result<&mut Self, CellError> {
        if bytes.len() * 8 < bits {
            return Err(CellError::UnexpectedEnd);
        }
        self.ensure_bits(bits)?;
        for i in 0..bits {
            self.push_bit(bytes[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        Ok(self)
    }

    pub fn store_reference(&mut self, cell: Cell) -> Result<&mut Self, CellError> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::RefsOverflow {
                refs: self.references.len() + 1,
                max: MAX_CELL_REFS,
            });
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Append the unread remainder of `slice` (bits and references).
    pub fn store_slice(&mut self, slice: &CellSlice<'_>) -> Result<&mut Self, CellError> {
        let bits = slice.remaining_bits();
        let refs = slice.remaining_refs();
        self.ensure_bits(bits)?;
        if self.references.len() + refs > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow {
                refs: self.references.len() + refs,
                max: MAX_CELL_REFS,
            });
        }
        let mut reader = slice.clone();
        let data = reader.load_raw(bits)?;
        self.store_raw(&data, bits)?;
        for _ in 0..refs {
            let r = reader.load_reference()?.clone();
            self.references.push(r);
        }
        Ok(self)
    }

    /// Append everything stored in another builder.
    pub fn store_builder(&mut self, other: &CellBuilder) -> Result<&mut Self, CellError> {
        self.ensure_bits(other.bit_len)?;
        if self.references.len() + other.references.len() > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow {
                refs: self.references.len() + other.references.len(),
                max: MAX_CELL_REFS,
            });
        }
        self.store_raw(&other.data, other.bit_len)?;
        self.references.extend(other.references.iter().cloned());
        Ok(self)
    }

    pub fn store_public_key(&mut self, key: &PublicKey) -> Result<&mut Self, CellError> {
        self.store_raw(&key.to_bytes(), 256)
    }

    pub fn store_signature(&mut self, signature: &Signature) -> Result<&mut Self, CellError> {
        self.store_raw(signature.as_bytes(), 512)
    }

    /// Store `addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256`
    /// with no anycast.
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self, CellError> {
        let wc = address
            .workchain_i8()
            .map_err(|e: AddressError| CellError::Unsupported(e.to_string()))?;
        self.ensure_bits(2 + 1 + 8 + 256)?;
        self.store_uint(0b10, 2)?;
        self.store_bit(false)?;
        self.store_u8(wc as u8)?;
        self.store_raw(address.account().as_bytes(), 256)
    }

    /// Store `addr_none$00`.
    pub fn store_address_none(&mut self) -> Result<&mut Self, CellError> {
        self.store_zeros(2)
    }

    /// Store an amount as `Grams` (`VarUInteger 16`): a 4-bit byte length
    /// followed by the big-endian value.
    pub fn store_tokens(&mut self, amount: u128) -> Result<&mut Self, CellError> {
        let bytes = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if bytes > MAX_GRAMS_BYTES {
            return Err(CellError::IntegerOverflow { bits: bytes * 8 });
        }
        self.ensure_bits(4 + bytes * 8)?;
        self.store_uint(bytes as u64, 4)?;
        self.store_u128_bits(amount, bytes * 8)
    }

    /// Freeze into an immutable cell.
    pub fn build(&self) -> Result<Cell, CellError> {
        Cell::new(self.data.clone(), self.bit_len, self.references.clone())
    }
}
