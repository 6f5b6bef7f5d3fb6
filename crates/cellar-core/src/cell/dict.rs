//! `HashmapE n X` dictionaries with fixed-width integer keys.
//!
//! A dictionary is a binary Patricia tree. Every edge stores a label (the
//! common key prefix below it) in one of three encodings:
//!
//! ```text
//! hml_short$0  len:(Unary ~n) s:(n * Bit)         2 + 2·len bits
//! hml_long$10  len:(#<= m)    s:(n * Bit)         2 + w + len bits
//! hml_same$11  v:Bit          len:(#<= m)         3 + w bits
//! ```
//!
//! where `m` is the number of key bits left and `w = ceil(log2(m + 1))`.
//! Labels are always written in the shortest form, so a dictionary produced
//! by another encoder round-trips to the same cell hash.

use std::collections::BTreeMap;

use crate::error::CellError;

use super::{Cell, CellBuilder, CellSlice};

/// Dictionary with keys of up to 64 bits and cell-slice values.
///
/// Values are stored as cells; their bits and references are appended
/// inline after the leaf label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dict {
    key_bits: usize,
    entries: BTreeMap<u64, Cell>,
}

impl Dict {
    pub fn new(key_bits: usize) -> Result<Self, CellError> {
        if key_bits == 0 || key_bits > 64 {
            return Err(CellError::InvalidDict(format!("unsupported key width {key_bits}")));
        }
        Ok(Self {
            key_bits,
            entries: BTreeMap::new(),
        })
    }

    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<&Cell> {
        self.entries.get(&key)
    }

    pub fn set(&mut self, key: u64, value: Cell) -> Result<Option<Cell>, CellError> {
        if self.key_bits < 64 && key >> self.key_bits != 0 {
            return Err(CellError::InvalidDict(format!(
                "key {key} does not fit into {} bits",
                self.key_bits
            )));
        }
        Ok(self.entries.insert(key, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Cell)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Root cell of the non-empty tree, or `None` for an empty dictionary.
    pub fn root(&self) -> Result<Option<Cell>, CellError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let entries: Vec<(u64, &Cell)> = self.iter().collect();
        build_edge(&entries, self.key_bits).map(Some)
    }

    /// Store as `HashmapE`: `0` when empty, otherwise `1` and a reference to
    /// the root.
    pub fn store_into(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        match self.root()? {
            Some(root) => {
                builder.store_bit(true)?.store_reference(root)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        Ok(())
    }

    /// Load a `HashmapE` from the slice.
    pub fn load(slice: &mut CellSlice<'_>, key_bits: usize) -> Result<Self, CellError> {
        let mut dict = Self::new(key_bits)?;
        if slice.load_bit()? {
            let root = slice.load_reference()?;
            dict.load_edge(&mut root.as_slice(), 0, key_bits)?;
        }
        Ok(dict)
    }

    /// Load a tree from its root cell (the `Hashmap` without the `E` prefix).
    pub fn from_root(root: &Cell, key_bits: usize) -> Result<Self, CellError> {
        let mut dict = Self::new(key_bits)?;
        dict.load_edge(&mut root.as_slice(), 0, key_bits)?;
        Ok(dict)
    }

    fn load_edge(&mut self, slice: &mut CellSlice<'_>, prefix: u64, remaining: usize) -> Result<(), CellError> {
        let (label, len) = load_label(slice, remaining)?;
        let prefix = prefix.checked_shl(len as u32).unwrap_or(0) | label;
        let remaining = remaining - len;
        if remaining == 0 {
            self.entries.insert(prefix, slice.to_cell()?);
            return Ok(());
        }
        let left = slice.load_reference()?;
        let right = slice.load_reference()?;
        self.load_edge(&mut left.as_slice(), prefix << 1, remaining - 1)?;
        self.load_edge(&mut right.as_slice(), (prefix << 1) | 1, remaining - 1)
    }
}

fn mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Bit width of a label length for `max_len` remaining key bits.
fn len_width(max_len: usize) -> usize {
    64 - (max_len as u64).leading_zeros() as usize
}

fn build_edge(entries: &[(u64, &Cell)], remaining: usize) -> Result<Cell, CellError> {
    let label_len = common_prefix_len(entries, remaining);
    let first = entries[0].0 & mask(remaining);
    let label = if label_len == 0 { 0 } else { first >> (remaining - label_len) };

    let mut b = CellBuilder::new();
    store_label(&mut b, label, label_len, remaining)?;

    if label_len == remaining {
        b.store_slice(&entries[0].1.as_slice())?;
        return b.build();
    }

    let bit = remaining - label_len - 1;
    let split = entries.partition_point(|(k, _)| (k >> bit) & 1 == 0);
    let left = build_edge(&entries[..split], bit)?;
    let right = build_edge(&entries[split..], bit)?;
    b.store_reference(left)?.store_reference(right)?;
    b.build()
}

/// Longest common prefix of the low `remaining` bits of all keys.
fn common_prefix_len(entries: &[(u64, &Cell)], remaining: usize) -> usize {
    let first = entries[0].0 & mask(remaining);
    let mut diff = 0u64;
    for (k, _) in &entries[1..] {
        diff |= (k & mask(remaining)) ^ first;
    }
    if diff == 0 {
        return remaining;
    }
    let highest = 63 - diff.leading_zeros() as usize;
    remaining - highest - 1
}

fn store_label(b: &mut CellBuilder, label: u64, len: usize, max_len: usize) -> Result<(), CellError> {
    let w = len_width(max_len);
    let short = 2 + 2 * len;
    let long = 2 + w + len;
    let same = 3 + w;
    let all_same = len > 0 && (label == 0 || label == mask(len));

    if all_same && same < short && same < long {
        b.store_uint(0b11, 2)?
            .store_bit(label != 0)?
            .store_uint(len as u64, w)?;
    } else if short <= long {
        b.store_bit(false)?;
        for _ in 0..len {
            b.store_bit(true)?;
        }
        b.store_bit(false)?.store_uint(label, len)?;
    } else {
        b.store_uint(0b10, 2)?
            .store_uint(len as u64, w)?
            .store_uint(label, len)?;
    }
    Ok(())
}

fn load_label(slice: &mut CellSlice<'_>, max_len: usize) -> Result<(u64, usize), CellError> {
    let w = len_width(max_len);
    let (label, len) = if !slice.load_bit()? {
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        check_len(len, max_len)?;
        (slice.load_uint(len)?, len)
    } else if !slice.load_bit()? {
        let len = slice.load_uint(w)? as usize;
        check_len(len, max_len)?;
        (slice.load_uint(len)?, len)
    } else {
        let bit = slice.load_bit()?;
        let len = slice.load_uint(w)? as usize;
        check_len(len, max_len)?;
        (if bit { mask(len) } else { 0 }, len)
    };
    Ok((label, len))
}

fn check_len(len: usize, max_len: usize) -> Result<(), CellError> {
    if len > max_len {
        return Err(CellError::InvalidDict(format!(
            "label of {len} bits exceeds {max_len} remaining key bits"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value(byte: u8) -> Cell {
        let mut b = CellBuilder::new();
        b.store_u8(byte).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn empty_dict_is_single_zero_bit() {
        let dict = Dict::new(16).unwrap();
        let mut b = CellBuilder::new();
        dict.store_into(&mut b).unwrap();
        let cell = b.build().unwrap();
        assert_eq!(cell.bit_len(), 1);
        assert!(cell.references().is_empty());
    }

    #[test]
    fn single_entry_is_one_leaf() {
        let mut dict = Dict::new(16).unwrap();
        dict.set(0, value(0xAB)).unwrap();
        let root = dict.root().unwrap().unwrap();
        // hml_same$11 v=0 len=16 in 5 bits, then the value byte.
        assert_eq!(root.bit_len(), 3 + 5 + 8);
        assert!(root.references().is_empty());
        assert_eq!(root.data(), &[0b1101_0000, 0xAB]);
    }

    #[test]
    fn two_entries_fork() {
        let mut dict = Dict::new(16).unwrap();
        dict.set(0, value(1)).unwrap();
        dict.set(1, value(2)).unwrap();
        let root = dict.root().unwrap().unwrap();
        assert_eq!(root.references().len(), 2);
    }

    #[test]
    fn key_wider_than_dict_rejected() {
        let mut dict = Dict::new(8).unwrap();
        assert!(matches!(
            dict.set(256, value(0)),
            Err(CellError::InvalidDict(_))
        ));
    }

    #[test]
    fn invalid_key_width() {
        assert!(Dict::new(0).is_err());
        assert!(Dict::new(65).is_err());
    }

    #[test]
    fn load_returns_stored_values() {
        let mut dict = Dict::new(64).unwrap();
        dict.set(0, value(10)).unwrap();
        dict.set(8, value(20)).unwrap();
        dict.set(u64::MAX, value(30)).unwrap();

        let mut b = CellBuilder::new();
        dict.store_into(&mut b).unwrap();
        let cell = b.build().unwrap();

        let loaded = Dict::load(&mut cell.as_slice(), 64).unwrap();
        assert_eq!(loaded, dict);
        assert_eq!(loaded.get(8), Some(&value(20)));
    }

    #[test]
    fn label_forms_are_shortest() {
        // Short label: 1 bit out of 16 remaining -> 0 10 x = 4 bits.
        let mut b = CellBuilder::new();
        store_label(&mut b, 1, 1, 16).unwrap();
        assert_eq!(b.bit_len(), 4);

        // Long label: 10 bits of mixed values out of 16 -> 2 + 5 + 10 = 17 bits.
        let mut b = CellBuilder::new();
        store_label(&mut b, 0b10_1010_1010, 10, 16).unwrap();
        assert_eq!(b.bit_len(), 17);

        // Same label: 10 ones out of 16 -> 3 + 5 = 8 bits.
        let mut b = CellBuilder::new();
        store_label(&mut b, 0b11_1111_1111, 10, 16).unwrap();
        assert_eq!(b.bit_len(), 8);
    }

    proptest! {
        #[test]
        fn store_load_store_is_stable(keys in proptest::collection::btree_set(any::<u16>(), 1..40)) {
            let mut dict = Dict::new(16).unwrap();
            for (i, k) in keys.iter().enumerate() {
                dict.set(*k as u64, value(i as u8)).unwrap();
            }
            let root = dict.root().unwrap().unwrap();
            let loaded = Dict::from_root(&root, 16).unwrap();
            prop_assert_eq!(&loaded, &dict);
            prop_assert_eq!(loaded.root().unwrap().unwrap(), root);
        }
    }
}
