//! Bag-of-cells serialization.
//!
//! Layout of a serialized bag (all integers big-endian unless noted):
//!
//! ```text
//! magic       b5ee9c72
//! flags       has_idx:1 has_crc32c:1 has_cache_bits:1 0:2 size:3
//! off_bytes   u8
//! cells       size bytes
//! roots       size bytes
//! absent      size bytes
//! tot_size    off_bytes
//! root_list   roots * size bytes
//! index       cells * off_bytes      (if has_idx)
//! cell_data   tot_size bytes
//! crc32c      4 bytes, little-endian (if has_crc32c)
//! ```
//!
//! Cells are listed parents first, so every reference points forward.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::{HashMap, HashSet};

use crate::constants::MAX_CELL_REFS;
use crate::error::CellError;
use crate::types::Hash256;

use super::Cell;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// Decode a single-root bag of cells.
///
/// Bags with several roots yield the first one.
pub fn decode(bytes: &[u8]) -> Result<Cell, CellError> {
    let mut r = Reader { bytes, pos: 0 };

    if r.take(4)? != BOC_MAGIC {
        return Err(CellError::InvalidBoc("unknown magic".into()));
    }
    let flags = r.byte()?;
    let has_idx = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let size = (flags & 0x07) as usize;
    if size == 0 || size > 4 {
        return Err(CellError::InvalidBoc(format!("invalid ref size {size}")));
    }
    let off_bytes = r.byte()? as usize;
    if off_bytes == 0 || off_bytes > 8 {
        return Err(CellError::InvalidBoc(format!("invalid offset size {off_bytes}")));
    }

    if has_crc {
        if bytes.len() < 4 {
            return Err(CellError::InvalidBoc("truncated".into()));
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        if crc32c(body) != expected {
            return Err(CellError::InvalidBoc("crc32c mismatch".into()));
        }
    }

    let cell_count = r.uint(size)? as usize;
    let root_count = r.uint(size)? as usize;
    let absent = r.uint(size)?;
    let _tot_cells_size = r.uint(off_bytes)?;
    if root_count == 0 {
        return Err(CellError::InvalidBoc("no roots".into()));
    }
    if absent != 0 {
        return Err(CellError::Unsupported("absent cells".into()));
    }
    // Each cell needs at least its two descriptor bytes.
    if cell_count > r.remaining() / 2 || root_count > cell_count {
        return Err(CellError::InvalidBoc(format!(
            "{cell_count} cells do not fit into {} bytes",
            r.remaining()
        )));
    }

    let mut root_indices = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        root_indices.push(r.uint(size)? as usize);
    }
    if has_idx {
        r.take(cell_count * off_bytes)?;
    }

    struct RawCell<'a> {
        data: &'a [u8],
        bit_len: usize,
        refs: Vec<usize>,
    }

    let mut raw = Vec::with_capacity(cell_count);
    for index in 0..cell_count {
        let d1 = r.byte()?;
        let d2 = r.byte()?;
        let ref_count = (d1 & 0x07) as usize;
        if d1 & 0x08 != 0 {
            return Err(CellError::Unsupported("exotic cell".into()));
        }
        if d1 >> 5 != 0 {
            return Err(CellError::Unsupported("cell with non-zero level".into()));
        }
        if ref_count > MAX_CELL_REFS {
            return Err(CellError::InvalidBoc(format!("cell {index} has {ref_count} refs")));
        }
        if d1 & 0x10 != 0 {
            // Stored hash and depth of a level 0 cell.
            r.take(32 + 2)?;
        }

        let byte_len = (d2 as usize).div_ceil(2);
        let data = r.take(byte_len)?;
        let bit_len = if d2 % 2 == 0 {
            byte_len * 8
        } else {
            let last = data.last().copied().unwrap_or(0);
            if last == 0 {
                return Err(CellError::InvalidBoc("missing completion tag".into()));
            }
            byte_len * 8 - last.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let child = r.uint(size)? as usize;
            if child <= index || child >= cell_count {
                return Err(CellError::InvalidBoc(format!(
                    "cell {index} references cell {child}"
                )));
            }
            refs.push(child);
        }
        raw.push(RawCell { data, bit_len, refs });
    }

    let mut built: Vec<Option<Cell>> = vec![None; cell_count];
    for index in (0..cell_count).rev() {
        let cell = &raw[index];
        let references = cell
            .refs
            .iter()
            .map(|&i| built[i].clone().ok_or_else(|| CellError::InvalidBoc("dangling reference".into())))
            .collect::<Result<Vec<_>, _>>()?;
        built[index] = Some(Cell::new(cell.data.to_vec(), cell.bit_len, references)?);
    }

    let root = root_indices[0];
    built
        .get(root)
        .cloned()
        .flatten()
        .ok_or_else(|| CellError::InvalidBoc(format!("root index {root} out of range")))
}

/// Encode a single root into a bag of cells with a CRC32C trailer.
pub fn encode(root: &Cell) -> Result<Vec<u8>, CellError> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    visit(root, &mut seen, &mut order);
    order.reverse();

    let indices: HashMap<Hash256, usize> = order
        .iter()
        .enumerate()
        .map(|(i, c)| (*c.repr_hash(), i))
        .collect();

    let size = bytes_for(order.len() as u64);
    let tot_cells_size: usize = order
        .iter()
        .map(|c| 2 + c.data().len() + c.references().len() * size)
        .sum();
    let off_bytes = bytes_for(tot_cells_size as u64);

    let mut out = Vec::with_capacity(tot_cells_size + 32);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(0x40 | size as u8);
    out.push(off_bytes as u8);
    write_uint(&mut out, order.len() as u64, size);
    write_uint(&mut out, 1, size);
    write_uint(&mut out, 0, size);
    write_uint(&mut out, tot_cells_size as u64, off_bytes);
    write_uint(&mut out, 0, size);

    for cell in &order {
        out.extend_from_slice(&cell.descriptors());
        out.extend_from_slice(&cell.padded_data());
        for child in cell.references() {
            let index = indices
                .get(child.repr_hash())
                .copied()
                .ok_or_else(|| CellError::InvalidBoc("unindexed child".into()))?;
            write_uint(&mut out, index as u64, size);
        }
    }

    let crc = crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decode a base64 (standard alphabet) bag of cells.
pub fn decode_base64(s: &str) -> Result<Cell, CellError> {
    let bytes = STANDARD
        .decode(s.trim())
        .map_err(|e| CellError::InvalidBoc(e.to_string()))?;
    decode(&bytes)
}

/// Encode a cell tree as base64 (standard alphabet).
pub fn encode_base64(root: &Cell) -> Result<String, CellError> {
    Ok(STANDARD.encode(encode(root)?))
}

fn visit(cell: &Cell, seen: &mut HashSet<Hash256>, order: &mut Vec<Cell>) {
    if !seen.insert(*cell.repr_hash()) {
        return;
    }
    for child in cell.references().iter().rev() {
        visit(child, seen, order);
    }
    order.push(cell.clone());
}

fn bytes_for(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, bytes: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - bytes..]);
}

/// CRC-32C (Castagnoli), reflected, as used by the BOC trailer.
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0x82F6_3B78 & mask);
        }
    }
    !crc
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CellError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CellError::InvalidBoc("truncated".into()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, CellError> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, n: usize) -> Result<u64, CellError> {
        Ok(self
            .take(n)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}
