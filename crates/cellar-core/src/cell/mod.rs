//! Cell layer: the tree-of-cells data model used by every on-chain structure.
//!
//! A cell stores up to 1023 data bits and up to 4 references to other cells.
//! Cells are immutable once built and identified by their *representation
//! hash*, computed as
//!
//! ```text
//! sha256(d1 ∥ d2 ∥ padded data ∥ depth(ref_0..n) ∥ hash(ref_0..n))
//! d1 = number of references          (ordinary, level 0 cells only)
//! d2 = floor(bits / 8) + ceil(bits / 8)
//! ```
//!
//! where incomplete trailing bytes are padded with a single `1` bit followed
//! by zeros (the completion tag). Depths are 16-bit big-endian.
//!
//! # Modules
//!
//! - [`builder`] — `CellBuilder`
//! - [`slice`] — `CellSlice` sequential reader
//! - [`dict`] — `HashmapE` dictionaries
//! - [`boc`] — bag-of-cells serialization

pub mod boc;
pub mod builder;
pub mod dict;
pub mod slice;

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub use builder::CellBuilder;
pub use dict::Dict;
pub use slice::CellSlice;

use crate::constants::{MAX_CELL_BITS, MAX_CELL_REFS};
use crate::error::CellError;
use crate::types::Hash256;

/// An immutable, cheaply clonable cell.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

struct CellInner {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Cell>,
    depth: u16,
    repr_hash: Hash256,
}

impl Cell {
    /// Create an ordinary cell from raw parts.
    ///
    /// `data` must hold at least `ceil(bit_len / 8)` bytes; bits past
    /// `bit_len` are ignored.
    pub fn new(mut data: Vec<u8>, bit_len: usize, references: Vec<Cell>) -> Result<Self, CellError> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::BitsOverflow { bits: bit_len, max: MAX_CELL_BITS });
        }
        if references.len() > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow { refs: references.len(), max: MAX_CELL_REFS });
        }
        let byte_len = bit_len.div_ceil(8);
        if data.len() < byte_len {
            return Err(CellError::UnexpectedEnd);
        }
        data.truncate(byte_len);
        if bit_len % 8 != 0 {
            let keep = 0xFFu8 << (8 - bit_len % 8);
            if let Some(last) = data.last_mut() {
                *last &= keep;
            }
        }

        let depth = references
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0);
        let repr_hash = compute_repr_hash(&data, bit_len, &references);

        Ok(Self(Arc::new(CellInner {
            data,
            bit_len,
            references,
            depth,
            repr_hash,
        })))
    }

    /// A cell without data and references.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, Vec::new()).unwrap_or_else(|_| unreachable!("empty cell is valid"))
    }

    /// Data bytes (the last byte may be partially used).
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Number of data bits.
    pub fn bit_len(&self) -> usize {
        self.0.bit_len
    }

    /// Child references.
    pub fn references(&self) -> &[Cell] {
        &self.0.references
    }

    /// Child reference by index.
    pub fn reference(&self, index: usize) -> Option<&Cell> {
        self.0.references.get(index)
    }

    /// Tree depth (0 for leaf cells).
    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    /// Representation hash.
    pub fn repr_hash(&self) -> &Hash256 {
        &self.0.repr_hash
    }

    /// Whether the cell has neither data nor references.
    pub fn is_empty(&self) -> bool {
        self.0.bit_len == 0 && self.0.references.is_empty()
    }

    /// Start reading this cell from the beginning.
    pub fn as_slice(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// Data padded with the completion tag, as it enters the hash and BOC.
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        padded(&self.0.data, self.0.bit_len)
    }

    /// `d1` and `d2` descriptor bytes of an ordinary cell.
    pub(crate) fn descriptors(&self) -> [u8; 2] {
        descriptors(self.0.bit_len, self.0.references.len())
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.repr_hash() == other.repr_hash()
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr_hash().hash(state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len())
            .field("refs", &self.references().len())
            .field("hash", &self.repr_hash().to_string())
            .finish()
    }
}

fn descriptors(bit_len: usize, refs: usize) -> [u8; 2] {
    let d1 = refs as u8;
    let d2 = (bit_len / 8 + bit_len.div_ceil(8)) as u8;
    [d1, d2]
}

fn padded(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data[..bit_len.div_ceil(8)].to_vec();
    let rem = bit_len % 8;
    if rem != 0 {
        if let Some(last) = out.last_mut() {
            *last |= 1 << (7 - rem);
        }
    }
    out
}

fn compute_repr_hash(data: &[u8], bit_len: usize, references: &[Cell]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(descriptors(bit_len, references.len()));
    hasher.update(padded(data, bit_len));
    for r in references {
        hasher.update(r.depth().to_be_bytes());
    }
    for r in references {
        hasher.update(r.repr_hash().as_bytes());
    }
    Hash256(hasher.finalize().into())
}
