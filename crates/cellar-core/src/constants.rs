//! Protocol constants shared by every Cellar crate.
//!
//! All monetary values are in nano-tokens (1 token = 10^9 nano).

/// Nano-tokens per whole token.
pub const ONE_TOKEN: u128 = 1_000_000_000;

/// Maximum number of data bits in a single cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references in a single cell.
pub const MAX_CELL_REFS: usize = 4;

/// Default validity window of an external message, in seconds.
pub const DEFAULT_TTL_SECS: u32 = 60;

/// Default send mode for outgoing messages: pay fees separately, ignore errors.
pub const DEFAULT_SEND_FLAGS: u8 = 3;

/// Base workchain id.
pub const BASE_WORKCHAIN: i32 = 0;

/// Masterchain id.
pub const MASTERCHAIN: i32 = -1;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Maximum byte length of a `Grams` value (`VarUInteger 16`).
pub const MAX_GRAMS_BYTES: usize = 15;
