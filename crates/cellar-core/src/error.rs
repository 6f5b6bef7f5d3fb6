//! Error types for the Cellar core layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("cell overflow: {bits} bits > {max}")] BitsOverflow { bits: usize, max: usize },
    #[error("cell overflow: {refs} references > {max}")] RefsOverflow { refs: usize, max: usize },
    #[error("integer of {bits} bits does not fit value")] IntegerOverflow { bits: usize },
    #[error("unexpected end of cell data")] UnexpectedEnd,
    #[error("unexpected end of cell references")] NoMoreReferences,
    #[error("unsupported cell: {0}")] Unsupported(String),
    #[error("invalid tag: {0}")] InvalidTag(String),
    #[error("invalid BOC: {0}")] InvalidBoc(String),
    #[error("invalid dictionary: {0}")] InvalidDict(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing workchain separator")] MissingSeparator,
    #[error("invalid workchain: {0}")] InvalidWorkchain(String),
    #[error("invalid account id: {0}")] InvalidAccount(String),
    #[error("workchain {0} does not fit into addr_std")] WorkchainOutOfRange(i32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid secret key: {0}")] InvalidSecretKey(String),
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("function {function} expects {expected} inputs, got {got}")] InputCount { function: String, expected: usize, got: usize },
    #[error("input {name} has type {expected}, got {got}")] InputType { name: String, expected: String, got: String },
    #[error(transparent)] Cell(#[from] CellError),
    #[error(transparent)] Address(#[from] AddressError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")] Request(String),
    #[error("invalid response: {0}")] InvalidResponse(String),
    #[error("timeout")] Timeout,
}
