//! End-to-end test suite for Cellar.
//!
//! Wallets and givers are driven against [`helpers::TestTransport`], an
//! in-memory ledger that records every submitted message and activates
//! accounts when a matching state-init arrives.

pub mod helpers;
