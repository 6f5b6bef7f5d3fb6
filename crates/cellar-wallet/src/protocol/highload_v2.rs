//! Version C: HighloadWalletV2.
//!
//! Data: `wallet_id:uint32 last_cleaned:uint64 pubkey:bits256 old_queries:(HashmapE 64 ..)`.
//!
//! Messages are keyed `0..N` in a `HashmapE 16 (mode:uint8 ^Message)`. The
//! query id that protects against replay is derived from the batch itself:
//!
//! ```text
//! dict    = HashmapE 16 serialized into its own cell
//! payload = wallet_id:uint32 expire_at:uint32 query:uint32 dict
//! query   = bytes 28..32 of repr_hash(dict)
//! body    = signature:bits512 payload
//! ```

use std::sync::OnceLock;

use cellar_core::cell::{Cell, CellBuilder, Dict};
use cellar_core::crypto::PublicKey;
use cellar_core::error::CellError;
use cellar_core::models::SignedExternalMessage;
use cellar_core::traits::Signer;
use tracing::debug;

use super::{CounterKind, Counters, EnvelopeContext, OutgoingMessage, WalletProtocol, cached_code};
use crate::error::WalletError;

const CODE: &str = "te6ccgEBCQEA5QABFP8A9KQT9LzyyAsBAgEgBAIB6vKDCNcYINMf0z/4I6ofUyC58mPtRNDTH9M/0//0BNFTYIBA9A5voTHyYFFzuvKiB/kBVBCH+RDyowL0BNH4AH+OFiGAEPR4b6UgmALTB9QwAfsAkTLiAbPmW4MlochANIBA9EOK5jHIEssfE8s/y//0AMntVAMANCCAQPSWb6UyURCUMFMDud4gkzM2AZIyMOKzAgFICAUCASAHBgBBvl+XaiaGmPmOmf6f+Y+gJoqRBAIHoHN9CYyS2/yV3R8UABe9nOdqJoaa+Y64X/wABNAw";

/// Subwallet id used when none is given.
pub const DEFAULT_WALLET_ID: u32 = 0;

const MESSAGES_KEY_BITS: usize = 16;

/// HighloadWalletV2 contract with a fixed subwallet id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighloadWalletV2 {
    pub wallet_id: u32,
}

impl HighloadWalletV2 {
    pub fn new(wallet_id: u32) -> Self {
        Self { wallet_id }
    }

    /// Serialize the batch as a `HashmapE 16` cell.
    pub fn messages_dict(messages: &[OutgoingMessage]) -> Result<Cell, CellError> {
        let mut dict = Dict::new(MESSAGES_KEY_BITS)?;
        for (i, outgoing) in messages.iter().enumerate() {
            let mut value = CellBuilder::new();
            value
                .store_u8(outgoing.flags)?
                .store_reference(outgoing.message.build_cell()?)?;
            dict.set(i as u64, value.build()?)?;
        }
        let mut b = CellBuilder::new();
        dict.store_into(&mut b)?;
        b.build()
    }
}

impl WalletProtocol for HighloadWalletV2 {
    fn name(&self) -> &'static str {
        "HighloadWalletV2"
    }

    fn max_messages(&self) -> usize {
        255
    }

    fn counter_kind(&self) -> CounterKind {
        CounterKind::Static
    }

    fn code(&self) -> Result<Cell, CellError> {
        static CACHE: OnceLock<Cell> = OnceLock::new();
        cached_code(&CACHE, CODE)
    }

    fn compute_init_data(&self, public_key: &PublicKey) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_u32(self.wallet_id)?
            .store_u64(0)?
            .store_public_key(public_key)?
            .store_bit(false)?;
        b.build()
    }

    fn initial_counters(&self) -> Counters {
        Counters {
            seqno: 0,
            wallet_id: self.wallet_id,
        }
    }

    fn parse_counters(&self, data: &Cell) -> Result<Counters, CellError> {
        let wallet_id = data.as_slice().load_u32()?;
        Ok(Counters { seqno: 0, wallet_id })
    }

    fn build_envelope(
        &self,
        ctx: EnvelopeContext,
        messages: &[OutgoingMessage],
        signer: &dyn Signer,
    ) -> Result<SignedExternalMessage, WalletError> {
        self.check_batch(messages)?;

        let dict = Self::messages_dict(messages)?;
        let query = dict.repr_hash().tail_u32();

        let mut payload = CellBuilder::new();
        payload
            .store_u32(ctx.counters.wallet_id)?
            .store_u32(ctx.expire_at)?
            .store_u32(query)?
            .store_slice(&dict.as_slice())?;
        let payload = payload.build()?;

        let signature = signer.sign(payload.repr_hash().as_bytes(), ctx.signature_id);
        let mut body = CellBuilder::new();
        body.store_signature(&signature)?
            .store_slice(&payload.as_slice())?;
        let body = body.build()?;

        debug!(
            wallet = %ctx.address,
            query,
            messages = messages.len(),
            expire_at = ctx.expire_at,
            "composed HighloadWalletV2 envelope"
        );

        Ok(SignedExternalMessage {
            dst: ctx.address,
            expire_at: ctx.expire_at,
            signature: Some(signature),
            payload,
            body,
            state_init: ctx.state_init,
        })
    }
}
