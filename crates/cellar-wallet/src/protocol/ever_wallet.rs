//! Version A: EverWallet.
//!
//! Data: `pubkey:bits256 timestamp:uint64`. Messages go through the ABI 2.3
//! `sendTransaction` function, one per envelope, protected against replay by
//! the `time`/`expire` headers rather than an on-chain counter.

use std::sync::OnceLock;

use cellar_core::abi::{AbiFunction, AbiHeader, AbiParam, AbiType, AbiValue, AbiVersion, HeaderValues};
use cellar_core::cell::{Cell, CellBuilder};
use cellar_core::crypto::PublicKey;
use cellar_core::error::CellError;
use cellar_core::models::SignedExternalMessage;
use cellar_core::traits::Signer;
use tracing::debug;

use super::{CounterKind, Counters, EnvelopeContext, OutgoingMessage, WalletProtocol, cached_code};
use crate::error::WalletError;

const CODE: &str = "te6cckEBBgEA/AABFP8A9KQT9LzyyAsBAgEgAgMABNIwAubycdcBAcAA8nqDCNcY7UTQgwfXAdcLP8j4KM8WI88WyfkAA3HXAQHDAJqDB9cBURO68uBk3oBA1wGAINcBgCDXAVQWdfkQ8qj4I7vyeWa++COBBwiggQPoqFIgvLHydAIgghBM7mRsuuMPAcjL/8s/ye1UBAUAmDAC10zQ+kCDBtcBcdcBeNcB10z4AHCAEASqAhSxyMsFUAXPFlAD+gLLaSLQIc8xIddJoIQJuZgzcAHLAFjPFpcwcQHLABLM4skB+wAAPoIQFp4+EbqOEfgAApMg10qXeNcB1AL7AOjRkzLyPOI+zYS/";

static SEND_TRANSACTION: AbiFunction = AbiFunction {
    name: "sendTransaction",
    version: AbiVersion::V2_3,
    headers: &[AbiHeader::PubKey, AbiHeader::Time, AbiHeader::Expire],
    inputs: &[
        AbiParam::new("dest", AbiType::Address),
        AbiParam::new("value", AbiType::Uint(128)),
        AbiParam::new("bounce", AbiType::Bool),
        AbiParam::new("flags", AbiType::Uint(8)),
        AbiParam::new("payload", AbiType::Cell),
    ],
    outputs: &[],
};

/// EverWallet contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EverWallet;

impl WalletProtocol for EverWallet {
    fn name(&self) -> &'static str {
        "EverWallet"
    }

    fn max_messages(&self) -> usize {
        1
    }

    fn counter_kind(&self) -> CounterKind {
        CounterKind::None
    }

    fn code(&self) -> Result<Cell, CellError> {
        static CACHE: OnceLock<Cell> = OnceLock::new();
        cached_code(&CACHE, CODE)
    }

    fn compute_init_data(&self, public_key: &PublicKey) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_public_key(public_key)?.store_u64(0)?;
        b.build()
    }

    fn initial_counters(&self) -> Counters {
        Counters::default()
    }

    fn parse_counters(&self, data: &Cell) -> Result<Counters, CellError> {
        // Only validates the layout; nothing is forwarded.
        let mut s = data.as_slice();
        s.skip_bits(256)?;
        s.load_u64()?;
        Ok(Counters::default())
    }

    fn build_envelope(
        &self,
        ctx: EnvelopeContext,
        messages: &[OutgoingMessage],
        signer: &dyn Signer,
    ) -> Result<SignedExternalMessage, WalletError> {
        self.check_batch(messages)?;
        let [outgoing] = messages else {
            return Err(WalletError::Unsupported(
                "EverWallet sends exactly one message per envelope".into(),
            ));
        };
        let msg = &outgoing.message;
        if msg.state_init.is_some() {
            return Err(WalletError::Unsupported(
                "EverWallet cannot attach a state-init to an outgoing message".into(),
            ));
        }

        let pubkey = signer.public_key();
        let header = HeaderValues {
            pubkey: Some(pubkey),
            time_ms: ctx.time_ms,
            expire_at: ctx.expire_at,
        };
        let inputs = [
            AbiValue::Address(msg.dst),
            AbiValue::Uint(msg.value),
            AbiValue::Bool(msg.bounce),
            AbiValue::Uint(outgoing.flags as u128),
            AbiValue::Cell(msg.body.clone().unwrap_or_default()),
        ];
        let call = SEND_TRANSACTION.encode_external(&ctx.address, &header, &inputs)?;
        let signature = signer.sign(call.hash.as_bytes(), ctx.signature_id);
        let body = call.with_signature(&signature, &pubkey)?;

        debug!(
            wallet = %ctx.address,
            dst = %msg.dst,
            value = msg.value,
            expire_at = ctx.expire_at,
            "composed EverWallet envelope"
        );

        Ok(SignedExternalMessage {
            dst: ctx.address,
            expire_at: ctx.expire_at,
            signature: Some(signature),
            payload: call.payload,
            body,
            state_init: ctx.state_init,
        })
    }
}
