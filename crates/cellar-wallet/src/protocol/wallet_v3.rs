//! Version B: WalletV3 (revision 2).
//!
//! Data: `seqno:uint32 wallet_id:uint32 pubkey:bits256`.
//!
//! ```text
//! payload = wallet_id:uint32 expire_at:uint32 seqno:uint32 (mode:uint8 ^Message)*
//! body    = signature:bits512 payload
//! ```

use std::sync::OnceLock;

use cellar_core::cell::{Cell, CellBuilder};
use cellar_core::crypto::PublicKey;
use cellar_core::error::CellError;
use cellar_core::models::SignedExternalMessage;
use cellar_core::traits::Signer;
use tracing::debug;

use super::{CounterKind, Counters, EnvelopeContext, OutgoingMessage, WalletProtocol, cached_code};
use crate::error::WalletError;

const CODE: &str = "te6ccgEBAQEAcQAA3v8AIN0gggFMl7ohggEznLqxn3Gw7UTQ0x/THzHXC//jBOCk8mCDCNcYINMf0x/TH/gjE7vyY+1E0NMf0x/T/9FRMrryoVFEuvKiBPkBVBBV+RDyo/gAkyDXSpbTB9QC+wDo0QGkyMsfyx/L/8ntVA==";

/// Subwallet id used when none is given.
pub const DEFAULT_WALLET_ID: u32 = 0x4BA9_2D8A;

/// WalletV3 contract with a fixed subwallet id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletV3 {
    pub wallet_id: u32,
}

impl WalletV3 {
    pub fn new(wallet_id: u32) -> Self {
        Self { wallet_id }
    }
}

impl Default for WalletV3 {
    fn default() -> Self {
        Self::new(DEFAULT_WALLET_ID)
    }
}

impl WalletProtocol for WalletV3 {
    fn name(&self) -> &'static str {
        "WalletV3"
    }

    fn max_messages(&self) -> usize {
        4
    }

    fn counter_kind(&self) -> CounterKind {
        CounterKind::Seqno
    }

    fn code(&self) -> Result<Cell, CellError> {
        static CACHE: OnceLock<Cell> = OnceLock::new();
        cached_code(&CACHE, CODE)
    }

    fn compute_init_data(&self, public_key: &PublicKey) -> Result<Cell, CellError> {
        let mut b = CellBuilder::new();
        b.store_u32(0)?
            .store_u32(self.wallet_id)?
            .store_public_key(public_key)?;
        b.build()
    }

    fn initial_counters(&self) -> Counters {
        Counters {
            seqno: 0,
            wallet_id: self.wallet_id,
        }
    }

    fn parse_counters(&self, data: &Cell) -> Result<Counters, CellError> {
        let mut s = data.as_slice();
        let seqno = s.load_u32()?;
        let wallet_id = s.load_u32()?;
        Ok(Counters { seqno, wallet_id })
    }

    fn build_envelope(
        &self,
        ctx: EnvelopeContext,
        messages: &[OutgoingMessage],
        signer: &dyn Signer,
    ) -> Result<SignedExternalMessage, WalletError> {
        self.check_batch(messages)?;

        let mut payload = CellBuilder::new();
        payload
            .store_u32(ctx.counters.wallet_id)?
            .store_u32(ctx.expire_at)?
            .store_u32(ctx.counters.seqno)?;
        for outgoing in messages {
            payload
                .store_u8(outgoing.flags)?
                .store_reference(outgoing.message.build_cell()?)?;
        }
        let payload = payload.build()?;

        let signature = signer.sign(payload.repr_hash().as_bytes(), ctx.signature_id);
        let mut body = CellBuilder::new();
        body.store_signature(&signature)?
            .store_slice(&payload.as_slice())?;
        let body = body.build()?;

        debug!(
            wallet = %ctx.address,
            seqno = ctx.counters.seqno,
            messages = messages.len(),
            expire_at = ctx.expire_at,
            "composed WalletV3 envelope"
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

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_core::address::Address;
    use cellar_core::crypto::KeyPair;
    use cellar_core::models::InternalMessage;
    use cellar_core::types::Hash256;

    fn ctx(counters: Counters) -> EnvelopeContext {
        EnvelopeContext {
            address: Address::new(0, Hash256([1; 32])),
            time_ms: 0,
            expire_at: 1_000_060,
            signature_id: Some(7),
            counters,
            state_init: None,
        }
    }

    fn transfer() -> OutgoingMessage {
        InternalMessage::transfer(Address::new(0, Hash256([2; 32])), 10, false).into()
    }

    #[test]
    fn code_hash() {
        assert_eq!(
            WalletV3::default().code().unwrap().repr_hash().to_string(),
            "84dafa449f98a6987789ba232358072bc0f76dc4524002a5d0918b9a75d2d599"
        );
    }

    #[test]
    fn address_vector() {
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        assert_eq!(
            WalletV3::default().compute_address(&pk, 0).unwrap().to_string(),
            "0:1f70cbdc2f58a3917b3405f077cc663198ab914b19d053db8fd609fac98d98a7"
        );
    }

    #[test]
    fn wallet_id_changes_address() {
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        assert_ne!(
            WalletV3::new(1).compute_address(&pk, 0).unwrap(),
            WalletV3::default().compute_address(&pk, 0).unwrap()
        );
    }

    #[test]
    fn payload_prefix_and_refs() {
        let kp = KeyPair::from_secret_bytes([7; 32]);
        let counters = Counters { seqno: 17, wallet_id: DEFAULT_WALLET_ID };
        let env = WalletV3::default()
            .build_envelope(ctx(counters), &[transfer(), transfer()], &kp)
            .unwrap();

        let mut p = env.payload.as_slice();
        assert_eq!(p.load_u32().unwrap(), DEFAULT_WALLET_ID);
        assert_eq!(p.load_u32().unwrap(), 1_000_060);
        assert_eq!(p.load_u32().unwrap(), 17);
        assert_eq!(p.load_u8().unwrap(), 3);
        assert_eq!(p.load_u8().unwrap(), 3);
        assert_eq!(env.payload.references().len(), 2);
        assert_eq!(
            env.payload.reference(0).unwrap(),
            &transfer().message.build_cell().unwrap()
        );
    }

    #[test]
    fn signature_covers_payload_hash_with_id() {
        let kp = KeyPair::from_secret_bytes([7; 32]);
        let env = WalletV3::default()
            .build_envelope(ctx(Counters::default()), &[transfer()], &kp)
            .unwrap();

        let mut b = env.body.as_slice();
        let sig = b.load_signature().unwrap();
        assert_eq!(b.to_cell().unwrap(), env.payload);
        assert!(kp
            .public_key()
            .verify(env.payload.repr_hash().as_bytes(), &sig, Some(7))
            .is_ok());
    }

    #[test]
    fn empty_batch_is_allowed() {
        let kp = KeyPair::generate();
        let env = WalletV3::default()
            .build_envelope(ctx(Counters::default()), &[], &kp)
            .unwrap();
        assert_eq!(env.payload.bit_len(), 96);
    }

    #[test]
    fn counters_parse_from_init_data() {
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        let v3 = WalletV3::new(0xABCD);
        let data = v3.compute_init_data(&pk).unwrap();
        assert_eq!(
            v3.parse_counters(&data).unwrap(),
            Counters { seqno: 0, wallet_id: 0xABCD }
        );
    }
}
