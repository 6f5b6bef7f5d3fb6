//! Keyed giver: the owner's public key is written into the contract's init
//! data, so every owner gets a distinct address.
//!
//! Init data is the compiler's `HashmapE 64` of static variables; key 0
//! holds the owner key. Calls are ABI 2.0 with `time` and `expire` headers
//! and must be signed by the owner.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::info;

use cellar_core::abi::{AbiFunction, AbiHeader, AbiParam, AbiType, AbiValue, AbiVersion, HeaderValues};
use cellar_core::address::Address;
use cellar_core::cell::{Cell, CellBuilder};
use cellar_core::crypto::PublicKey;
use cellar_core::error::CellError;
use cellar_core::models::{SignedExternalMessage, StateInit};
use cellar_core::traits::{Signer, Transport};
use cellar_wallet::{Giver, WalletError};

use crate::bootstrap::{self, Readiness};
use crate::config::GiverConfig;
use crate::error::GiverError;

const TVC: &str = "te6ccgECIAEAA6YAAgE0BgEBAcACAgPPIAUDAQHeBAAD0CAAQdgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABAIm/wD0pCAiwAGS9KDhiu1TWDD0oQkHAQr0pCD0oQgAAAIBIA0KAQL/CwH+fyHtRNAg10nCAZ/T/9MA9AX4an/4Yfhm+GKOG/QFbfhqcAGAQPQO8r3XC//4YnD4Y3D4Zn/4YeLTAAGOEoECANcYIPkBWPhCIPhl+RDyqN4j+EUgbpIwcN74Qrry4GUh0z/THzQg+CO88rki+QAg+EqBAQD0DiCRMd7y0Gb4AAwANiD4SiPIyz9ZgQEA9EP4al8E0x8B8AH4R27yfAIBIBQOAgFYEg8BCbjomPxQEAHW+EFujhLtRNDT/9MA9AX4an/4Yfhm+GLe0XBtbwL4SoEBAPSGlQHXCz9/k3BwcOKRII4yXzPIIs8L/yHPCz8xMQFvIiGkA1mAIPRDbwI0IvhKgQEA9HyVAdcLP3+TcHBw4gI1MzHoXwMhwP8RAJiOLiPQ0wH6QDAxyM+HIM6NBAAAAAAAAAAAAAAAAA90TH4ozxYhbyICyx/0AMlx+wDeMMD/jhL4QsjL//hGzwsA+EoB9ADJ7VTef/hnAQm5Fqvn8BMAtvhBbo427UTQINdJwgGf0//TAPQF+Gp/+GH4Zvhijhv0BW34anABgED0DvK91wv/+GJw+GNw+GZ/+GHi3vhG8nNx+GbR+AD4QsjL//hGzwsA+EoB9ADJ7VR/+GcCASAYFQEJuxXvk1gWAbb4QW6OEu1E0NP/0wD0Bfhqf/hh+Gb4Yt76QNcNf5XU0dDTf9/XDACV1NHQ0gDf0VRxIMjPhYDKAHPPQM4B+gKAa89AyXP7APhKgQEA9IaVAdcLP3+TcHBw4pEgFwCEjigh+CO7myL4SoEBAPRbMPhq3iL4SoEBAPR8lQHXCz9/k3BwcOICNTMx6F8G+ELIy//4Rs8LAPhKAfQAye1Uf/hnAgEgGxkBCbjkYYdQGgC++EFujhLtRNDT/9MA9AX4an/4Yfhm+GLe1NH4RSBukjBw3vhCuvLgZfgA+ELIy//4Rs8LAPhKAfQAye1U+A8g+wQg0O0e7VPwAjD4QsjL//hGzwsA+EoB9ADJ7VR/+GcCAtoeHAEBSB0ALPhCyMv/+EbPCwD4SgH0AMntVPgP8gABAUgfAFhwItDWAjHSADDcIccA3CHXDR/yvFMR3cEEIoIQ/////byx8nwB8AH4R27yfA==";

/// Width of the static-variable dictionary keys.
const INIT_DATA_KEY_BITS: usize = 64;
const PUBKEY_KEY: u64 = 0;

const HEADERS: &[AbiHeader] = &[AbiHeader::Time, AbiHeader::Expire];

static CONSTRUCTOR: AbiFunction = AbiFunction {
    name: "constructor",
    version: AbiVersion::V2_0,
    headers: HEADERS,
    inputs: &[],
    outputs: &[],
};

static SEND_TRANSACTION: AbiFunction = AbiFunction {
    name: "sendTransaction",
    version: AbiVersion::V2_0,
    headers: HEADERS,
    inputs: &[
        AbiParam::new("dest", AbiType::Address),
        AbiParam::new("value", AbiType::Uint(128)),
        AbiParam::new("bounce", AbiType::Bool),
    ],
    outputs: &[],
};

/// Handle to a giver owned by `signer`.
pub struct GiverV2 {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
    address: Address,
    ttl_secs: u32,
}

impl GiverV2 {
    fn template() -> Result<StateInit, CellError> {
        static CACHE: OnceLock<Cell> = OnceLock::new();
        bootstrap::cached_state_init(&CACHE, TVC)
    }

    /// Contract code shared by every owner.
    pub fn code() -> Result<Cell, CellError> {
        Ok(Self::template()?.code)
    }

    /// Contract image with `public_key` written into the init data.
    pub fn compute_state_init(public_key: &PublicKey) -> Result<StateInit, CellError> {
        let mut state_init = Self::template()?;
        let mut vars = state_init.data_dict(INIT_DATA_KEY_BITS)?;

        let mut key = CellBuilder::new();
        key.store_public_key(public_key)?;
        vars.set(PUBKEY_KEY, key.build()?)?;

        let mut data = CellBuilder::new();
        vars.store_into(&mut data)?;
        state_init.data = data.build()?;
        Ok(state_init)
    }

    pub fn compute_address(public_key: &PublicKey, workchain: i32) -> Result<Address, CellError> {
        Self::compute_state_init(public_key)?.compute_address(workchain)
    }

    pub fn new(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        config: &GiverConfig,
    ) -> Result<Self, GiverError> {
        let address = Self::compute_address(&signer.public_key(), config.workchain)?;
        Ok(Self::from_address(transport, signer, address, config))
    }

    pub fn from_address(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        address: Address,
        config: &GiverConfig,
    ) -> Self {
        Self {
            transport,
            signer,
            address,
            ttl_secs: config.ttl_secs,
        }
    }

    /// Fund (through `other_giver` when needed) and deploy the giver owned
    /// by `signer` in `config.workchain`.
    pub async fn deploy(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        config: &GiverConfig,
        other_giver: Option<&dyn Giver>,
    ) -> Result<Self, GiverError> {
        let state_init = Self::compute_state_init(&signer.public_key())?;
        let address = state_init.compute_address(config.workchain)?;
        let giver = Self::from_address(transport, signer, address, config);

        if bootstrap::prepare_account(giver.transport.as_ref(), &address, config, other_giver)
            .await?
            == Readiness::Active
        {
            return Ok(giver);
        }

        let message = giver.signed_call(&CONSTRUCTOR, &[], Some(state_init)).await?;
        let tx = bootstrap::send_and_settle(giver.transport.as_ref(), &message).await?;
        info!(giver = %address, tx = %tx.hash, "GiverV2 deployed");

        Ok(giver)
    }

    async fn signed_call(
        &self,
        function: &AbiFunction,
        inputs: &[AbiValue],
        state_init: Option<StateInit>,
    ) -> Result<SignedExternalMessage, WalletError> {
        let signature_id = self.transport.get_signature_id().await?;
        let clock = self.transport.clock();
        let header = HeaderValues {
            pubkey: None,
            time_ms: clock.now_ms(),
            expire_at: clock.now_sec().saturating_add(self.ttl_secs),
        };

        let call = function.encode_external(&self.address, &header, inputs)?;
        let signature = self.signer.sign(call.hash.as_bytes(), signature_id);
        let body = call.with_signature(&signature, &self.signer.public_key())?;
        Ok(bootstrap::external_message(
            self.address,
            call,
            body,
            Some(signature),
            state_init,
        ))
    }
}

#[async_trait]
impl Giver for GiverV2 {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn give(&self, target: &Address, amount: u128) -> Result<(), WalletError> {
        let inputs = [
            AbiValue::Address(*target),
            AbiValue::Uint(amount),
            AbiValue::Bool(false),
        ];
        let message = self.signed_call(&SEND_TRANSACTION, &inputs, None).await?;

        let tx = self
            .transport
            .send_external_message(&message)
            .await?
            .ok_or(WalletError::MessageExpired)?;
        self.transport.trace_transaction(&tx).await?;
        info!(giver = %self.address, to = %target, amount, "GiverV2 sent funds");
        Ok(())
    }
}
