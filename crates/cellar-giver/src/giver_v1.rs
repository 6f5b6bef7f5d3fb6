//! Template giver: one fixed contract image, no owner key.
//!
//! Every instance shares the same state-init, so its address depends on the
//! workchain only. Calls are ABI v1 and accepted without a signature.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::info;

use cellar_core::abi::{AbiFunction, AbiParam, AbiType, AbiValue, AbiVersion, HeaderValues};
use cellar_core::address::Address;
use cellar_core::cell::Cell;
use cellar_core::error::CellError;
use cellar_core::models::StateInit;
use cellar_core::traits::Transport;
use cellar_wallet::{Giver, WalletError};

use crate::bootstrap::{self, Readiness};
use crate::config::GiverConfig;
use crate::error::GiverError;

const TVC: &str = "te6ccgECJQEABaMAAgE0BgEBAcACAgPPIAUDAQHeBAAD0CAAQdgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABAIo/wAgwAH0pCBYkvSg4YrtU1gw9KATBwEK9KQg9KEIAgPNQBAJAgHODQoCASAMCwAHDDbMIAAdPAZIbzyvCEhcHHwCl8CgAgEgDw4AASAA1T++wFkZWNvZGVfYWRkciD6QDL6QiBvECByuiFzurHy4H0hbxFu8uB9yHTPCwIibxLPCgcibxMicrqWI28TIs4ynyGBAQAi10mhz0AyICLOMuL+/AFkZWNvZGVfYWRkcjAhydAlVUFfBdswgAgEgEhEAK6T/fYCzsrovsTC2MLcxsvwTt4htmEAApaV/fYCwsa+6OTC3ObMyuWQ5Z6ARZ4UAOOegfBRnixJnixH9ATjnoDh9ATh9AUAgZ6B8EeeFj7lnoBBkkX2Af3+AsLGvujkwtzmzMrkvsrcyL4LAAgEgGhQB4P/+/QFtYWluX2V4dGVybmFsIY5Z/vwBZ2V0X3NyY19hZGRyINAg0wAycL2OGv79AWdldF9zcmNfYWRkcjBwyMnQVRFfAtsw4CBy1yExINMAMiH6QDP+/QFnZXRfc3JjX2FkZHIxISFVMV8E2zDYMSEVAfiOdf7+AWdldF9tc2dfcHVia2V5IMcCjhb+/wFnZXRfbXNnX3B1YmtleTFwMdsw4NUgxwGOF/7/AWdldF9tc2dfcHVia2V5MnAxMdsw4CCBAgDXIdcL/yL5ASIi+RDyqP7/AWdldF9tc2dfcHVia2V5MyADXwPbMNgixwKzFgHMlCLUMTPeJCIijjj++QFzdG9yZV9zaWdvACFvjCJvjCNvjO1HIW+M7UTQ9AVvjCDtV/79AXN0b3JlX3NpZ19lbmRfBdgixwGOE/78AW1zZ19pc19lbXB0eV8G2zDgItMfNCPTPzUgFwF2joDYji/+/gFtYWluX2V4dGVybmFsMiQiVXFfCPFAAf7+AW1haW5fZXh0ZXJuYWwzXwjbMOCAfPLwXwgYAf7++wFyZXBsYXlfcHJvdHBwcO1E0CD0BDI0IIEAgNdFmiDTPzIzINM/MjKWgggbd0Ay4iIluSX4I4ED6KgkoLmwjinIJAH0ACXPCz8izws/Ic8WIMntVP78AXJlcGxheV9wcm90Mn8GXwbbMOD+/AFyZXBsYXlfcHJvdDNwBV8FGQAE2zACASAcGwAPvOP3EDmG2YQCASAeHQCJuyXMvJ+ADwINM/MPAi/vwBcHVzaHBkYzd0b2M07UTQ9AHI7UdvEgH0ACHPFiDJ7VT+/QFwdXNocGRjN3RvYzQwXwLbMIAgEgIh8BCbiJACdQIAH+/v0BY29uc3RyX3Byb3RfMHBwgggbd0DtRNAg9AQyNCCBAIDXRY4UINI/MjMg0j8yMiBx10WUgHvy8N7eyCQB9AAjzws/Is8LP3HPQSHPFiDJ7VT+/QFjb25zdHJfcHJvdF8xXwX4ADDwIf78AXB1c2hwZGM3dG9jNO1E0PQByCEARO1HbxIB9AAhzxYgye1U/v0BcHVzaHBkYzd0b2M0MF8C2zAB4tz+/QFtYWluX2ludGVybmFsIY5Z/vwBZ2V0X3NyY19hZGRyINAg0wAycL2OGv79AWdldF9zcmNfYWRkcjBwyMnQVRFfAtsw4CBy1yExINMAMiH6QDP+/QFnZXRfc3JjX2FkZHIxISFVMV8E2zDYJCFwIwHqjjj++QFzdG9yZV9zaWdvACFvjCJvjCNvjO1HIW+M7UTQ9AVvjCDtV/79AXN0b3JlX3NpZ19lbmRfBdgixwCOHCFwuo4SIoIQXH7iB1VRXwbxQAFfBtsw4F8G2zDg/v4BbWFpbl9pbnRlcm5hbDEi0x80InG6JAA2niCAI1VhXwfxQAFfB9sw4CMhVWFfB/FAAV8H";

static CONSTRUCTOR: AbiFunction = AbiFunction {
    name: "constructor",
    version: AbiVersion::V1,
    headers: &[],
    inputs: &[],
    outputs: &[],
};

static SEND_GRAMS: AbiFunction = AbiFunction {
    name: "sendGrams",
    version: AbiVersion::V1,
    headers: &[],
    inputs: &[
        AbiParam::new("dest", AbiType::Address),
        AbiParam::new("amount", AbiType::Uint(64)),
    ],
    outputs: &[],
};

/// Handle to the template giver.
pub struct GiverV1 {
    transport: Arc<dyn Transport>,
    address: Address,
}

impl GiverV1 {
    /// The shared contract image.
    pub fn state_init() -> Result<StateInit, CellError> {
        static CACHE: OnceLock<Cell> = OnceLock::new();
        bootstrap::cached_state_init(&CACHE, TVC)
    }

    pub fn compute_address(workchain: i32) -> Result<Address, CellError> {
        Self::state_init()?.compute_address(workchain)
    }

    pub fn new(transport: Arc<dyn Transport>, workchain: i32) -> Result<Self, GiverError> {
        Ok(Self {
            transport,
            address: Self::compute_address(workchain)?,
        })
    }

    pub fn from_address(transport: Arc<dyn Transport>, address: Address) -> Self {
        Self { transport, address }
    }

    /// Fund (through `other_giver` when needed) and deploy the giver in
    /// `config.workchain`.
    pub async fn deploy(
        transport: Arc<dyn Transport>,
        config: &GiverConfig,
        other_giver: Option<&dyn Giver>,
    ) -> Result<Self, GiverError> {
        let state_init = Self::state_init()?;
        let address = state_init.compute_address(config.workchain)?;

        if bootstrap::prepare_account(transport.as_ref(), &address, config, other_giver).await?
            == Readiness::Active
        {
            return Ok(Self::from_address(transport, address));
        }

        let call = CONSTRUCTOR.encode_external(&address, &HeaderValues::default(), &[])?;
        let body = call.without_signature()?;
        let message = bootstrap::external_message(address, call, body, None, Some(state_init));
        let tx = bootstrap::send_and_settle(transport.as_ref(), &message).await?;
        info!(giver = %address, tx = %tx.hash, "GiverV1 deployed");

        Ok(Self::from_address(transport, address))
    }
}

#[async_trait]
impl Giver for GiverV1 {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn give(&self, target: &Address, amount: u128) -> Result<(), WalletError> {
        let call = SEND_GRAMS.encode_external(
            &self.address,
            &HeaderValues::default(),
            &[AbiValue::Address(*target), AbiValue::Uint(amount)],
        )?;
        let body = call.without_signature()?;
        let message = bootstrap::external_message(self.address, call, body, None, None);

        let tx = self
            .transport
            .send_external_message(&message)
            .await?
            .ok_or(WalletError::MessageExpired)?;
        self.transport.trace_transaction(&tx).await?;
        info!(giver = %self.address, to = %target, amount, "GiverV1 sent funds");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_vector() {
        assert_eq!(
            GiverV1::compute_address(0).unwrap().to_string(),
            "0:841288ed3b55d9cdafa806807f02a0ae0c169aa5edfe88a789a6482429756a94"
        );
    }

    #[test]
    fn address_follows_workchain() {
        let base = GiverV1::compute_address(0).unwrap();
        let master = GiverV1::compute_address(-1).unwrap();
        assert_eq!(base.account(), master.account());
        assert_eq!(master.workchain(), -1);
    }

    #[test]
    fn send_grams_body_is_unsigned() {
        let address = GiverV1::compute_address(0).unwrap();
        let call = SEND_GRAMS
            .encode_external(
                &address,
                &HeaderValues::default(),
                &[AbiValue::Address(address), AbiValue::Uint(5)],
            )
            .unwrap();
        assert_eq!(call.expire_at, u32::MAX);

        let body = call.without_signature().unwrap();
        let mut s = body.as_slice();
        assert!(!s.load_bit().unwrap());
        assert_eq!(s.load_u32().unwrap(), SEND_GRAMS.input_id());
        assert_eq!(s.load_address().unwrap(), address);
        assert_eq!(s.load_u64().unwrap(), 5);
    }

    #[test]
    fn amount_must_fit_uint64() {
        let address = GiverV1::compute_address(0).unwrap();
        assert!(
            SEND_GRAMS
                .encode_external(
                    &address,
                    &HeaderValues::default(),
                    &[AbiValue::Address(address), AbiValue::Uint(u128::from(u64::MAX) + 1)],
                )
                .is_err()
        );
    }
}
