//! High-level wallet handle.
//!
//! A [`Wallet`] ties one key pair to one contract version and turns plain
//! transfer requests into signed external messages. Every send re-resolves
//! the deployment state right before composing the envelope, so counters
//! are never advanced locally.

use std::sync::Arc;

use tracing::{debug, info};

use cellar_core::address::Address;
use cellar_core::crypto::PublicKey;
use cellar_core::models::{AccountState, InternalMessage, SignedExternalMessage, Transaction};
use cellar_core::traits::{Signer, Transport};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::protocol::{Counters, EnvelopeContext, OutgoingMessage, WalletProtocol};
use crate::tracker::DeploymentStateTracker;

/// A wallet of contract version `P` owned by `signer`.
pub struct Wallet<P: WalletProtocol> {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
    protocol: P,
    address: Address,
    tracker: DeploymentStateTracker,
    config: WalletConfig,
}

impl<P: WalletProtocol> Wallet<P> {
    /// Handle for the wallet derived from the signer's public key. The
    /// account may not exist yet; the first send deploys it.
    pub fn new(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        protocol: P,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let state_init = protocol.compute_state_init(&signer.public_key())?;
        let address = state_init.compute_address(config.workchain)?;
        let tracker = DeploymentStateTracker::new(
            state_init,
            protocol.counter_kind(),
            protocol.initial_counters(),
        );
        debug!(wallet = %address, version = protocol.name(), "wallet handle created");
        Ok(Self {
            transport,
            signer,
            protocol,
            address,
            tracker,
            config,
        })
    }

    /// Handle for a wallet already deployed at `address`. State-init is
    /// never attached. Counters are still read from the account: the seqno
    /// before each send, static ones before the first.
    pub fn from_address(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        protocol: P,
        address: Address,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let state_init = protocol.compute_state_init(&signer.public_key())?;
        let tracker = DeploymentStateTracker::deployed(
            state_init,
            protocol.counter_kind(),
            protocol.initial_counters(),
        );
        Ok(Self {
            transport,
            signer,
            protocol,
            address,
            tracker,
            config,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Move the local handle to another workchain. The account id is kept.
    pub fn set_workchain(&mut self, workchain: i32) {
        self.address.set_workchain(workchain);
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn is_deployed(&self) -> bool {
        self.tracker.is_deployed()
    }

    /// Last counters observed on-chain (or the initial ones).
    pub fn counters(&self) -> Counters {
        self.tracker.counters()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn get_account_state(&self) -> Result<Option<AccountState>, WalletError> {
        Ok(self.transport.get_account_state(&self.address).await?)
    }

    /// Balance in nano-tokens. Zero for a missing account.
    pub async fn get_balance(&self) -> Result<u128, WalletError> {
        Ok(self
            .get_account_state()
            .await?
            .map(|state| state.balance)
            .unwrap_or_default())
    }

    /// Compose and sign an envelope carrying `messages` without sending it.
    ///
    /// `ttl` overrides the configured validity window, in seconds.
    pub async fn prepare_raw(
        &self,
        messages: &[OutgoingMessage],
        ttl: Option<u32>,
    ) -> Result<SignedExternalMessage, WalletError> {
        self.protocol.check_batch(messages)?;

        let resolved = self
            .tracker
            .resolve(self.transport.as_ref(), &self.address, &self.protocol)
            .await?;
        let signature_id = self.transport.get_signature_id().await?;

        let clock = self.transport.clock();
        let time_ms = clock.now_ms();
        let expire_at = self.config.expire_at(clock.now_sec(), ttl);

        let ctx = EnvelopeContext {
            address: self.address,
            time_ms,
            expire_at,
            signature_id,
            counters: resolved.counters,
            state_init: resolved.state_init,
        };
        self.protocol
            .build_envelope(ctx, messages, self.signer.as_ref())
    }

    /// Compose, sign and broadcast an envelope, waiting for the transaction
    /// it produces.
    pub async fn send_raw(
        &self,
        messages: &[OutgoingMessage],
        ttl: Option<u32>,
    ) -> Result<Transaction, WalletError> {
        let envelope = self.prepare_raw(messages, ttl).await?;
        let deploying = envelope.state_init.is_some();
        let tx = self
            .transport
            .send_external_message(&envelope)
            .await?
            .ok_or(WalletError::MessageExpired)?;
        info!(
            wallet = %self.address,
            tx = %tx.hash,
            messages = messages.len(),
            deploying,
            "envelope included"
        );
        Ok(tx)
    }

    /// Send a single message with the configured default flags.
    pub async fn send(
        &self,
        message: InternalMessage,
        ttl: Option<u32>,
    ) -> Result<Transaction, WalletError> {
        let outgoing = OutgoingMessage::new(message, self.config.default_flags);
        self.send_raw(std::slice::from_ref(&outgoing), ttl).await
    }
}

impl<P: WalletProtocol + std::fmt::Debug> std::fmt::Debug for Wallet<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("tracker", &self.tracker)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
