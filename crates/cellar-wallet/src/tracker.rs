//! Deployment state of one wallet handle.
//!
//! ```text
//! NotDeployed ──(Active observed)──▶ Deployed
//! ```
//!
//! While `NotDeployed`, every envelope carries the wallet's own state-init.
//! Observing an active account flips the tracker to `Deployed` exactly once
//! and overwrites the local counters with the ones stored on-chain. Versions
//! with a sequence number keep re-reading the account after deployment.
//! Versions with static counters read them once per handle, even when the
//! handle starts out deployed. Versions without counters stop querying.
//!
//! A deployed wallet whose account is no longer active is an error: its
//! counters can no longer be trusted.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use cellar_core::address::Address;
use cellar_core::models::{AccountStatus, StateInit};
use cellar_core::traits::Transport;

use crate::error::WalletError;
use crate::protocol::{CounterKind, Counters, WalletProtocol};

/// Whether the wallet contract is known to be deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    NotDeployed,
    Deployed,
}

/// Outcome of [`DeploymentStateTracker::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// State-init to attach to the next envelope.
    pub state_init: Option<StateInit>,
    /// Counters to compose the next envelope with.
    pub counters: Counters,
}

#[derive(Debug)]
struct Inner {
    state: DeploymentState,
    counters: Counters,
    /// Counters have been read from an active account at least once.
    observed: bool,
}

/// Caches what is known about the wallet's on-chain state.
#[derive(Debug)]
pub struct DeploymentStateTracker {
    state_init: StateInit,
    counter_kind: CounterKind,
    inner: Mutex<Inner>,
}

impl DeploymentStateTracker {
    /// Tracker for a wallet that may not be deployed yet.
    pub fn new(state_init: StateInit, counter_kind: CounterKind, counters: Counters) -> Self {
        Self {
            state_init,
            counter_kind,
            inner: Mutex::new(Inner {
                state: DeploymentState::NotDeployed,
                counters,
                observed: false,
            }),
        }
    }

    /// Tracker for a wallet known to be deployed already. Counters still
    /// come from the account before the first envelope unless the version
    /// has none.
    pub fn deployed(state_init: StateInit, counter_kind: CounterKind, counters: Counters) -> Self {
        let tracker = Self::new(state_init, counter_kind, counters);
        tracker.inner.lock().state = DeploymentState::Deployed;
        tracker
    }

    pub fn state(&self) -> DeploymentState {
        self.inner.lock().state
    }

    pub fn is_deployed(&self) -> bool {
        self.state() == DeploymentState::Deployed
    }

    /// Last known counters.
    pub fn counters(&self) -> Counters {
        self.inner.lock().counters
    }

    /// State-init attached while the wallet is not deployed.
    pub fn state_init(&self) -> &StateInit {
        &self.state_init
    }

    fn counters_settled(&self, inner: &Inner) -> bool {
        match self.counter_kind {
            CounterKind::None => true,
            CounterKind::Static => inner.observed,
            CounterKind::Seqno => false,
        }
    }

    /// Decide whether the next envelope needs a state-init, refreshing the
    /// counters from the network when they may have moved.
    pub async fn resolve<P>(
        &self,
        transport: &dyn Transport,
        address: &Address,
        protocol: &P,
    ) -> Result<Resolved, WalletError>
    where
        P: WalletProtocol + ?Sized,
    {
        {
            let inner = self.inner.lock();
            if inner.state == DeploymentState::Deployed && self.counters_settled(&inner) {
                return Ok(Resolved {
                    state_init: None,
                    counters: inner.counters,
                });
            }
        }

        let account = transport.get_account_state(address).await?;

        let mut inner = self.inner.lock();
        match account {
            Some(state) if state.status == AccountStatus::Active => {
                let data = state
                    .state_init
                    .as_ref()
                    .map(|init| &init.data)
                    .ok_or(WalletError::MissingStateData(*address))?;
                let counters = protocol.parse_counters(data)?;
                if inner.state == DeploymentState::NotDeployed {
                    info!(wallet = %address, version = protocol.name(), "wallet is deployed");
                    inner.state = DeploymentState::Deployed;
                }
                inner.counters = counters;
                inner.observed = true;
                debug!(wallet = %address, seqno = counters.seqno, "counters refreshed");
                Ok(Resolved {
                    state_init: None,
                    counters,
                })
            }
            other => {
                if let Some(state) = &other {
                    if state.status == AccountStatus::Frozen {
                        warn!(wallet = %address, "wallet account is frozen");
                    }
                }
                if inner.state == DeploymentState::Deployed {
                    warn!(wallet = %address, "deployed wallet is no longer active");
                    return Err(WalletError::AccountNotActive(*address));
                }
                Ok(Resolved {
                    state_init: Some(self.state_init.clone()),
                    counters: inner.counters,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EverWallet, HighloadWalletV2, WalletV3};
    use async_trait::async_trait;
    use cellar_core::cell::{Cell, CellBuilder};
    use cellar_core::clock::SystemClock;
    use cellar_core::crypto::KeyPair;
    use cellar_core::error::TransportError;
    use cellar_core::models::{AccountState, SignedExternalMessage, Transaction};
    use cellar_core::traits::Clock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every account query with a fixed state and counts queries.
    struct FixedTransport {
        state: Mutex<Option<AccountState>>,
        queries: AtomicUsize,
    }

    impl FixedTransport {
        fn new(state: Option<AccountState>) -> Self {
            Self {
                state: Mutex::new(state),
                queries: AtomicUsize::new(0),
            }
        }

        fn set(&self, state: Option<AccountState>) {
            *self.state.lock() = state;
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        fn clock(&self) -> &dyn Clock {
            &SystemClock
        }

        async fn get_account_state(
            &self,
            _address: &Address,
        ) -> Result<Option<AccountState>, TransportError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.state.lock().clone())
        }

        async fn get_signature_id(&self) -> Result<Option<i32>, TransportError> {
            Ok(None)
        }

        async fn send_external_message(
            &self,
            _message: &SignedExternalMessage,
        ) -> Result<Option<Transaction>, TransportError> {
            Ok(None)
        }

        async fn trace_transaction(
            &self,
            _transaction: &Transaction,
        ) -> Result<Vec<Transaction>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn v3_data(seqno: u32, wallet_id: u32) -> Cell {
        let mut b = CellBuilder::new();
        b.store_u32(seqno).unwrap().store_u32(wallet_id).unwrap();
        b.store_raw(&[0u8; 32], 256).unwrap();
        b.build().unwrap()
    }

    fn setup<P: WalletProtocol>(protocol: &P) -> (DeploymentStateTracker, Address) {
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        let init = protocol.compute_state_init(&pk).unwrap();
        let address = init.compute_address(0).unwrap();
        let tracker =
            DeploymentStateTracker::new(init, protocol.counter_kind(), protocol.initial_counters());
        (tracker, address)
    }

    #[tokio::test]
    async fn absent_account_attaches_state_init() {
        let v3 = WalletV3::default();
        let (tracker, address) = setup(&v3);
        let transport = FixedTransport::new(None);

        let resolved = tracker.resolve(&transport, &address, &v3).await.unwrap();
        assert_eq!(resolved.state_init.as_ref(), Some(tracker.state_init()));
        assert_eq!(resolved.counters, v3.initial_counters());
        assert!(!tracker.is_deployed());
    }

    #[tokio::test]
    async fn uninit_account_attaches_state_init() {
        let v3 = WalletV3::default();
        let (tracker, address) = setup(&v3);
        let transport = FixedTransport::new(Some(AccountState::uninit(1_000)));

        let resolved = tracker.resolve(&transport, &address, &v3).await.unwrap();
        assert!(resolved.state_init.is_some());
        assert_eq!(tracker.state(), DeploymentState::NotDeployed);
    }

    #[tokio::test]
    async fn active_account_overwrites_counters() {
        let v3 = WalletV3::default();
        let (tracker, address) = setup(&v3);
        let code = v3.code().unwrap();
        let transport = FixedTransport::new(Some(AccountState::active(
            1,
            StateInit::new(code.clone(), v3_data(5, 77)),
        )));

        let resolved = tracker.resolve(&transport, &address, &v3).await.unwrap();
        assert!(resolved.state_init.is_none());
        assert_eq!(resolved.counters, Counters { seqno: 5, wallet_id: 77 });
        assert!(tracker.is_deployed());

        // Seqno wallets keep reading after deployment.
        transport.set(Some(AccountState::active(1, StateInit::new(code, v3_data(6, 77)))));
        let resolved = tracker.resolve(&transport, &address, &v3).await.unwrap();
        assert_eq!(resolved.counters.seqno, 6);
        assert_eq!(transport.queries(), 2);
    }

    #[tokio::test]
    async fn counterless_wallet_stops_querying_once_deployed() {
        let hl = HighloadWalletV2::new(3);
        let (tracker, address) = setup(&hl);
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        let transport = FixedTransport::new(Some(AccountState::active(
            1,
            hl.compute_state_init(&pk).unwrap(),
        )));

        tracker.resolve(&transport, &address, &hl).await.unwrap();
        tracker.resolve(&transport, &address, &hl).await.unwrap();
        let resolved = tracker.resolve(&transport, &address, &hl).await.unwrap();
        assert!(resolved.state_init.is_none());
        assert_eq!(resolved.counters.wallet_id, 3);
        assert_eq!(transport.queries(), 1);
    }

    #[tokio::test]
    async fn deployed_never_reverts() {
        let v3 = WalletV3::default();
        let (tracker, address) = setup(&v3);
        let transport = FixedTransport::new(Some(AccountState::active(
            1,
            StateInit::new(v3.code().unwrap(), v3_data(1, 2)),
        )));
        tracker.resolve(&transport, &address, &v3).await.unwrap();

        transport.set(None);
        assert_eq!(
            tracker.resolve(&transport, &address, &v3).await.unwrap_err(),
            WalletError::AccountNotActive(address)
        );
        assert!(tracker.is_deployed());
        assert_eq!(tracker.counters().seqno, 1);

        transport.set(Some(AccountState::uninit(5)));
        assert_eq!(
            tracker.resolve(&transport, &address, &v3).await.unwrap_err(),
            WalletError::AccountNotActive(address)
        );
        assert!(tracker.is_deployed());
    }

    #[tokio::test]
    async fn active_without_data_is_an_error() {
        let v3 = WalletV3::default();
        let (tracker, address) = setup(&v3);
        let transport = FixedTransport::new(Some(AccountState {
            status: AccountStatus::Active,
            balance: 1,
            state_init: None,
        }));

        assert_eq!(
            tracker.resolve(&transport, &address, &v3).await.unwrap_err(),
            WalletError::MissingStateData(address)
        );
        assert!(!tracker.is_deployed());
    }

    #[tokio::test]
    async fn deployed_counterless_wallet_never_queries() {
        let ever = EverWallet;
        let pk = KeyPair::generate().public_key();
        let tracker = DeploymentStateTracker::deployed(
            ever.compute_state_init(&pk).unwrap(),
            ever.counter_kind(),
            ever.initial_counters(),
        );
        let transport = FixedTransport::new(None);
        let resolved = tracker
            .resolve(&transport, &Address::new(0, Default::default()), &ever)
            .await
            .unwrap();
        assert!(resolved.state_init.is_none());
        assert_eq!(transport.queries(), 0);
    }

    #[tokio::test]
    async fn deployed_static_counters_are_read_once() {
        let local = HighloadWalletV2::default();
        let pk = KeyPair::from_secret_bytes([7; 32]).public_key();
        let tracker = DeploymentStateTracker::deployed(
            local.compute_state_init(&pk).unwrap(),
            local.counter_kind(),
            local.initial_counters(),
        );
        let on_chain = HighloadWalletV2::new(77).compute_state_init(&pk).unwrap();
        let address = on_chain.compute_address(0).unwrap();
        let transport = FixedTransport::new(Some(AccountState::active(1, on_chain)));

        let first = tracker.resolve(&transport, &address, &local).await.unwrap();
        let second = tracker.resolve(&transport, &address, &local).await.unwrap();
        assert!(first.state_init.is_none());
        assert_eq!(first.counters.wallet_id, 77);
        assert_eq!(second.counters.wallet_id, 77);
        assert_eq!(transport.queries(), 1);
    }

    #[tokio::test]
    async fn deployed_static_counters_require_active_account() {
        let hl = HighloadWalletV2::default();
        let pk = KeyPair::generate().public_key();
        let tracker = DeploymentStateTracker::deployed(
            hl.compute_state_init(&pk).unwrap(),
            hl.counter_kind(),
            hl.initial_counters(),
        );
        let address = Address::new(0, Default::default());
        let transport = FixedTransport::new(None);
        assert_eq!(
            tracker.resolve(&transport, &address, &hl).await.unwrap_err(),
            WalletError::AccountNotActive(address)
        );
    }
}
