//! Shared test helpers for integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use cellar_core::address::Address;
use cellar_core::cell::Cell;
use cellar_core::crypto::KeyPair;
use cellar_core::error::TransportError;
use cellar_core::models::{AccountState, AccountStatus, SignedExternalMessage, Transaction};
use cellar_core::traits::{Clock, Transport};
use cellar_core::types::Hash256;
use cellar_wallet::{Giver, WalletError};

/// Start of simulated time (milliseconds).
pub const GENESIS_MS: u64 = 1_700_000_000_000;

/// Deterministic key pair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// Address with a repeated-byte account id.
pub fn addr(seed: u8) -> Address {
    Address::new(0, Hash256([seed; 32]))
}

/// Clock moved forward by hand.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<Address, AccountState>,
    sent: Vec<SignedExternalMessage>,
    traced: Vec<Hash256>,
    drop_next: usize,
    lt: u64,
}

/// In-memory ledger.
///
/// External messages are included when their destination exists and is
/// either active or carries a state-init hashing to its account id, in
/// which case the account becomes active. Everything else (missing or
/// frozen destination, expired message, forced drop) yields `None`.
/// Internal messages are not executed.
pub struct TestTransport {
    clock: ManualClock,
    signature_id: Option<i32>,
    ledger: Mutex<Ledger>,
    requests: AtomicUsize,
    account_queries: AtomicUsize,
}

impl Default for TestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTransport {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(GENESIS_MS),
            signature_id: None,
            ledger: Mutex::new(Ledger::default()),
            requests: AtomicUsize::new(0),
            account_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_signature_id(signature_id: i32) -> Self {
        Self {
            signature_id: Some(signature_id),
            ..Self::new()
        }
    }

    pub fn manual_clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn set_account(&self, address: Address, state: AccountState) {
        self.ledger.lock().accounts.insert(address, state);
    }

    pub fn remove_account(&self, address: &Address) {
        self.ledger.lock().accounts.remove(address);
    }

    pub fn account(&self, address: &Address) -> Option<AccountState> {
        self.ledger.lock().accounts.get(address).cloned()
    }

    /// Add `amount` to an account, creating it uninitialized if missing.
    pub fn credit(&self, address: &Address, amount: u128) {
        let mut ledger = self.ledger.lock();
        ledger
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountState::uninit(0))
            .balance += amount;
    }

    /// Replace the init data of an active account, as the contract would
    /// after processing a message.
    pub fn set_data(&self, address: &Address, data: Cell) {
        let mut ledger = self.ledger.lock();
        if let Some(init) = ledger
            .accounts
            .get_mut(address)
            .and_then(|state| state.state_init.as_mut())
        {
            init.data = data;
        }
    }

    /// Drop the next `n` external messages as if they expired.
    pub fn drop_next(&self, n: usize) {
        self.ledger.lock().drop_next = n;
    }

    pub fn sent(&self) -> Vec<SignedExternalMessage> {
        self.ledger.lock().sent.clone()
    }

    /// Hashes of transactions whose settlement was awaited.
    pub fn traced(&self) -> Vec<Hash256> {
        self.ledger.lock().traced.clone()
    }

    /// Every network call made so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn account_queries(&self) -> usize {
        self.account_queries.load(Ordering::SeqCst)
    }

    fn include(&self, message: &SignedExternalMessage) -> Result<Option<Transaction>, TransportError> {
        let hash = message
            .hash()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let now = self.clock.now_sec();

        let mut ledger = self.ledger.lock();
        ledger.sent.push(message.clone());

        if ledger.drop_next > 0 {
            ledger.drop_next -= 1;
            return Ok(None);
        }
        if message.expire_at < now {
            return Ok(None);
        }

        let Some(account) = ledger.accounts.get_mut(&message.dst) else {
            return Ok(None);
        };
        match account.status {
            AccountStatus::Active => {}
            AccountStatus::Frozen => return Ok(None),
            AccountStatus::Uninit => {
                let Some(init) = &message.state_init else {
                    return Ok(None);
                };
                let expected = init
                    .compute_address(message.dst.workchain())
                    .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
                if expected != message.dst || account.balance == 0 {
                    return Ok(None);
                }
                account.status = AccountStatus::Active;
                account.state_init = Some(init.clone());
            }
        }

        ledger.lt += 1;
        Ok(Some(Transaction {
            hash,
            lt: ledger.lt,
            account: message.dst,
            out_msg_count: 0,
        }))
    }
}

#[async_trait]
impl Transport for TestTransport {
    fn clock(&self) -> &dyn Clock {
        &self.clock
    }

    async fn get_account_state(
        &self,
        address: &Address,
    ) -> Result<Option<AccountState>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.account_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.account(address))
    }

    async fn get_signature_id(&self) -> Result<Option<i32>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.signature_id)
    }

    async fn send_external_message(
        &self,
        message: &SignedExternalMessage,
    ) -> Result<Option<Transaction>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.include(message)
    }

    async fn trace_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Vec<Transaction>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.ledger.lock().traced.push(transaction.hash);
        Ok(Vec::new())
    }
}

/// Giver that credits the ledger directly and remembers every request.
pub struct RecordingGiver {
    address: Address,
    transport: Arc<TestTransport>,
    calls: Mutex<Vec<(Address, u128)>>,
}

impl RecordingGiver {
    pub fn new(transport: Arc<TestTransport>) -> Self {
        Self {
            address: addr(0xAA),
            transport,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Address, u128)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Giver for RecordingGiver {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn give(&self, target: &Address, amount: u128) -> Result<(), WalletError> {
        self.calls.lock().push((*target, amount));
        self.transport.credit(target, amount);
        Ok(())
    }
}
