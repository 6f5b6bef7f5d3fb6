//! End-to-end wallet tests against the in-memory ledger.
//!
//! Each test creates a wallet handle over a shared `TestTransport`, funds
//! or activates its account directly in the ledger, and inspects the
//! external messages the handle submits.

use std::sync::Arc;

use cellar_core::cell::{Cell, CellBuilder};
use cellar_core::constants::ONE_TOKEN;
use cellar_core::crypto::PublicKey;
use cellar_core::models::{AccountState, AccountStatus, InternalMessage};
use cellar_core::traits::Clock;
use cellar_tests::helpers::*;
use cellar_wallet::{
    Counters, EverWallet, Giver, HighloadWalletV2, OutgoingMessage, Wallet, WalletConfig,
    WalletError, WalletProtocol, WalletV3,
};
use proptest::prelude::*;

const V3_WALLET_ID: u32 = 0x4BA9_2D8A;
const NOW_SEC: u32 = (GENESIS_MS / 1000) as u32;

fn wallet<P: WalletProtocol>(transport: &Arc<TestTransport>, seed: u8, protocol: P) -> Wallet<P> {
    Wallet::new(
        transport.clone(),
        Arc::new(keypair(seed)),
        protocol,
        WalletConfig::default(),
    )
    .unwrap()
}

fn transfers(n: usize) -> Vec<OutgoingMessage> {
    (0..n)
        .map(|i| InternalMessage::transfer(addr(i as u8), ONE_TOKEN, false).into())
        .collect()
}

fn v3_data(seqno: u32, wallet_id: u32, pk: &PublicKey) -> Cell {
    let mut b = CellBuilder::new();
    b.store_u32(seqno)
        .unwrap()
        .store_u32(wallet_id)
        .unwrap()
        .store_public_key(pk)
        .unwrap();
    b.build().unwrap()
}

fn v3_prefix(payload: &Cell) -> (u32, u32, u32) {
    let mut s = payload.as_slice();
    (
        s.load_u32().unwrap(),
        s.load_u32().unwrap(),
        s.load_u32().unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Version B deployment scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn v3_first_send_deploys_then_omits_state_init() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 7, WalletV3::default());
    assert_eq!(
        w.address().to_string(),
        "0:1f70cbdc2f58a3917b3405f077cc663198ab914b19d053db8fd609fac98d98a7"
    );
    transport.credit(w.address(), 10 * ONE_TOKEN);

    let msg = InternalMessage::transfer(addr(1), ONE_TOKEN, false);
    w.send(msg.clone(), None).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].state_init.as_ref(),
        Some(&WalletV3::default().compute_state_init(&w.public_key()).unwrap())
    );
    assert_eq!(v3_prefix(&sent[0].payload), (V3_WALLET_ID, NOW_SEC + 60, 0));
    assert!(transport.account(w.address()).unwrap().is_active());

    // The contract bumped its seqno while processing the first envelope.
    transport.set_data(w.address(), v3_data(1, V3_WALLET_ID, &w.public_key()));
    w.send(msg, None).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].state_init.is_none());
    assert_eq!(v3_prefix(&sent[1].payload), (V3_WALLET_ID, NOW_SEC + 60, 1));
    assert!(w.is_deployed());
    assert_eq!(w.counters().seqno, 1);
}

#[tokio::test]
async fn v3_address_is_stable_across_handles() {
    let transport = Arc::new(TestTransport::new());
    let a = wallet(&transport, 7, WalletV3::default());
    let b = wallet(&transport, 7, WalletV3::default());
    assert_eq!(a.address(), b.address());
    assert_eq!(
        *a.address(),
        WalletV3::default()
            .compute_address(&keypair(7).public_key(), 0)
            .unwrap()
    );
}

#[tokio::test]
async fn v3_seqno_is_reread_before_every_send() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 3, WalletV3::default());
    let init = WalletV3::default().compute_state_init(&w.public_key()).unwrap();
    transport.set_account(*w.address(), AccountState::active(ONE_TOKEN, init));

    for seqno in [5u32, 6, 9] {
        transport.set_data(w.address(), v3_data(seqno, V3_WALLET_ID, &w.public_key()));
        w.send_raw(&transfers(1), None).await.unwrap();
        let last = transport.sent().pop().unwrap();
        assert_eq!(v3_prefix(&last.payload).2, seqno);
    }
    assert_eq!(transport.account_queries(), 3);
}

#[tokio::test]
async fn counters_round_trip_through_active_state() {
    let transport = Arc::new(TestTransport::new());
    let protocol = WalletV3::new(0x1234);
    let w = wallet(&transport, 4, protocol);
    let init = protocol.compute_state_init(&w.public_key()).unwrap();
    transport.set_account(*w.address(), AccountState::active(ONE_TOKEN, init));

    w.send_raw(&transfers(2), None).await.unwrap();
    assert_eq!(w.counters(), Counters { seqno: 0, wallet_id: 0x1234 });
    let sent = transport.sent();
    assert_eq!(v3_prefix(&sent[0].payload), (0x1234, NOW_SEC + 60, 0));
    assert!(sent[0].state_init.is_none());
}

// ---------------------------------------------------------------------------
// Batch limits and expiration
// ---------------------------------------------------------------------------

async fn assert_rejects_oversized<P: WalletProtocol>(protocol: P) {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 1, protocol);
    let max = w.protocol().max_messages();
    let err = w.send_raw(&transfers(max + 1), None).await.unwrap_err();
    assert_eq!(err, WalletError::TooManyMessages { count: max + 1, max });
    assert_eq!(transport.requests(), 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn oversized_batches_fail_before_network() {
    assert_rejects_oversized(EverWallet).await;
    assert_rejects_oversized(WalletV3::default()).await;
    assert_rejects_oversized(HighloadWalletV2::default()).await;
}

#[tokio::test]
async fn dropped_envelope_reports_expiration_and_retry_succeeds() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 2, HighloadWalletV2::default());
    transport.credit(w.address(), ONE_TOKEN);

    transport.drop_next(1);
    let err = w.send_raw(&transfers(3), None).await.unwrap_err();
    assert_eq!(err, WalletError::MessageExpired);
    assert!(!w.is_deployed());

    transport.manual_clock().advance_secs(61);
    w.send_raw(&transfers(3), None).await.unwrap();
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].state_init.is_some());
    assert_eq!(sent[1].expire_at, NOW_SEC + 61 + 60);
}

#[tokio::test]
async fn ttl_override_is_relative_to_now() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 2, WalletV3::default());
    let env = w.prepare_raw(&transfers(1), Some(5)).await.unwrap();
    assert_eq!(env.expire_at, transport.manual_clock().now_sec() + 5);
    assert_eq!(v3_prefix(&env.payload).1, NOW_SEC + 5);
}

#[tokio::test]
async fn message_to_missing_account_is_not_included() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 2, EverWallet);
    let err = w.send_raw(&transfers(1), None).await.unwrap_err();
    assert_eq!(err, WalletError::MessageExpired);
    assert!(transport.account(w.address()).is_none());
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signature_uses_network_domain_id() {
    let transport = Arc::new(TestTransport::with_signature_id(42));
    let w = wallet(&transport, 7, WalletV3::default());
    transport.credit(w.address(), ONE_TOKEN);
    w.send_raw(&transfers(2), None).await.unwrap();

    let env = transport.sent().remove(0);
    let sig = env.signature.unwrap();
    let hash = env.payload.repr_hash();
    let pk = w.public_key();
    assert!(pk.verify(hash.as_bytes(), &sig, Some(42)).is_ok());
    assert!(pk.verify(hash.as_bytes(), &sig, None).is_err());
}

#[tokio::test]
async fn ever_wallet_envelope_is_signed_by_owner() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 8, EverWallet);
    transport.credit(w.address(), ONE_TOKEN);
    w.send_raw(&transfers(1), None).await.unwrap();

    let env = transport.sent().remove(0);
    let mut body = env.body.as_slice();
    assert!(body.load_bit().unwrap());
    assert_eq!(Some(body.load_signature().unwrap()), env.signature);

    let mut payload = env.payload.as_slice();
    assert!(payload.load_bit().unwrap());
    assert_eq!(payload.load_public_key().unwrap(), w.public_key());
    assert_eq!(payload.load_u64().unwrap(), GENESIS_MS);
    assert_eq!(payload.load_u32().unwrap(), NOW_SEC + 60);
}

// ---------------------------------------------------------------------------
// Versions A and C
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ever_wallet_stops_querying_once_deployed() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 9, EverWallet);
    transport.credit(w.address(), ONE_TOKEN);

    w.send_raw(&transfers(1), None).await.unwrap();
    w.send_raw(&transfers(1), None).await.unwrap();
    w.send_raw(&transfers(1), None).await.unwrap();

    let sent = transport.sent();
    assert!(sent[0].state_init.is_some());
    assert!(sent[1].state_init.is_none());
    assert!(sent[2].state_init.is_none());
    assert_eq!(transport.account_queries(), 2);
}

#[tokio::test]
async fn highload_full_batch_query_matches_dict_hash() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 5, HighloadWalletV2::new(77));
    transport.credit(w.address(), ONE_TOKEN);

    let batch = transfers(255);
    w.send_raw(&batch, None).await.unwrap();

    let env = transport.sent().remove(0);
    let mut p = env.payload.as_slice();
    assert_eq!(p.load_u32().unwrap(), 77);
    assert_eq!(p.load_u32().unwrap(), NOW_SEC + 60);
    let dict = HighloadWalletV2::messages_dict(&batch).unwrap();
    assert_eq!(p.load_u32().unwrap(), dict.repr_hash().tail_u32());
}

#[tokio::test]
async fn highload_from_address_uses_on_chain_wallet_id() {
    let transport = Arc::new(TestTransport::new());
    let owner = Arc::new(keypair(12));
    let on_chain = HighloadWalletV2::new(77)
        .compute_state_init(&owner.public_key())
        .unwrap();
    let address = on_chain.compute_address(0).unwrap();
    transport.set_account(address, AccountState::active(ONE_TOKEN, on_chain));

    let w = Wallet::from_address(
        transport.clone(),
        owner,
        HighloadWalletV2::default(),
        address,
        WalletConfig::default(),
    )
    .unwrap();
    let first = w.prepare_raw(&transfers(1), None).await.unwrap();
    let second = w.prepare_raw(&transfers(1), None).await.unwrap();

    assert!(first.state_init.is_none());
    assert_eq!(first.payload.as_slice().load_u32().unwrap(), 77);
    assert_eq!(second.payload.as_slice().load_u32().unwrap(), 77);
    assert_eq!(w.counters().wallet_id, 77);
    assert_eq!(transport.account_queries(), 1);
}

#[tokio::test]
async fn v3_from_address_reads_seqno_before_first_send() {
    let transport = Arc::new(TestTransport::new());
    let owner = Arc::new(keypair(13));
    let code = WalletV3::default().code().unwrap();
    let data = v3_data(9, 0x1234, &owner.public_key());
    let on_chain = cellar_core::models::StateInit::new(code, data);
    let address = on_chain.compute_address(0).unwrap();
    transport.set_account(address, AccountState::active(ONE_TOKEN, on_chain));

    let w = Wallet::from_address(
        transport.clone(),
        owner,
        WalletV3::default(),
        address,
        WalletConfig::default(),
    )
    .unwrap();
    let env = w.prepare_raw(&transfers(1), None).await.unwrap();
    assert!(env.state_init.is_none());
    assert_eq!(v3_prefix(&env.payload), (0x1234, NOW_SEC + 60, 9));
}

#[tokio::test]
async fn deployed_wallet_that_went_inactive_is_rejected() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 14, WalletV3::default());
    let init = WalletV3::default().compute_state_init(&w.public_key()).unwrap();
    transport.set_account(*w.address(), AccountState::active(ONE_TOKEN, init));
    w.prepare_raw(&transfers(1), None).await.unwrap();

    transport.set_account(*w.address(), AccountState::uninit(ONE_TOKEN));
    assert_eq!(
        w.prepare_raw(&transfers(1), None).await.unwrap_err(),
        WalletError::AccountNotActive(*w.address())
    );
    assert!(w.is_deployed());
}

// ---------------------------------------------------------------------------
// Account queries and funding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_of_missing_and_funded_accounts() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 6, EverWallet);
    assert_eq!(w.get_balance().await.unwrap(), 0);
    assert!(w.get_account_state().await.unwrap().is_none());

    transport.credit(w.address(), 123);
    assert_eq!(w.get_balance().await.unwrap(), 123);
}

#[tokio::test]
async fn active_account_without_data_fails_resolve() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 6, WalletV3::default());
    transport.set_account(
        *w.address(),
        AccountState {
            status: AccountStatus::Active,
            balance: ONE_TOKEN,
            state_init: None,
        },
    );
    assert_eq!(
        w.prepare_raw(&transfers(1), None).await.unwrap_err(),
        WalletError::MissingStateData(*w.address())
    );
}

#[tokio::test]
async fn wallet_gives_non_bouncing_transfer_and_waits() {
    let transport = Arc::new(TestTransport::new());
    let w = wallet(&transport, 10, WalletV3::default());
    let init = WalletV3::default().compute_state_init(&w.public_key()).unwrap();
    transport.set_account(*w.address(), AccountState::active(10 * ONE_TOKEN, init));

    let target = addr(0x42);
    w.give(&target, 5 * ONE_TOKEN).await.unwrap();

    let env = transport.sent().remove(0);
    let mut p = env.payload.as_slice();
    p.skip_bits(96).unwrap();
    assert_eq!(p.load_u8().unwrap(), 3);
    assert_eq!(
        env.payload.reference(0).unwrap(),
        &InternalMessage::transfer(target, 5 * ONE_TOKEN, false)
            .build_cell()
            .unwrap()
    );
    assert_eq!(transport.traced(), vec![env.hash().unwrap()]);
}

// ---------------------------------------------------------------------------
// Deployment state never reverts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Observed {
    Absent,
    Uninit,
    Active,
    Frozen,
}

fn observed() -> impl Strategy<Value = Observed> {
    prop_oneof![
        Just(Observed::Absent),
        Just(Observed::Uninit),
        Just(Observed::Active),
        Just(Observed::Frozen),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn deployment_is_observed_at_most_once(steps in prop::collection::vec(observed(), 1..8)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let transport = Arc::new(TestTransport::new());
            let w = wallet(&transport, 11, WalletV3::default());
            let init = WalletV3::default().compute_state_init(&w.public_key()).unwrap();
            let mut seen_active = false;

            for step in steps {
                let state = match step {
                    Observed::Absent => None,
                    Observed::Uninit => Some(AccountState::uninit(ONE_TOKEN)),
                    Observed::Active => Some(AccountState::active(ONE_TOKEN, init.clone())),
                    Observed::Frozen => Some(AccountState::frozen(ONE_TOKEN)),
                };
                match state {
                    Some(state) => transport.set_account(*w.address(), state),
                    None => transport.remove_account(w.address()),
                }

                let result = w.prepare_raw(&transfers(1), None).await;
                let active = matches!(step, Observed::Active);
                if seen_active && !active {
                    assert_eq!(result.unwrap_err(), WalletError::AccountNotActive(*w.address()));
                } else {
                    assert_eq!(result.unwrap().state_init.is_none(), active);
                }
                seen_active |= active;
                assert_eq!(w.is_deployed(), seen_active);
            }
        });
    }
}
