//! Block lifecycle integration tests: genesis, delivery, failure isolation,
//! block gas, consensus-parameter updates, queries and tracing.

mod common;

use std::sync::Arc;

use basalt_engine::bank::{self, BankKeeper};
use basalt_engine::{
    decode_tx, module_address, Account, AccountKeeper, AppConfig, AuthAnteHandler,
    BeginBlockRequest, BlockCoordinator, ConsensusParams, Context, EndBlockRequest,
    EndBlockResponse, EngineError, Hooks, InitChainRequest, Phase, Pipeline, Router, StdHooks,
    StdKeys, StdMsg, FEE_COLLECTOR,
};
use basalt_primitives::{ErrorCode, ExecResult};
use basalt_store::{BufferSink, PruningOptions, RootMultiStore, StoreError, StoreKey, StoreKind};

use common::*;

// ── Test: genesis ──

#[test]
fn test_genesis_accounts_visible_after_first_commit() {
    let (app, keys) = started_app(config());
    assert_eq!(app.info().last_block_height, 0);

    let id = empty_block(&app, 1);
    assert_eq!(id.version, 1);
    assert_eq!(balance(&app, &keys, &alice()), 1_000);
    assert_eq!(balance(&app, &keys, &bob()), 500);
    assert_eq!(app.info().last_app_hash, id.hash);
}

#[test]
fn test_empty_blocks_advance_version_keep_hash() {
    let (app, _) = started_app(config());
    let first = empty_block(&app, 1);
    let second = empty_block(&app, 2);
    assert_eq!(second.version, 2);
    assert_eq!(second.hash, first.hash);
}

// ── Test: delivery ──

#[test]
fn test_three_tx_block_with_failing_ante() {
    let (app, keys) = started_app(config());
    let (alice, bob, carol) = (alice(), bob(), carol());

    begin(&app, 1);
    let r1 = app.deliver_tx(&alice.transfer(&bob, 100, 0)).unwrap();
    // wrong sequence: rejected by the ante stage, nothing charged
    let r2 = app.deliver_tx(&alice.transfer(&carol, 1, 7)).unwrap();
    let r3 = app.deliver_tx(&alice.transfer(&carol, 50, 1)).unwrap();
    assert!(r1.is_ok(), "{}", r1.log);
    assert_eq!(r2.error_code(), Some(ErrorCode::InvalidSequence));
    assert!(r3.is_ok(), "{}", r3.log);
    assert_eq!(app.phase(), Phase::Delivering);
    finish(&app, 1);

    assert_eq!(balance(&app, &keys, &alice), 1_000 - 10 - 100 - 10 - 50);
    assert_eq!(balance(&app, &keys, &bob), 600);
    assert_eq!(balance(&app, &keys, &carol), 50);
    let collector = account(&app, &keys, &module_address(FEE_COLLECTOR)).unwrap();
    assert_eq!(collector.balance, 20);
    assert_eq!(account(&app, &keys, &alice.address).unwrap().sequence, 2);
}

#[test]
fn test_failing_second_message_keeps_fee() {
    let (app, keys) = started_app(config());
    let (alice, bob, carol) = (alice(), bob(), carol());

    begin(&app, 1);
    let raw = alice.sign(
        vec![alice.send_to(&bob, 100), alice.send_to(&carol, 5_000)],
        0,
        fee(10, 300_000),
    );
    let res = app.deliver_tx(&raw).unwrap();
    assert_eq!(res.error_code(), Some(ErrorCode::InsufficientFunds));
    assert!(res.gas_used > 0);
    assert!(res.events.iter().all(|e| e.kind != "transfer"));
    finish(&app, 1);

    let acct = account(&app, &keys, &alice.address).unwrap();
    assert_eq!(acct.balance, 990);
    assert_eq!(acct.sequence, 1);
    assert_eq!(balance(&app, &keys, &bob), 500);
    assert_eq!(balance(&app, &keys, &carol), 0);

    // byte-for-byte: only the ante stage's fee and sequence writes remain
    let mut expected = vec![
        Account {
            pub_key: Some(alice.key.verifying_key().to_bytes()),
            sequence: 1,
            ..Account::with_balance(alice.address, 990)
        },
        Account::with_balance(bob.address, 500),
        Account::with_balance(module_address(FEE_COLLECTOR), 10),
    ];
    expected.sort_by_key(|a| a.address);
    let expected: Vec<_> = expected
        .iter()
        .map(|a| (a.address.to_vec(), a.encode()))
        .collect();
    assert_eq!(acc_entries(&app, &keys), expected);
}

#[test]
fn test_successful_tx_reports_events_and_data() {
    let (app, _) = started_app(config());
    let (alice, bob) = (alice(), bob());

    begin(&app, 1);
    let res = app.deliver_tx(&alice.transfer(&bob, 5, 0)).unwrap();
    assert!(res.is_ok());
    assert_eq!(res.gas_wanted, 200_000);
    assert!(res.gas_used > 0 && res.gas_used < res.gas_wanted);
    let transfer = res.events.iter().find(|e| e.kind == "transfer").unwrap();
    assert_eq!(transfer.get("amount"), Some("5"));
    assert_eq!(transfer.get("sender"), Some(hex::encode(alice.address).as_str()));
    assert!(!res.data.is_empty());
    finish(&app, 1);
}

// ── Test: phases ──

#[test]
fn test_wrong_phase_rejected() {
    let (app, _) = started_app(config());
    assert!(matches!(
        app.end_block(EndBlockRequest { height: 1 }),
        Err(EngineError::InvalidPhase { operation: "end_block", phase: Phase::Idle })
    ));
    begin(&app, 1);
    assert!(matches!(
        app.commit(),
        Err(EngineError::InvalidPhase { operation: "commit", phase: Phase::InBlock })
    ));
    assert!(matches!(
        app.init_chain(InitChainRequest {
            chain_id: CHAIN_ID.into(),
            ..InitChainRequest::default()
        }),
        Err(EngineError::InvalidPhase { .. })
    ));
    finish(&app, 1);
    assert!(matches!(
        app.begin_block(BeginBlockRequest {
            header: header(1),
            ..BeginBlockRequest::default()
        }),
        Err(EngineError::InvalidHeight { expected: 2, got: 1 })
    ));
}

// ── Test: block gas ──

#[test]
fn test_block_gas_overflow() {
    let (alice, bob, carol) = (alice(), bob(), carol());
    let tx1 = alice.transfer(&bob, 100, 0);
    let tx2 = bob.transfer(&carol, 100, 0);
    let tx3 = alice.transfer(&carol, 1, 1);

    // measure tx1 on an unbounded chain
    let (probe, _) = started_app(config());
    begin(&probe, 1);
    let used = probe.deliver_tx(&tx1).unwrap().gas_used;

    let (app, keys) = started_app(AppConfig {
        max_block_gas: Some(used + used / 2),
        ..config()
    });
    begin(&app, 1);
    let r1 = app.deliver_tx(&tx1).unwrap();
    assert!(r1.is_ok(), "{}", r1.log);
    assert_eq!(r1.gas_used, used);

    let r2 = app.deliver_tx(&tx2).unwrap();
    assert_eq!(r2.error_code(), Some(ErrorCode::OutOfGas));

    let r3 = app.deliver_tx(&tx3).unwrap();
    assert_eq!(r3.error_code(), Some(ErrorCode::OutOfGas));
    assert_eq!(r3.gas_used, 0);
    finish(&app, 1);

    // bob's ante stage stood, his transfer did not
    let bob_acct = account(&app, &keys, &bob.address).unwrap();
    assert_eq!(bob_acct.balance, 500 + 100 - 10);
    assert_eq!(bob_acct.sequence, 1);
    assert_eq!(balance(&app, &keys, &carol), 0);
    assert_eq!(account(&app, &keys, &alice.address).unwrap().sequence, 1);

    // the next block starts with a fresh meter
    begin(&app, 2);
    assert!(app.deliver_tx(&tx3).unwrap().is_ok());
    finish(&app, 2);
}

/// Lowers the block gas limit to one unit at the end of block 1.
struct ShrinkBlockGas(StdHooks);

impl Hooks for ShrinkBlockGas {
    fn init_chain(&self, ctx: &mut Context<'_>, req: &InitChainRequest) -> ExecResult<()> {
        self.0.init_chain(ctx, req)
    }

    fn end_block(
        &self,
        _ctx: &mut Context<'_>,
        req: &EndBlockRequest,
    ) -> ExecResult<EndBlockResponse> {
        let consensus_params = (req.height == 1).then_some(ConsensusParams {
            max_block_gas: Some(1),
        });
        Ok(EndBlockResponse {
            consensus_params,
            ..EndBlockResponse::default()
        })
    }
}

fn app_with_hooks(
    hooks: impl FnOnce(AccountKeeper) -> Box<dyn Hooks>,
) -> (BlockCoordinator<StdMsg>, StdKeys) {
    let config = config();
    let acc = StoreKey::new("acc");
    let mut root = RootMultiStore::new(config.pruning);
    root.mount(acc.clone(), StoreKind::Merkle).unwrap();
    let accounts = AccountKeeper::new(acc.clone());

    let mut router = Router::new();
    router
        .add_route(bank::ROUTE, bank::handler(BankKeeper::new(accounts.clone())))
        .unwrap();
    let ante = AuthAnteHandler::new(accounts.clone(), &config);
    let pipeline = Pipeline::new(decode_tx::<StdMsg>, Box::new(ante), router, config.kv_gas);
    let app = BlockCoordinator::new(config, root, pipeline, hooks(accounts)).unwrap();
    (app, StdKeys { acc })
}

#[test]
fn test_consensus_params_apply_from_next_block() {
    let (app, keys) = app_with_hooks(|accounts| Box::new(ShrinkBlockGas(StdHooks::new(accounts))));
    app.init_chain(InitChainRequest {
        chain_id: CHAIN_ID.into(),
        app_state: genesis(&[(&alice(), 1_000)]),
        ..InitChainRequest::default()
    })
    .unwrap();
    let (alice, bob) = (alice(), bob());

    begin(&app, 1);
    assert!(app.deliver_tx(&alice.transfer(&bob, 1, 0)).unwrap().is_ok());
    let response = app.end_block(EndBlockRequest { height: 1 }).unwrap();
    assert_eq!(response.consensus_params.unwrap().max_block_gas, Some(1));
    app.commit().unwrap();

    begin(&app, 2);
    let res = app.deliver_tx(&alice.transfer(&bob, 1, 1)).unwrap();
    assert_eq!(res.error_code(), Some(ErrorCode::OutOfGas));
    finish(&app, 2);
    assert_eq!(balance(&app, &keys, &bob), 1);
}

// ── Test: queries ──

#[test]
fn test_query_with_proofs_and_pruning() {
    let (app, keys) = started_app(AppConfig {
        pruning: PruningOptions::new(2, 0),
        ..config()
    });
    let (alice, bob) = (alice(), bob());

    let mut ids = Vec::new();
    for height in 1..=4 {
        begin(&app, height);
        let res = app.deliver_tx(&alice.transfer(&bob, 1, height - 1)).unwrap();
        assert!(res.is_ok(), "{}", res.log);
        ids.push(finish(&app, height));
    }

    let latest = app.query(&keys.acc, &bob.address, 0, true).unwrap();
    assert_eq!(latest.height, 4);
    let proof = latest.proof.unwrap();
    assert!(proof.verify(&ids[3].hash, "acc", &bob.address, latest.value.as_deref()));
    assert!(!proof.verify(&ids[2].hash, "acc", &bob.address, latest.value.as_deref()));

    let older = app.query(&keys.acc, &bob.address, 3, true).unwrap();
    assert_ne!(older.value, latest.value);
    assert!(older
        .proof
        .unwrap()
        .verify(&ids[2].hash, "acc", &bob.address, older.value.as_deref()));

    let missing = [0x42; 20];
    let absent = app.query(&keys.acc, &missing, 0, true).unwrap();
    assert_eq!(absent.value, None);
    assert!(absent.proof.unwrap().verify(&ids[3].hash, "acc", &missing, None));

    assert_eq!(
        app.query(&keys.acc, &bob.address, 1, false).unwrap_err(),
        EngineError::Store(StoreError::VersionPruned(1))
    );
    assert!(matches!(
        app.query(&keys.acc, &bob.address, 9, false),
        Err(EngineError::Store(StoreError::VersionNotFound { requested: 9, latest: 4 }))
    ));
}

// ── Test: tracing ──

#[test]
fn test_tracing_records_block_and_tx_metadata() {
    let (app, sink) = traced_app();
    let (alice, bob) = (alice(), bob());
    let raw = alice.transfer(&bob, 1, 0);

    begin(&app, 1);
    sink.take();
    assert!(app.deliver_tx(&raw).unwrap().is_ok());
    finish(&app, 1);

    let records = sink.records();
    assert!(records.iter().any(|r| r.store == "acc"));
    let tx_hash = hex::encode(basalt_primitives::crypto::tx_hash(&raw));
    for record in &records {
        assert_eq!(record.metadata.get("blockHeight").map(String::as_str), Some("1"));
        assert_eq!(record.metadata.get("txHash"), Some(&tx_hash));
    }
}

#[test]
fn test_check_tx_records_tagged_with_checked_tx() {
    let (app, sink) = traced_app();
    let (alice, bob) = (alice(), bob());
    let delivered = alice.transfer(&bob, 1, 0);
    let checked = alice.transfer(&bob, 2, 1);

    begin(&app, 1);
    assert!(app.deliver_tx(&delivered).unwrap().is_ok());
    finish(&app, 1);

    sink.take();
    assert!(app.check_tx(&checked).is_ok());
    let records = sink.take();
    assert!(!records.is_empty());
    let checked_hash = hex::encode(basalt_primitives::crypto::tx_hash(&checked));
    for record in &records {
        assert_eq!(record.metadata.get("txHash"), Some(&checked_hash));
        assert_eq!(record.metadata.get("blockHeight").map(String::as_str), Some("1"));
    }

    // delivery in the next block is not tagged with the checked tx
    begin(&app, 2);
    sink.take();
    let next = alice.transfer(&bob, 3, 1);
    assert!(app.deliver_tx(&next).unwrap().is_ok());
    let next_hash = hex::encode(basalt_primitives::crypto::tx_hash(&next));
    let records = sink.take();
    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| r.metadata.get("txHash") == Some(&next_hash)));
    finish(&app, 2);
}

#[test]
fn test_simulate_records_tagged_with_simulated_tx() {
    let (app, sink) = traced_app();
    let (alice, bob) = (alice(), bob());
    empty_block(&app, 1);

    let raw = alice.transfer(&bob, 1, 0);
    sink.take();
    assert!(app.simulate(&raw).is_ok());
    let hash = hex::encode(basalt_primitives::crypto::tx_hash(&raw));
    let records = sink.take();
    assert!(records.iter().any(|r| r.store == "acc"));
    assert!(records.iter().all(|r| r.metadata.get("txHash") == Some(&hash)));
}

fn traced_app() -> (BlockCoordinator<StdMsg>, Arc<BufferSink>) {
    let (app, _) = basalt_engine::std_app(config()).unwrap();
    let sink = Arc::new(BufferSink::new());
    app.set_tracer(sink.clone());
    app.init_chain(InitChainRequest {
        chain_id: CHAIN_ID.into(),
        app_state: genesis(&[(&alice(), 1_000)]),
        ..InitChainRequest::default()
    })
    .unwrap();
    (app, sink)
}
