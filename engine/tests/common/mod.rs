//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;

use basalt_engine::{
    encode_tx, std_app, AppConfig, BeginBlockRequest, BlockCoordinator, EndBlockRequest, Fee,
    GenesisAccount, GenesisState, InitChainRequest, MsgSend, StdKeys, StdMsg, Tx, TxSignature,
};
use basalt_primitives::crypto::{address_from_pubkey, sign_ed25519};
use basalt_primitives::{Address, BlockHeader, CommitId, Height};
use basalt_store::{KvPair, MultiStore};

pub const CHAIN_ID: &str = "basalt-test";

/// Deterministic test account.
pub struct User {
    pub key: SigningKey,
    pub address: Address,
}

impl User {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let address = address_from_pubkey(&key.verifying_key().to_bytes());
        Self { key, address }
    }

    pub fn send_to(&self, to: &User, amount: u64) -> StdMsg {
        StdMsg::Send(MsgSend {
            from: self.address,
            to: to.address,
            amount,
        })
    }

    /// Build `msgs` into a transaction signed by this user alone.
    pub fn signed_tx(&self, msgs: Vec<StdMsg>, sequence: u64, fee: Fee) -> Tx<StdMsg> {
        let mut tx = Tx {
            msgs,
            fee,
            signatures: Vec::new(),
            memo: String::new(),
        };
        let signature = sign_ed25519(&tx.sign_doc(CHAIN_ID, sequence), &self.key);
        tx.signatures.push(TxSignature {
            pub_key: self.key.verifying_key().to_bytes(),
            signature,
            sequence,
        });
        tx
    }

    /// Sign `msgs` as the only signer and encode the transaction.
    pub fn sign(&self, msgs: Vec<StdMsg>, sequence: u64, fee: Fee) -> Vec<u8> {
        encode_tx(&self.signed_tx(msgs, sequence, fee))
    }

    /// A single transfer with a small fee and ample gas.
    pub fn transfer(&self, to: &User, amount: u64, sequence: u64) -> Vec<u8> {
        self.sign(vec![self.send_to(to, amount)], sequence, fee(10, 200_000))
    }
}

pub fn fee(amount: u64, gas: u64) -> Fee {
    Fee { amount, gas }
}

pub fn alice() -> User {
    User::new(1)
}

pub fn bob() -> User {
    User::new(2)
}

pub fn carol() -> User {
    User::new(3)
}

pub fn config() -> AppConfig {
    AppConfig {
        chain_id: CHAIN_ID.into(),
        ..AppConfig::default()
    }
}

pub fn genesis(balances: &[(&User, u64)]) -> Vec<u8> {
    GenesisState {
        accounts: balances
            .iter()
            .map(|(user, balance)| GenesisAccount {
                address: hex::encode(user.address),
                balance: *balance,
            })
            .collect(),
    }
    .to_json()
    .unwrap()
}

/// The reference app after `init_chain` with alice at 1000 and bob at 500.
pub fn started_app(config: AppConfig) -> (BlockCoordinator<StdMsg>, StdKeys) {
    let (app, keys) = std_app(config).unwrap();
    app.init_chain(InitChainRequest {
        chain_id: CHAIN_ID.into(),
        app_state: genesis(&[(&alice(), 1_000), (&bob(), 500)]),
        ..InitChainRequest::default()
    })
    .unwrap();
    (app, keys)
}

pub fn header(height: Height) -> BlockHeader {
    BlockHeader {
        height,
        time: 1_700_000_000 + height,
        ..BlockHeader::genesis(CHAIN_ID, 0)
    }
}

pub fn begin(app: &BlockCoordinator<StdMsg>, height: Height) {
    app.begin_block(BeginBlockRequest {
        header: header(height),
        ..BeginBlockRequest::default()
    })
    .unwrap();
}

/// End and commit the current block.
pub fn finish(app: &BlockCoordinator<StdMsg>, height: Height) -> CommitId {
    app.end_block(EndBlockRequest { height }).unwrap();
    app.commit().unwrap()
}

/// Run an empty block.
pub fn empty_block(app: &BlockCoordinator<StdMsg>, height: Height) -> CommitId {
    begin(app, height);
    finish(app, height)
}

/// Committed balance of `user`, or 0 if the account does not exist.
pub fn balance(app: &BlockCoordinator<StdMsg>, keys: &StdKeys, user: &User) -> u64 {
    account(app, keys, &user.address).map_or(0, |a| a.balance)
}

pub fn account(
    app: &BlockCoordinator<StdMsg>,
    keys: &StdKeys,
    address: &Address,
) -> Option<basalt_engine::Account> {
    let res = app.query(&keys.acc, address, 0, false).unwrap();
    res.value
        .map(|bytes| basalt_engine::Account::decode(&bytes).unwrap())
}

/// Every committed entry of the `acc` store, in key order.
pub fn acc_entries(app: &BlockCoordinator<StdMsg>, keys: &StdKeys) -> Vec<KvPair> {
    let root = app.root();
    let store = root.get_store(&keys.acc).unwrap();
    let entries = store.iter(None, None).collect();
    entries
}
