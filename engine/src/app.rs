//! Reference application: accounts, the bank module, and the standard ante
//! stage wired into a block coordinator.

use serde::{Deserialize, Serialize};
use tracing::info;

use basalt_primitives::{Address, ExecError, ExecResult};
use basalt_store::{RootMultiStore, StoreKey, StoreKind};

use crate::account::{Account, AccountKeeper};
use crate::ante::AuthAnteHandler;
use crate::bank::{self, BankKeeper, BankMsg, MsgSend};
use crate::codec::{decode_tx, RawAny};
use crate::config::AppConfig;
use crate::context::Context;
use crate::coordinator::{BlockCoordinator, Hooks, InitChainRequest};
use crate::error::EngineError;
use crate::pipeline::Pipeline;
use crate::router::Router;
use crate::tx::Msg;

/// Messages of the reference application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdMsg {
    Send(MsgSend),
}

impl Msg for StdMsg {
    fn route(&self) -> &str {
        match self {
            Self::Send(_) => bank::ROUTE,
        }
    }

    fn msg_type(&self) -> &str {
        match self {
            Self::Send(_) => "send",
        }
    }

    fn validate_basic(&self) -> ExecResult<()> {
        match self {
            Self::Send(msg) => msg.validate_basic(),
        }
    }

    fn sign_bytes(&self) -> Vec<u8> {
        match self {
            Self::Send(msg) => msg.sign_bytes(),
        }
    }

    fn signers(&self) -> Vec<Address> {
        match self {
            Self::Send(msg) => vec![msg.from],
        }
    }

    fn to_any(&self) -> RawAny {
        match self {
            Self::Send(msg) => msg.to_any(),
        }
    }

    fn from_any(any: &RawAny) -> ExecResult<Self> {
        match any.type_url.as_str() {
            MsgSend::TYPE_URL => MsgSend::from_any(any).map(Self::Send),
            other => Err(ExecError::TxDecode(format!("unknown message type {other:?}"))),
        }
    }
}

impl BankMsg for StdMsg {
    fn as_send(&self) -> Option<&MsgSend> {
        match self {
            Self::Send(msg) => Some(msg),
        }
    }
}

/// Genesis document carried in `InitChainRequest::app_state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Hex-encoded 20-byte address.
    pub address: String,
    pub balance: u64,
}

impl GenesisState {
    pub fn from_json(bytes: &[u8]) -> ExecResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
            .map_err(|e| ExecError::Internal(format!("invalid genesis: {e}")))
    }

    pub fn to_json(&self) -> ExecResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ExecError::Internal(format!("genesis encoding: {e}")))
    }
}

fn parse_address(hex_addr: &str) -> ExecResult<Address> {
    let bytes = hex::decode(hex_addr)
        .map_err(|e| ExecError::InvalidAddress(format!("{hex_addr}: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ExecError::InvalidAddress(format!("{hex_addr}: expected 20 bytes")))
}

/// Loads genesis accounts at `init_chain`.
#[derive(Debug, Clone)]
pub struct StdHooks {
    accounts: AccountKeeper,
}

impl StdHooks {
    pub fn new(accounts: AccountKeeper) -> Self {
        Self { accounts }
    }
}

impl Hooks for StdHooks {
    fn init_chain(&self, ctx: &mut Context<'_>, req: &InitChainRequest) -> ExecResult<()> {
        let genesis = GenesisState::from_json(&req.app_state)?;
        for entry in &genesis.accounts {
            let address = parse_address(&entry.address)?;
            self.accounts
                .set(ctx, &Account::with_balance(address, entry.balance))?;
        }
        info!(accounts = genesis.accounts.len(), "loaded genesis accounts");
        Ok(())
    }
}

/// Store keys of the reference application.
#[derive(Debug, Clone)]
pub struct StdKeys {
    pub acc: StoreKey,
}

/// Build the reference application: an `acc` Merkle store, the bank route,
/// and the standard ante stage.
pub fn std_app(config: AppConfig) -> Result<(BlockCoordinator<StdMsg>, StdKeys), EngineError> {
    config.validate()?;
    let acc = StoreKey::new("acc");
    let mut root = RootMultiStore::new(config.pruning);
    root.mount(acc.clone(), StoreKind::Merkle)?;

    let accounts = AccountKeeper::new(acc.clone());
    let mut router = Router::new();
    router.add_route(bank::ROUTE, bank::handler(BankKeeper::new(accounts.clone())))?;
    let ante = AuthAnteHandler::new(accounts.clone(), &config);
    let pipeline = Pipeline::new(decode_tx::<StdMsg>, Box::new(ante), router, config.kv_gas);

    let coordinator = BlockCoordinator::new(
        config,
        root,
        pipeline,
        Box::new(StdHooks::new(accounts)),
    )?;
    Ok((coordinator, StdKeys { acc }))
}
