//! `basalt-engine`: transaction pipeline and block coordinator.
//!
//! This crate turns raw transaction bytes into state changes on a
//! `basalt-store` multistore:
//!
//! - [`tx`] / [`codec`]: the transaction model and its protobuf wire format
//! - [`context::Context`]: gas-metered store access handed to handlers
//! - [`router::Router`]: route-keyed message handlers
//! - [`ante`]: authentication and fee charging before any message runs
//! - [`pipeline::Pipeline`]: decode, validate, ante, messages, result
//! - [`coordinator::BlockCoordinator`]: the block lifecycle and the
//!   DeliverState / CheckState branches
//! - [`app`]: the reference application (accounts plus bank transfers)

pub mod error;
pub mod config;
pub mod tx;
pub mod codec;
pub mod context;
pub mod router;
pub mod account;
pub mod bank;
pub mod ante;
pub mod pipeline;
pub mod coordinator;
pub mod app;

// Re-export key types for convenience
pub use error::EngineError;
pub use config::AppConfig;
pub use tx::{Fee, Msg, Tx, TxSignature};
pub use codec::{decode_tx, encode_tx, RawAny, TxDecoder};
pub use context::{Context, Event, EventAttribute, ExecMode};
pub use router::{Handler, MsgResult, Router};
pub use account::{module_address, Account, AccountKeeper, FEE_COLLECTOR};
pub use bank::{BankKeeper, BankMsg, MsgSend};
pub use ante::{AnteHandler, AuthAnteHandler};
pub use pipeline::{Pipeline, TxResult};
pub use coordinator::{
    AppInfo, BeginBlockRequest, BlockCoordinator, ConsensusParams, EndBlockRequest,
    EndBlockResponse, Hooks, InitChainRequest, NoHooks, Phase,
};
pub use app::{std_app, GenesisAccount, GenesisState, StdHooks, StdKeys, StdMsg};
