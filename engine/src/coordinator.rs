//! Block lifecycle driven by the consensus engine.
//!
//! ```text
//! Idle ──begin_block──► InBlock ──deliver_tx──► Delivering ──end_block──► Ended
//!  ▲                                                                       │
//!  └───────────────────────────────── commit ──────────────────────────────┘
//! ```
//!
//! The coordinator owns the authoritative multistore and two cache branches
//! over it: DeliverState for the block being executed and CheckState for
//! mempool validation. Locks are always taken in the order block, check,
//! root.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use basalt_primitives::crypto::tx_hash;
use basalt_primitives::{
    BlockHeader, CommitId, ExecError, ExecResult, GasMeter, Hash, Height, LastCommitInfo,
    Misbehavior, ValidatorUpdate, Version,
};
use basalt_store::{BranchStore, QueryResponse, RootMultiStore, StoreKey, TraceContext, TraceSink};

use crate::config::AppConfig;
use crate::context::{Context, ExecMode};
use crate::error::EngineError;
use crate::pipeline::{Pipeline, TxResult};
use crate::tx::Msg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Between blocks. `init_chain` and `begin_block` are allowed.
    Idle,
    /// `begin_block` ran; no transaction yet.
    InBlock,
    /// At least one `deliver_tx` ran.
    Delivering,
    /// `end_block` ran; only `commit` is allowed.
    Ended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChainRequest {
    pub chain_id: String,
    pub time: u64,
    pub validators: Vec<ValidatorUpdate>,
    /// Application genesis state, opaque to the coordinator.
    pub app_state: Vec<u8>,
    pub max_block_gas: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginBlockRequest {
    pub header: BlockHeader,
    pub last_commit_info: LastCommitInfo,
    pub byzantine_validators: Vec<Misbehavior>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndBlockRequest {
    pub height: Height,
}

/// Consensus parameters the application may change at end of block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub max_block_gas: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndBlockResponse {
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Applied from the next block on.
    pub consensus_params: Option<ConsensusParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub last_block_height: Height,
    pub last_app_hash: Hash,
}

/// Application callbacks around the block lifecycle. Each runs on
/// DeliverState with an unlimited gas meter.
pub trait Hooks: Send + Sync {
    fn init_chain(&self, _ctx: &mut Context<'_>, _req: &InitChainRequest) -> ExecResult<()> {
        Ok(())
    }

    fn begin_block(&self, _ctx: &mut Context<'_>, _req: &BeginBlockRequest) -> ExecResult<()> {
        Ok(())
    }

    fn end_block(
        &self,
        _ctx: &mut Context<'_>,
        _req: &EndBlockRequest,
    ) -> ExecResult<EndBlockResponse> {
        Ok(EndBlockResponse::default())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

struct CheckState {
    store: BranchStore,
    header: BlockHeader,
}

struct BlockState {
    phase: Phase,
    deliver: Option<BranchStore>,
    header: BlockHeader,
    block_gas: GasMeter,
    max_block_gas: Option<u64>,
    /// Set by `end_block`, applied at `commit`.
    next_max_block_gas: Option<Option<u64>>,
}

pub struct BlockCoordinator<M> {
    config: AppConfig,
    pipeline: Pipeline<M>,
    hooks: Box<dyn Hooks>,
    block: Mutex<BlockState>,
    check: Mutex<CheckState>,
    root: RwLock<RootMultiStore>,
}

impl<M: Msg> BlockCoordinator<M> {
    /// Wrap a root multistore whose sub-stores are already mounted.
    pub fn new(
        config: AppConfig,
        root: RootMultiStore,
        pipeline: Pipeline<M>,
        hooks: Box<dyn Hooks>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let header = BlockHeader::genesis(config.chain_id.clone(), 0);
        let check = CheckState {
            store: root.cache_multi_store(),
            header: header.clone(),
        };
        let block = BlockState {
            phase: Phase::Idle,
            deliver: None,
            header,
            block_gas: GasMeter::unlimited(),
            max_block_gas: config.max_block_gas,
            next_max_block_gas: None,
        };
        Ok(Self {
            config,
            pipeline,
            hooks,
            block: Mutex::new(block),
            check: Mutex::new(check),
            root: RwLock::new(root),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline<M> {
        &self.pipeline
    }

    pub fn phase(&self) -> Phase {
        self.block.lock().phase
    }

    /// Read access to the committed multistore.
    pub fn root(&self) -> RwLockReadGuard<'_, RootMultiStore> {
        self.root.read()
    }

    /// Attach a trace sink to every store view handed out from now on.
    /// CheckState is rebuilt, dropping its uncommitted writes.
    pub fn set_tracer(&self, sink: Arc<dyn TraceSink>) {
        let mut check = self.check.lock();
        let mut root = self.root.write();
        root.set_tracer(sink);
        check.store = root.cache_multi_store();
    }

    /// Run the genesis hook. Only allowed before the first block.
    pub fn init_chain(&self, req: InitChainRequest) -> Result<(), EngineError> {
        let mut block = self.block.lock();
        let root = self.root.read();
        if block.phase != Phase::Idle
            || block.deliver.is_some()
            || root.last_commit_id().version != 0
        {
            return Err(EngineError::InvalidPhase {
                operation: "init_chain",
                phase: block.phase,
            });
        }
        if req.chain_id != self.config.chain_id {
            return Err(EngineError::Config(format!(
                "chain id mismatch: configured {}, genesis {}",
                self.config.chain_id, req.chain_id
            )));
        }

        let header = BlockHeader::genesis(req.chain_id.clone(), req.time);
        let mut deliver = root.cache_multi_store();
        drop(root);
        {
            let mut meter = GasMeter::unlimited();
            let mut ctx = Context::new(
                &mut deliver,
                &mut meter,
                &header,
                ExecMode::Deliver,
                self.config.kv_gas,
            );
            self.hooks
                .init_chain(&mut ctx, &req)
                .map_err(|e| hook_error("init_chain", e))?;
        }

        if req.max_block_gas.is_some() {
            block.max_block_gas = req.max_block_gas;
        }
        block.deliver = Some(deliver);
        block.header = header.clone();
        self.check.lock().header = header;
        info!(chain_id = %req.chain_id, validators = req.validators.len(), "initialized chain");
        Ok(())
    }

    pub fn begin_block(&self, req: BeginBlockRequest) -> Result<(), EngineError> {
        let mut guard = self.block.lock();
        let block = &mut *guard;
        if block.phase != Phase::Idle {
            return Err(EngineError::InvalidPhase {
                operation: "begin_block",
                phase: block.phase,
            });
        }

        let root = self.root.read();
        let expected = root.last_commit_id().version + 1;
        if req.header.height != expected {
            return Err(EngineError::InvalidHeight {
                expected,
                got: req.header.height,
            });
        }
        let mut deliver = match block.deliver.take() {
            Some(carried) => carried,
            None => root.cache_multi_store(),
        };
        root.set_tracing_context(trace_context(req.header.height, None));
        drop(root);

        {
            let mut meter = GasMeter::unlimited();
            let mut ctx = Context::new(
                &mut deliver,
                &mut meter,
                &req.header,
                ExecMode::Deliver,
                self.config.kv_gas,
            );
            // a failed hook drops this block's DeliverState
            self.hooks
                .begin_block(&mut ctx, &req)
                .map_err(|e| hook_error("begin_block", e))?;
        }

        block.block_gas = match block.max_block_gas {
            Some(limit) => GasMeter::new(limit),
            None => GasMeter::unlimited(),
        };
        block.deliver = Some(deliver);
        block.header = req.header;
        block.phase = Phase::InBlock;
        debug!(height = block.header.height, max_block_gas = ?block.max_block_gas, "began block");
        Ok(())
    }

    pub fn deliver_tx(&self, raw: &[u8]) -> Result<TxResult, EngineError> {
        let mut guard = self.block.lock();
        let block = &mut *guard;
        if !matches!(block.phase, Phase::InBlock | Phase::Delivering) {
            return Err(EngineError::InvalidPhase {
                operation: "deliver_tx",
                phase: block.phase,
            });
        }
        block.phase = Phase::Delivering;

        if block.block_gas.is_exhausted() {
            let err = ExecError::OutOfGas {
                limit: block.block_gas.limit().unwrap_or(u64::MAX),
                used: block.block_gas.consumed(),
            };
            debug!(height = block.header.height, "block gas exhausted, rejecting transaction");
            return Ok(TxResult::from_error(&err, 0, 0));
        }

        self.root.read().set_tracing_context(trace_context(
            block.header.height,
            Some(&tx_hash(raw)),
        ));
        let deliver = block.deliver.as_mut().ok_or(EngineError::InvalidPhase {
            operation: "deliver_tx",
            phase: Phase::Idle,
        })?;
        Ok(self.pipeline.run_tx(
            ExecMode::Deliver,
            &block.header,
            deliver,
            raw,
            &mut block.block_gas,
        ))
    }

    pub fn end_block(&self, req: EndBlockRequest) -> Result<EndBlockResponse, EngineError> {
        let mut guard = self.block.lock();
        let block = &mut *guard;
        if !matches!(block.phase, Phase::InBlock | Phase::Delivering) {
            return Err(EngineError::InvalidPhase {
                operation: "end_block",
                phase: block.phase,
            });
        }
        if req.height != block.header.height {
            return Err(EngineError::InvalidHeight {
                expected: block.header.height,
                got: req.height,
            });
        }
        let deliver = block.deliver.as_mut().ok_or(EngineError::InvalidPhase {
            operation: "end_block",
            phase: Phase::Idle,
        })?;

        let response = {
            let mut meter = GasMeter::unlimited();
            let mut ctx = Context::new(
                deliver,
                &mut meter,
                &block.header,
                ExecMode::Deliver,
                self.config.kv_gas,
            );
            self.hooks
                .end_block(&mut ctx, &req)
                .map_err(|e| hook_error("end_block", e))?
        };

        if let Some(params) = &response.consensus_params {
            block.next_max_block_gas = Some(params.max_block_gas);
        }
        block.phase = Phase::Ended;
        debug!(
            height = block.header.height,
            block_gas_used = block.block_gas.consumed(),
            validator_updates = response.validator_updates.len(),
            "ended block"
        );
        Ok(response)
    }

    /// Persist DeliverState, advance the version, and rebuild CheckState.
    pub fn commit(&self) -> Result<CommitId, EngineError> {
        let mut guard = self.block.lock();
        let block = &mut *guard;
        if block.phase != Phase::Ended {
            return Err(EngineError::InvalidPhase {
                operation: "commit",
                phase: block.phase,
            });
        }
        let deliver = block.deliver.take().ok_or(EngineError::InvalidPhase {
            operation: "commit",
            phase: block.phase,
        })?;

        let mut check = self.check.lock();
        let mut root = self.root.write();
        root.write_cache(deliver)?;
        let commit_id = root.commit();

        check.store = root.cache_multi_store();
        check.header = BlockHeader {
            app_hash: commit_id.hash,
            ..block.header.clone()
        };
        if let Some(next) = block.next_max_block_gas.take() {
            block.max_block_gas = next;
        }
        block.phase = Phase::Idle;
        info!(
            height = commit_id.version,
            app_hash = %hex::encode(commit_id.hash),
            block_gas_used = block.block_gas.consumed(),
            "committed block"
        );
        Ok(commit_id)
    }

    /// Mempool validation on CheckState. Concurrent callers are serialized.
    pub fn check_tx(&self, raw: &[u8]) -> TxResult {
        let mut guard = self.check.lock();
        let check = &mut *guard;
        check
            .store
            .set_tracing_context(trace_context(check.header.height, Some(&tx_hash(raw))));
        let mut block_gas = GasMeter::unlimited();
        self.pipeline
            .run_tx(ExecMode::Check, &check.header, &mut check.store, raw, &mut block_gas)
    }

    /// Estimate gas on a throwaway branch of CheckState.
    pub fn simulate(&self, raw: &[u8]) -> TxResult {
        let mut guard = self.check.lock();
        let check = &mut *guard;
        let mut branch = check.store.cache_wrap();
        branch.set_tracing_context(trace_context(check.header.height, Some(&tx_hash(raw))));
        let mut block_gas = GasMeter::unlimited();
        self.pipeline
            .run_tx(ExecMode::Simulate, &check.header, &mut branch, raw, &mut block_gas)
    }

    /// Read committed state at `height` (0 = latest).
    pub fn query(
        &self,
        key: &StoreKey,
        data: &[u8],
        height: Version,
        prove: bool,
    ) -> Result<QueryResponse, EngineError> {
        Ok(self.root.read().query(key, data, height, prove)?)
    }

    pub fn info(&self) -> AppInfo {
        let last = self.root.read().last_commit_id();
        AppInfo {
            last_block_height: last.version,
            last_app_hash: last.hash,
        }
    }
}

fn hook_error(hook: &'static str, err: ExecError) -> EngineError {
    EngineError::Hook {
        hook,
        reason: err.to_string(),
    }
}

fn trace_context(height: Height, tx: Option<&Hash>) -> TraceContext {
    let mut context = TraceContext::new();
    context.insert("blockHeight".into(), height.to_string());
    if let Some(hash) = tx {
        context.insert("txHash".into(), hex::encode(hash));
    }
    context
}
