//! The three-phase transaction pipeline.
//!
//! ```text
//! decode ─► validate_basic ─► ante (branch A) ─► messages (branch B)
//!                               │ write on Ok        │ write on Ok (not Simulate)
//!                               ▼                    ▼
//!                          input state          input state
//! ```
//!
//! Every failure becomes a `TxResult` code. Ante effects that were flushed
//! stand even when a message fails afterwards.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use basalt_primitives::codec::Writer;
use basalt_primitives::{BlockHeader, ErrorCode, ExecError, ExecResult, GasMeter, KvGasConfig};
use basalt_store::{CacheMultiStore, KvStore};

use crate::ante::AnteHandler;
use crate::codec::TxDecoder;
use crate::context::{Context, Event, ExecMode};
use crate::router::Router;
use crate::tx::{Msg, Tx};

/// Codespace attached to every failed result.
pub const CODESPACE: &str = "basalt";

/// Outcome of one transaction in any mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub code: u32,
    pub codespace: String,
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub events: Vec<Event>,
}

impl TxResult {
    pub fn from_error(err: &ExecError, gas_wanted: u64, gas_used: u64) -> Self {
        Self {
            code: err.code().as_u32(),
            codespace: CODESPACE.to_string(),
            log: err.to_string(),
            gas_wanted,
            gas_used,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok.as_u32()
    }

    /// The result code as an `ErrorCode`, if it is a known one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.code)
    }

    fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }
}

/// Output of a successful message stage.
struct MsgOutput {
    data: Vec<u8>,
    log: String,
}

/// Decoder, ante stage and router for one application.
pub struct Pipeline<M> {
    decoder: TxDecoder<M>,
    ante: Box<dyn AnteHandler<M>>,
    router: Router<M>,
    kv_gas: KvGasConfig,
}

impl<M: Msg> Pipeline<M> {
    pub fn new(
        decoder: TxDecoder<M>,
        ante: Box<dyn AnteHandler<M>>,
        router: Router<M>,
        kv_gas: KvGasConfig,
    ) -> Self {
        Self {
            decoder,
            ante,
            router,
            kv_gas,
        }
    }

    pub fn router(&self) -> &Router<M> {
        &self.router
    }

    pub fn decode(&self, raw: &[u8]) -> ExecResult<Tx<M>> {
        (self.decoder)(raw)
    }

    /// Run `raw` against `state` in `mode`.
    ///
    /// In Deliver mode the gas used is also charged to `block_gas`; a
    /// transaction that overflows it loses its message stage and exhausts the
    /// block meter. Other modes leave `block_gas` alone.
    pub fn run_tx<P: KvStore>(
        &self,
        mode: ExecMode,
        header: &BlockHeader,
        state: &mut CacheMultiStore<P>,
        raw: &[u8],
        block_gas: &mut GasMeter,
    ) -> TxResult {
        let tx = match self.decode(raw) {
            Ok(tx) => tx,
            Err(err) => return TxResult::from_error(&err, 0, 0),
        };
        let gas_wanted = tx.fee.gas;
        if let Err(err) = tx.validate_basic() {
            return TxResult::from_error(&err, gas_wanted, 0);
        }

        let mut meter = match mode {
            ExecMode::Simulate => GasMeter::unlimited(),
            _ => GasMeter::new(gas_wanted),
        };

        let mut events = match self.run_ante(mode, header, state, &tx, raw.len(), &mut meter) {
            Ok(events) => events,
            Err(err) => return failed(mode, &err, gas_wanted, &mut meter, block_gas),
        };
        if mode == ExecMode::Check {
            return TxResult {
                gas_wanted,
                gas_used: meter.consumed(),
                events,
                ..TxResult::default()
            };
        }

        let mut branch = state.cache_wrap();
        let (result, msg_events) = {
            let mut ctx = Context::new(&mut branch, &mut meter, header, mode, self.kv_gas);
            let result = self.run_msgs(&mut ctx, &tx);
            (result, ctx.into_events())
        };

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                branch.discard();
                return failed(mode, &err, gas_wanted, &mut meter, block_gas).with_events(events);
            }
        };

        if mode == ExecMode::Deliver {
            if let Err(err) = block_gas.consume(meter.consumed()) {
                warn!(
                    gas_used = meter.consumed(),
                    block_gas_used = block_gas.consumed(),
                    "transaction overflows block gas limit"
                );
                branch.discard();
                block_gas.exhaust();
                return TxResult::from_error(&err, gas_wanted, meter.consumed()).with_events(events);
            }
            branch.write();
        }

        events.extend(msg_events);
        debug!(
            ?mode,
            gas_wanted,
            gas_used = meter.consumed(),
            msgs = tx.msgs.len(),
            "transaction succeeded"
        );
        TxResult {
            data: output.data,
            log: output.log,
            gas_wanted,
            gas_used: meter.consumed(),
            events,
            ..TxResult::default()
        }
    }

    fn run_ante<P: KvStore>(
        &self,
        mode: ExecMode,
        header: &BlockHeader,
        state: &mut CacheMultiStore<P>,
        tx: &Tx<M>,
        tx_len: usize,
        meter: &mut GasMeter,
    ) -> ExecResult<Vec<Event>> {
        let mut branch = state.cache_wrap();
        let (result, events) = {
            let mut ctx = Context::new(&mut branch, meter, header, mode, self.kv_gas);
            let result = self.ante.ante(&mut ctx, tx, tx_len);
            (result, ctx.into_events())
        };
        result?;
        branch.write();
        Ok(events)
    }

    fn run_msgs(&self, ctx: &mut Context<'_>, tx: &Tx<M>) -> ExecResult<MsgOutput> {
        let mut data = Writer::new();
        data.u32(tx.msgs.len() as u32);
        let mut logs = Vec::with_capacity(tx.msgs.len());

        for (index, msg) in tx.msgs.iter().enumerate() {
            let handler = self.router.route(msg.route()).ok_or_else(|| {
                ExecError::UnknownRequest(format!(
                    "unroutable message: no route {:?} for message {index}",
                    msg.route()
                ))
            })?;
            let result = handler(ctx, msg)?;
            data.var_bytes(&result.data);
            if !result.log.is_empty() {
                logs.push(result.log);
            }
        }

        Ok(MsgOutput {
            data: data.finish(),
            log: logs.join("; "),
        })
    }
}

/// Build the result for a failed stage and settle gas.
fn failed(
    mode: ExecMode,
    err: &ExecError,
    gas_wanted: u64,
    meter: &mut GasMeter,
    block_gas: &mut GasMeter,
) -> TxResult {
    if err.is_out_of_gas() {
        meter.exhaust();
    }
    if let ExecError::CapabilityViolation(store) = err {
        error!(store = %store, "transaction used an unmounted store key");
    }
    if mode == ExecMode::Deliver && block_gas.consume(meter.consumed()).is_err() {
        block_gas.exhaust();
    }
    debug!(?mode, code = %err.code(), gas_used = meter.consumed(), "transaction failed: {err}");
    TxResult::from_error(err, gas_wanted, meter.consumed())
}
