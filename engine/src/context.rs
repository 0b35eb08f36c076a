//! Per-stage execution context handed to ante handlers, message handlers
//! and application hooks.
//!
//! The context owns no state: it borrows the stage's cache branch and the
//! transaction gas meter, and every store it hands out is gas-metered.

use serde::{Deserialize, Serialize};

use basalt_primitives::{BlockHeader, ExecResult, GasMeter, Height, KvGasConfig};
use basalt_store::{GasKvStore, MultiStore, StoreKey};

/// Which pipeline is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Mempool validation: ante only, on CheckState.
    Check,
    /// Gas estimation: nothing is kept, signatures are not verified.
    Simulate,
    /// Block execution on DeliverState.
    Deliver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// A typed event with ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the first attribute named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

pub struct Context<'a> {
    store: &'a mut dyn MultiStore,
    gas_meter: &'a mut GasMeter,
    header: &'a BlockHeader,
    mode: ExecMode,
    kv_gas: KvGasConfig,
    events: Vec<Event>,
}

impl<'a> Context<'a> {
    pub fn new(
        store: &'a mut dyn MultiStore,
        gas_meter: &'a mut GasMeter,
        header: &'a BlockHeader,
        mode: ExecMode,
        kv_gas: KvGasConfig,
    ) -> Self {
        Self {
            store,
            gas_meter,
            header,
            mode,
            kv_gas,
            events: Vec::new(),
        }
    }

    /// Gas-metered access to the sub-store behind `key`. An unmounted key is
    /// a capability violation.
    pub fn kv_store(&mut self, key: &StoreKey) -> ExecResult<GasKvStore<'_>> {
        let store = self.store.get_kv_store(key)?;
        Ok(GasKvStore::new(store, &mut *self.gas_meter, self.kv_gas))
    }

    /// Charge gas outside of store access (signature checks, tx size).
    pub fn consume_gas(&mut self, amount: u64) -> ExecResult<()> {
        self.gas_meter.consume(amount)
    }

    pub fn gas_meter(&self) -> &GasMeter {
        self.gas_meter
    }

    pub fn header(&self) -> &BlockHeader {
        self.header
    }

    pub fn block_height(&self) -> Height {
        self.header.height
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn is_simulate(&self) -> bool {
        self.mode == ExecMode::Simulate
    }

    pub fn is_check(&self) -> bool {
        self.mode == ExecMode::Check
    }

    pub fn emit_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consume the context, returning the events emitted through it.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
