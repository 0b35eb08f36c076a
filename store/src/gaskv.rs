//! Gas-metered store access.
//!
//! Transaction code never touches a store directly: the context hands out a
//! `GasKvStore` that charges the transaction's gas meter before each
//! operation and refuses keys or values over the size limits. Once the meter
//! fails, every further access fails too.

use basalt_primitives::{
    ExecError, ExecResult, GasMeter, KvGasConfig, MAX_KEY_LEN, MAX_VALUE_LEN,
};

use crate::kv::{KvIter, KvPair, KvStoreMut};

/// A store wrapper that charges `meter` for every access.
pub struct GasKvStore<'a> {
    parent: Box<dyn KvStoreMut + 'a>,
    meter: &'a mut GasMeter,
    config: KvGasConfig,
}

impl<'a> GasKvStore<'a> {
    pub fn new(
        parent: Box<dyn KvStoreMut + 'a>,
        meter: &'a mut GasMeter,
        config: KvGasConfig,
    ) -> Self {
        Self {
            parent,
            meter,
            config,
        }
    }

    /// Gas consumed so far on the underlying meter.
    pub fn gas_consumed(&self) -> u64 {
        self.meter.consumed()
    }

    pub fn get(&mut self, key: &[u8]) -> ExecResult<Option<Vec<u8>>> {
        check_key(key)?;
        self.meter.consume(self.config.read_cost_flat)?;
        let value = self.parent.get(key);
        let bytes = key.len() + value.as_ref().map_or(0, Vec::len);
        self.meter
            .consume(self.config.read_cost(bytes) - self.config.read_cost_flat)?;
        Ok(value)
    }

    pub fn has(&mut self, key: &[u8]) -> ExecResult<bool> {
        check_key(key)?;
        self.meter.consume(self.config.has_cost)?;
        Ok(self.parent.has(key))
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> ExecResult<()> {
        check_key(key)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(ExecError::Internal(format!(
                "value too large: {} bytes (max {MAX_VALUE_LEN})",
                value.len()
            )));
        }
        self.meter
            .consume(self.config.write_cost(key.len() + value.len()))?;
        self.parent.set(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> ExecResult<()> {
        check_key(key)?;
        self.meter.consume(self.config.delete_cost)?;
        self.parent.delete(key);
        Ok(())
    }

    /// Ascending iteration over `[start, end)`, charging per step.
    pub fn iter(&mut self, start: Option<&[u8]>, end: Option<&[u8]>) -> GasIter<'_> {
        GasIter {
            inner: self.parent.iter(start, end),
            meter: &mut *self.meter,
            config: self.config,
            done: false,
        }
    }

    /// Descending iteration over `[start, end)`, charging per step.
    pub fn reverse_iter(&mut self, start: Option<&[u8]>, end: Option<&[u8]>) -> GasIter<'_> {
        GasIter {
            inner: self.parent.reverse_iter(start, end),
            meter: &mut *self.meter,
            config: self.config,
            done: false,
        }
    }
}

fn check_key(key: &[u8]) -> ExecResult<()> {
    if key.is_empty() {
        return Err(ExecError::Internal("empty store key".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ExecError::Internal(format!(
            "key too large: {} bytes (max {MAX_KEY_LEN})",
            key.len()
        )));
    }
    Ok(())
}

/// Iterator that charges the meter for each entry it yields. The first
/// failed charge is yielded as an error and ends the iteration.
pub struct GasIter<'b> {
    inner: KvIter<'b>,
    meter: &'b mut GasMeter,
    config: KvGasConfig,
    done: bool,
}

impl Iterator for GasIter<'_> {
    type Item = ExecResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (key, value) = self.inner.next()?;
        if let Err(e) = self.meter.consume(self.config.iter_cost(key.len() + value.len())) {
            self.done = true;
            return Some(Err(e));
        }
        Some(Ok((key, value)))
    }
}
