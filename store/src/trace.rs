//! Operation tracing for store access.
//!
//! When a tracer is attached to the root multistore, every store handed out
//! (by the root or by any cache derived from it) is wrapped in a
//! `TraceStore` that reports reads, writes, deletes and iterated entries to a
//! `TraceSink`, tagged with the current tracing context (for example the
//! block height and the transaction hash).
//!
//! A failing sink never fails the store operation; the error is logged and
//! dropped.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::kv::{KvIter, KvStore, KvStoreMut};

/// Free-form metadata attached to every record.
pub type TraceContext = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOperation {
    Read,
    Write,
    Delete,
    IterKey,
}

/// One traced store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub operation: TraceOperation,
    pub store: String,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub metadata: TraceContext,
}

impl TraceRecord {
    /// Render as a single JSON line; key and value are hex-encoded.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Line<'a> {
            operation: TraceOperation,
            store: &'a str,
            key: String,
            value: Option<String>,
            metadata: &'a TraceContext,
        }
        serde_json::to_string(&Line {
            operation: self.operation,
            store: &self.store,
            key: hex::encode(&self.key),
            value: self.value.as_ref().map(hex::encode),
            metadata: &self.metadata,
        })
    }
}

/// Destination for trace records.
pub trait TraceSink: Send + Sync {
    fn record(&self, record: &TraceRecord) -> std::io::Result<()>;
}

/// Writes one JSON object per line to any `Write`.
pub struct WriterSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> TraceSink for WriterSink<W> {
    fn record(&self, record: &TraceRecord) -> std::io::Result<()> {
        let line = record.to_json()?;
        let mut out = self.out.lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")
    }
}

/// Keeps records in memory. Useful for inspecting a block's accesses.
#[derive(Debug, Default)]
pub struct BufferSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().clone()
    }

    pub fn take(&self) -> Vec<TraceRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl TraceSink for BufferSink {
    fn record(&self, record: &TraceRecord) -> std::io::Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Shared handle to a sink plus the current context.
///
/// Clones share the context, so updating it on the root is seen by every
/// cache derived from it.
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    context: Arc<RwLock<TraceContext>>,
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            sink,
            context: Arc::new(RwLock::new(TraceContext::new())),
        }
    }

    /// Replace the context attached to subsequent records.
    pub fn set_context(&self, context: TraceContext) {
        *self.context.write() = context;
    }

    pub fn context(&self) -> TraceContext {
        self.context.read().clone()
    }

    /// A tracer on the same sink with its own context. Later updates to
    /// either side are not seen by the other.
    pub fn detached(&self, context: TraceContext) -> Self {
        Self {
            sink: self.sink.clone(),
            context: Arc::new(RwLock::new(context)),
        }
    }

    fn emit(&self, operation: TraceOperation, store: &str, key: &[u8], value: Option<&[u8]>) {
        let record = TraceRecord {
            operation,
            store: store.to_string(),
            key: key.to_vec(),
            value: value.map(<[u8]>::to_vec),
            metadata: self.context.read().clone(),
        };
        if let Err(e) = self.sink.record(&record) {
            warn!(store, error = %e, "trace sink write failed");
        }
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("context", &*self.context.read())
            .finish_non_exhaustive()
    }
}

/// Store wrapper that reports every operation to a tracer.
pub struct TraceStore<S> {
    inner: S,
    store: String,
    tracer: Tracer,
}

impl<S: KvStore> TraceStore<S> {
    pub fn new(inner: S, store: impl Into<String>, tracer: Tracer) -> Self {
        Self {
            inner,
            store: store.into(),
            tracer,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn traced_iter<'a>(&'a self, iter: KvIter<'a>) -> KvIter<'a> {
        Box::new(iter.inspect(move |(k, v)| {
            self.tracer
                .emit(TraceOperation::IterKey, &self.store, k, Some(v.as_slice()));
        }))
    }
}

impl<S: KvStore> KvStore for TraceStore<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let value = self.inner.get(key);
        self.tracer
            .emit(TraceOperation::Read, &self.store, key, value.as_deref());
        value
    }

    fn has(&self, key: &[u8]) -> bool {
        self.inner.has(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        self.traced_iter(self.inner.iter(start, end))
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        self.traced_iter(self.inner.reverse_iter(start, end))
    }
}

impl<S: KvStoreMut> KvStoreMut for TraceStore<S> {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.tracer
            .emit(TraceOperation::Write, &self.store, key, Some(value));
        self.inner.set(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.tracer
            .emit(TraceOperation::Delete, &self.store, key, None);
        self.inner.delete(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemStore;

    struct FailingSink;

    impl TraceSink for FailingSink {
        fn record(&self, _record: &TraceRecord) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_records_operations_with_context() {
        let sink = Arc::new(BufferSink::new());
        let tracer = Tracer::new(sink.clone());
        tracer.set_context([("height".to_string(), "7".to_string())].into());

        let mut store = TraceStore::new(MemStore::new(), "bank", tracer);
        store.set(b"k", b"v");
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
        store.delete(b"k");

        let records = sink.records();
        let ops: Vec<_> = records.iter().map(|r| r.operation).collect();
        assert_eq!(
            ops,
            vec![
                TraceOperation::Write,
                TraceOperation::Read,
                TraceOperation::Delete
            ]
        );
        assert!(records.iter().all(|r| r.store == "bank"));
        assert_eq!(records[0].metadata.get("height").map(String::as_str), Some("7"));
        assert_eq!(records[2].value, None);
    }

    #[test]
    fn test_iteration_is_traced() {
        let sink = Arc::new(BufferSink::new());
        let mut inner = MemStore::new();
        inner.set(b"a", b"1");
        inner.set(b"b", b"2");
        let store = TraceStore::new(inner, "acc", Tracer::new(sink.clone()));

        assert_eq!(store.iter(None, None).count(), 2);
        let records = sink.take();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.operation == TraceOperation::IterKey));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_writer_sink_emits_json_lines() {
        let sink = WriterSink::new(Vec::new());
        let record = TraceRecord {
            operation: TraceOperation::Write,
            store: "bank".into(),
            key: vec![0xab, 0xcd],
            value: Some(vec![0x01]),
            metadata: TraceContext::new(),
        };
        sink.record(&record).unwrap();
        sink.record(&record).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["operation"], "write");
        assert_eq!(parsed["key"], "abcd");
        assert_eq!(parsed["value"], "01");
    }

    #[test]
    fn test_sink_failure_does_not_fail_store() {
        let mut store = TraceStore::new(
            MemStore::new(),
            "bank",
            Tracer::new(Arc::new(FailingSink)),
        );
        store.set(b"k", b"v");
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }
}
