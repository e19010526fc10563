//! Record sink contract and implementations.
//!
//! The engine emits schemas, records, and state snapshots through the
//! object-safe [`RecordSink`] trait. Sink I/O failure is fatal to the
//! run; the engine logs stream and record context before propagating.

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use linktap_types::error::{Result, TapError};
use linktap_types::state::SyncState;
use serde_json::{json, Value};

/// Downstream consumer of the standardized record stream.
pub trait RecordSink: Send + Sync {
    /// Announce a stream's schema and key properties.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Sink`] on I/O failure (fatal).
    fn write_schema(&self, stream: &str, schema: &Value, key_properties: &[String]) -> Result<()>;

    /// Emit one cleaned record with its page-level extraction timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Sink`] on I/O failure (fatal).
    fn write_record(&self, stream: &str, record: &Value, time_extracted: DateTime<Utc>)
        -> Result<()>;

    /// Emit a state snapshot after a bookmark mutation.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Sink`] on I/O failure (fatal).
    fn write_state(&self, state: &SyncState) -> Result<()>;
}

/// Singer-message-shaped JSONL sink over any writer (stdout in
/// production).
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    fn write_message(&self, stream: &str, message: &Value) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| TapError::Sink {
            stream: stream.to_string(),
            message: "sink lock poisoned".to_string(),
        })?;
        serde_json::to_writer(&mut *writer, message)
            .map_err(|err| TapError::Sink { stream: stream.to_string(), message: err.to_string() })?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|err| TapError::Sink { stream: stream.to_string(), message: err.to_string() })
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write_schema(&self, stream: &str, schema: &Value, key_properties: &[String]) -> Result<()> {
        self.write_message(
            stream,
            &json!({
                "type": "SCHEMA",
                "stream": stream,
                "schema": schema,
                "key_properties": key_properties,
            }),
        )
    }

    fn write_record(
        &self,
        stream: &str,
        record: &Value,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        self.write_message(
            stream,
            &json!({
                "type": "RECORD",
                "stream": stream,
                "record": record,
                "time_extracted": time_extracted.to_rfc3339(),
            }),
        )
    }

    fn write_state(&self, state: &SyncState) -> Result<()> {
        self.write_message("", &json!({"type": "STATE", "value": state}))
    }
}

/// One captured record emission.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedRecord {
    pub stream: String,
    pub record: Value,
    pub time_extracted: DateTime<Utc>,
}

/// In-memory sink capturing emissions, for tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EmittedRecord>>,
    schemas: Mutex<Vec<String>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured record emissions, in order.
    ///
    /// # Panics
    ///
    /// Panics if a previous test thread panicked while holding the lock.
    #[must_use]
    pub fn records(&self) -> Vec<EmittedRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Captured records for one stream.
    #[must_use]
    pub fn records_for(&self, stream: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|emitted| emitted.stream == stream)
            .map(|emitted| emitted.record)
            .collect()
    }

    /// Stream names whose schemas were announced, in order.
    ///
    /// # Panics
    ///
    /// Panics if a previous test thread panicked while holding the lock.
    #[must_use]
    pub fn schema_streams(&self) -> Vec<String> {
        self.schemas.lock().unwrap().clone()
    }
}

impl RecordSink for CollectingSink {
    fn write_schema(&self, stream: &str, _schema: &Value, _key_properties: &[String]) -> Result<()> {
        self.schemas.lock().unwrap().push(stream.to_string());
        Ok(())
    }

    fn write_record(
        &self,
        stream: &str,
        record: &Value,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        self.records.lock().unwrap().push(EmittedRecord {
            stream: stream.to_string(),
            record: record.clone(),
            time_extracted,
        });
        Ok(())
    }

    fn write_state(&self, _state: &SyncState) -> Result<()> {
        Ok(())
    }
}
