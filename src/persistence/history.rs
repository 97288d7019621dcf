//! Backup ring and snapshot catalog
//!
//! Both are bounded FIFO logs of full-document copies, newest last, stored
//! under their own keys so a corrupted root document never takes its own
//! recovery path down with it.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::repair_structure;
use crate::document::ClaimDocument;

/// Why a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackupReason {
    /// Before every save
    Auto,
    /// User asked for one
    #[default]
    Manual,
    /// Before restoring another backup
    PreRestore,
    /// Before importing an export file
    PreImport,
    /// Before restoring a snapshot
    PreSnapshotRestore,
}

impl BackupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupReason::Auto => "auto",
            BackupReason::Manual => "manual",
            BackupReason::PreRestore => "pre-restore",
            BackupReason::PreImport => "pre-import",
            BackupReason::PreSnapshotRestore => "pre-snapshot-restore",
        }
    }
}

impl FromStr for BackupReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BackupReason::Auto),
            "manual" => Ok(BackupReason::Manual),
            "pre-restore" => Ok(BackupReason::PreRestore),
            "pre-import" => Ok(BackupReason::PreImport),
            "pre-snapshot-restore" => Ok(BackupReason::PreSnapshotRestore),
            other => Err(format!("unknown backup reason `{other}`")),
        }
    }
}

impl fmt::Display for BackupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Automatic point-in-time copy of the root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: i64,
    pub timestamp: i64,
    pub reason: BackupReason,
    pub data: ClaimDocument,
}

/// User-named point-in-time copy of the root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: i64,
    pub label: String,
    pub data: ClaimDocument,
}

/// A record kept in a [`HistoryLog`]
pub trait HistoryRecord: Serialize + DeserializeOwned {
    /// Noun used in log messages
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn data(&self) -> &ClaimDocument;
}

impl HistoryRecord for Backup {
    const KIND: &'static str = "backup";

    fn id(&self) -> i64 {
        self.id
    }
    fn data(&self) -> &ClaimDocument {
        &self.data
    }
}

impl HistoryRecord for Snapshot {
    const KIND: &'static str = "snapshot";

    fn id(&self) -> i64 {
        self.id
    }
    fn data(&self) -> &ClaimDocument {
        &self.data
    }
}

/// Bounded FIFO log, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLog<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T: HistoryRecord> HistoryLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Decode a stored log
    ///
    /// A record whose `data` is mistyped keeps its metadata and gets repaired
    /// data; only records with unreadable metadata are skipped. A log over
    /// capacity is trimmed from the front.
    pub fn decode(raw: &str, capacity: usize) -> Result<Self, serde_json::Error> {
        let values: Vec<Value> = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(values.len());
        for value in values {
            match decode_record::<T>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Dropping unreadable {}: {}", T::KIND, e),
            }
        }
        let mut log = Self { entries, capacity };
        log.evict();
        Ok(log)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }

    /// Id for a record created at `now_ms`, unique within this log
    pub fn next_id(&self, now_ms: i64) -> i64 {
        match self.entries.last() {
            Some(last) if last.id() >= now_ms => last.id().saturating_add(1),
            _ => now_ms,
        }
    }

    /// Append, evicting the oldest entries past capacity
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
        self.evict();
    }

    fn evict(&mut self) {
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }

    pub fn find(&self, id: i64) -> Option<&T> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }
}

fn decode_record<T: HistoryRecord>(value: Value) -> Result<T, serde_json::Error> {
    let err = match serde_json::from_value::<T>(value.clone()) {
        Ok(entry) => return Ok(entry),
        Err(e) => e,
    };
    let Value::Object(mut record) = value else {
        return Err(err);
    };
    let stamped = record
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let data = record.remove("data").unwrap_or(Value::Null);
    log::warn!("Repairing {} data: {}", T::KIND, err);
    record.insert("data".into(), repair_structure(data, stamped).to_value());
    serde_json::from_value(Value::Object(record))
}
