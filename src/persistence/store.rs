//! Persistence gateway
//!
//! [`ClaimStore`] is the only way the rest of the app touches claim data. Every
//! public operation is total: failures are logged and absorbed into a recovery
//! path or a `false`/`None` return, and the previously persisted state is left
//! as it was.
//!
//! Load pipeline: read → parse → (migrate | validate → decode | repair), with
//! backup restoration and a fresh default as the fallbacks for unreadable data.
//! The pipeline itself never writes; [`ClaimStore::load`] persists its result
//! once when it had to change anything.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::envelope::{TransferEnvelope, unwrap_envelope, unwrap_envelope_str};
use super::error::StoreError;
use super::history::{Backup, BackupReason, HistoryLog, HistoryRecord, Snapshot};
use super::migration::{LEGACY_KEYS, is_stale, migrate};
use super::validation::{repair_structure, validate_structure};
use crate::config::StoreConfig;
use crate::consts::*;
use crate::document::{ClaimDocument, Section, SectionValue};
use crate::platform::{Clock, StorageBackend, SystemClock};

/// How a stored root value was turned into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    /// Stored as-is, nothing to write back
    Valid,
    Migrated,
    Repaired,
}

/// Versioned claim document store over a key-value backend
pub struct ClaimStore<B, C = SystemClock> {
    backend: B,
    clock: C,
    config: StoreConfig,
}

impl<B: StorageBackend> ClaimStore<B, SystemClock> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SystemClock, StoreConfig::default())
    }
}

impl<B: StorageBackend, C: Clock> ClaimStore<B, C> {
    pub fn with_clock(backend: B, clock: C) -> Self {
        Self::with_config(backend, clock, StoreConfig::default())
    }

    pub fn with_config(backend: B, clock: C, config: StoreConfig) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // === Load / save ===

    /// Load the root document, initializing, upgrading or repairing as needed
    ///
    /// Never fails: unreadable data is replaced by the newest backup, or by a
    /// fresh default when there is none.
    pub fn load(&self) -> ClaimDocument {
        match self.read_root() {
            Ok(Some(value)) => self.settle(value),
            Ok(None) => {
                log::info!("No claim data found, initializing default");
                self.persist_default()
            }
            Err(StoreError::Backend(e)) => {
                log::error!("Claim storage unreadable, using in-memory default: {}", e);
                ClaimDocument::new(self.clock.now_ms())
            }
            Err(e) => {
                log::error!("Claim data corrupted: {}", e);
                if let Some(restored) = self.restore_from_backup() {
                    log::warn!("Claim data restored from backup");
                    return restored;
                }
                log::warn!("No backup available, starting fresh");
                self.persist_default()
            }
        }
    }

    /// Save `doc` as the new root document
    ///
    /// Stamps the write time and current schema version on a private copy,
    /// backs up the previously persisted document, then writes. Returns `false`
    /// if the write was rejected; stored data is then unchanged.
    pub fn save(&self, doc: &ClaimDocument) -> bool {
        let mut doc = doc.clone();
        match self.persist(&mut doc) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save claim data: {}", e);
                false
            }
        }
    }

    /// Whether the stored document passes structural validation
    pub fn validate(&self) -> bool {
        validate_structure(&self.load().to_value())
    }

    // === Sections ===

    pub fn get_section(&self, section: Section) -> SectionValue {
        self.load().section(section)
    }

    /// Replace one section (rewrites the whole document)
    pub fn set_section(&self, value: SectionValue) -> bool {
        let mut doc = self.load();
        doc.set_section(value);
        self.save(&doc)
    }

    /// Section lookup by wire name; unknown names yield `None`
    pub fn get_section_by_name(&self, name: &str) -> Option<Value> {
        match name.parse::<Section>() {
            Ok(section) => Some(self.get_section(section).to_value()),
            Err(e) => {
                log::warn!("Rejected section read: {}", e);
                None
            }
        }
    }

    /// Section update by wire name; unknown names and mistyped values are rejected
    pub fn set_section_by_name(&self, name: &str, value: Value) -> bool {
        let section = match name.parse::<Section>() {
            Ok(section) => section,
            Err(e) => {
                log::warn!("Rejected section write: {}", e);
                return false;
            }
        };
        match section.decode(value) {
            Ok(value) => self.set_section(value),
            Err(e) => {
                log::warn!("Rejected value for section {}: {}", section, e);
                false
            }
        }
    }

    /// Read a top-level key outside the known sections
    pub fn get_extra(&self, name: &str) -> Option<Value> {
        if Section::is_reserved_key(name) {
            return None;
        }
        self.load().extra.remove(name)
    }

    /// Write a top-level key outside the known sections
    pub fn set_extra(&self, name: &str, value: Value) -> bool {
        if Section::is_reserved_key(name) {
            log::warn!("Rejected extra section `{}`: name is reserved", name);
            return false;
        }
        let mut doc = self.load();
        doc.extra.insert(name.to_string(), value);
        self.save(&doc)
    }

    // === Repair ===

    /// Repair a candidate document and persist the result
    pub fn repair_structure(&self, value: Value) -> ClaimDocument {
        let mut doc = repair_structure(value, self.clock.now_ms());
        if let Err(e) = self.persist(&mut doc) {
            log::error!("Failed to save repaired claim data: {}", e);
        }
        doc
    }

    /// Rebuild the stored document and recompute every derived count
    pub fn reindex(&self) -> ClaimDocument {
        let doc = self.load();
        let before = (doc.evidence.count, doc.documents.count);
        let doc = self.repair_structure(doc.to_value());
        log::info!(
            "Reindexed claim data: evidence {} -> {}, documents {} -> {}",
            before.0,
            doc.evidence.count,
            before.1,
            doc.documents.count
        );
        doc
    }

    // === Backups ===

    /// Append a copy of the current stored document to the backup ring
    pub fn backup(&self, reason: BackupReason) -> bool {
        let doc = self.load();
        match self.append_backup(doc, reason) {
            Ok(id) => {
                log::info!("Backup {} created ({})", id, reason);
                true
            }
            Err(e) => {
                log::error!("Failed to create {} backup: {}", reason, e);
                false
            }
        }
    }

    /// Backups, oldest first
    pub fn list_backups(&self) -> Vec<Backup> {
        self.read_log::<Backup>(&self.config.backups_key, self.config.max_backups)
            .into_entries()
    }

    /// Overwrite the stored document with backup `id`
    ///
    /// The document being replaced is backed up first; if that fails nothing
    /// is restored.
    pub fn restore_backup(&self, id: i64) -> bool {
        let backups = self.read_log::<Backup>(&self.config.backups_key, self.config.max_backups);
        self.restore_record(&backups, id, BackupReason::PreRestore)
    }

    // === Snapshots ===

    /// Capture the stored document under `label` (a dated label if empty)
    pub fn create_snapshot(&self, label: &str) -> Option<i64> {
        let data = self.load();
        let mut snapshots = self.read_log::<Snapshot>(
            &self.config.snapshots_key,
            self.config.max_snapshots,
        );
        let now = self.clock.now_ms();
        let id = snapshots.next_id(now);
        let label = if label.trim().is_empty() {
            default_snapshot_label(now)
        } else {
            label.to_string()
        };
        snapshots.push(Snapshot {
            id,
            timestamp: now,
            label: label.clone(),
            data,
        });
        match self.write_log(&self.config.snapshots_key, &snapshots) {
            Ok(()) => {
                log::info!("Snapshot {} created: {}", id, label);
                Some(id)
            }
            Err(e) => {
                log::error!("Failed to create snapshot: {}", e);
                None
            }
        }
    }

    /// Snapshots, oldest first
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.read_log::<Snapshot>(&self.config.snapshots_key, self.config.max_snapshots)
            .into_entries()
    }

    /// Overwrite the stored document with snapshot `id` (backing up first)
    pub fn restore_snapshot(&self, id: i64) -> bool {
        let snapshots = self.read_log::<Snapshot>(
            &self.config.snapshots_key,
            self.config.max_snapshots,
        );
        self.restore_record(&snapshots, id, BackupReason::PreSnapshotRestore)
    }

    // === Export / import ===

    /// Wrap the current document in a transfer envelope
    pub fn export_envelope(&self) -> TransferEnvelope {
        TransferEnvelope::wrap(self.load(), self.clock.now_ms())
    }

    /// Pretty-printed export file contents
    pub fn export_as_json(&self) -> Option<String> {
        match self.export_envelope().to_json_pretty() {
            Ok(json) => Some(json),
            Err(e) => {
                log::error!("Failed to export claim data: {}", e);
                None
            }
        }
    }

    /// Import an export file's contents
    pub fn import_json(&self, raw: &str) -> bool {
        match unwrap_envelope_str(raw, self.clock.now_ms()) {
            Ok(doc) => self.apply_import(doc),
            Err(e) => {
                log::warn!("Import failed: {}", e);
                false
            }
        }
    }

    /// Import an already-parsed envelope
    pub fn import_value(&self, envelope: Value) -> bool {
        match unwrap_envelope(envelope, self.clock.now_ms()) {
            Ok(doc) => self.apply_import(doc),
            Err(e) => {
                log::warn!("Import failed: {}", e);
                false
            }
        }
    }

    // === Purge ===

    /// Remove every key the app has written, returning to a never-used state
    pub fn purge_all(&self) -> bool {
        let mut ok = true;
        let mut doomed: Vec<String> = self
            .config
            .owned_keys()
            .into_iter()
            .chain(LEGACY_KEYS)
            .map(str::to_string)
            .collect();
        match self.backend.keys() {
            Ok(keys) => doomed.extend(
                keys.into_iter()
                    .filter(|key| key.starts_with(&self.config.purge_prefix)),
            ),
            Err(e) => {
                log::error!("Failed to list keys for purge: {}", e);
                ok = false;
            }
        }
        doomed.sort();
        doomed.dedup();

        for key in &doomed {
            if let Err(e) = self.backend.remove(key) {
                log::error!("Failed to remove {}: {}", key, e);
                ok = false;
            }
        }

        if ok {
            log::info!("All claim data cleared");
        }
        ok
    }

    // === Internals ===

    fn read_root(&self) -> Result<Option<Value>, StoreError> {
        let key = &self.config.root_key;
        let raw = match self.backend.get(key)? {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        let value: Value = serde_json::from_str(&raw).map_err(|e| StoreError::parse(key, e))?;
        if !value.is_object() {
            return Err(StoreError::NotAnObject { key: key.clone() });
        }
        Ok(Some(value))
    }

    fn write_root(&self, doc: &ClaimDocument) -> Result<(), StoreError> {
        let raw = serde_json::to_string(doc).map_err(StoreError::Encode)?;
        self.backend.set(&self.config.root_key, &raw)?;
        Ok(())
    }

    /// Turn a parsed root value into a document without writing anything
    fn interpret(&self, value: Value) -> (ClaimDocument, LoadOutcome) {
        let now = self.clock.now_ms();
        if is_stale(&value) {
            return (migrate(&value, &self.backend, now), LoadOutcome::Migrated);
        }
        if validate_structure(&value) {
            match serde_json::from_value::<ClaimDocument>(value.clone()) {
                Ok(doc) => return (doc, LoadOutcome::Valid),
                Err(e) => log::warn!("Claim data fields unreadable, repairing: {}", e),
            }
        } else {
            log::warn!("Claim data structure invalid, repairing");
        }
        (repair_structure(value, now), LoadOutcome::Repaired)
    }

    /// Interpret a stored value and persist the result if it changed
    fn settle(&self, value: Value) -> ClaimDocument {
        let (mut doc, outcome) = self.interpret(value);
        if outcome != LoadOutcome::Valid {
            if let Err(e) = self.persist(&mut doc) {
                log::error!("Failed to save {:?} claim data: {}", outcome, e);
            }
        }
        doc
    }

    fn persist_default(&self) -> ClaimDocument {
        let mut doc = ClaimDocument::new(self.clock.now_ms());
        if let Err(e) = self.persist(&mut doc) {
            log::error!("Failed to save default claim data: {}", e);
        }
        doc
    }

    /// Stamp, back up the previous document, write
    fn persist(&self, doc: &mut ClaimDocument) -> Result<(), StoreError> {
        doc.timestamp = self.clock.now_ms();
        doc.schema_version = SCHEMA_VERSION;
        let raw = serde_json::to_string(doc).map_err(StoreError::Encode)?;

        match self.read_root() {
            Ok(Some(previous)) => {
                let (previous, _) = self.interpret(previous);
                if let Err(e) = self.append_backup(previous, BackupReason::Auto) {
                    log::warn!("Auto-backup skipped: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Previous claim data not backed up: {}", e),
        }

        self.backend.set(&self.config.root_key, &raw)?;
        Ok(())
    }

    fn append_backup(&self, data: ClaimDocument, reason: BackupReason) -> Result<i64, StoreError> {
        let mut backups = self.read_log::<Backup>(&self.config.backups_key, self.config.max_backups);
        let now = self.clock.now_ms();
        let id = backups.next_id(now);
        backups.push(Backup {
            id,
            timestamp: now,
            reason,
            data,
        });
        self.write_log(&self.config.backups_key, &backups)?;
        Ok(id)
    }

    /// Write the newest backup straight back as the root document
    fn restore_from_backup(&self) -> Option<ClaimDocument> {
        let backups = self.read_log::<Backup>(&self.config.backups_key, self.config.max_backups);
        let latest = backups.latest()?;
        match self.write_root(&latest.data) {
            Ok(()) => Some(latest.data.clone()),
            Err(e) => {
                log::error!("Failed to restore backup {}: {}", latest.id, e);
                None
            }
        }
    }

    fn restore_record<T: HistoryRecord>(
        &self,
        records: &HistoryLog<T>,
        id: i64,
        reason: BackupReason,
    ) -> bool {
        let Some(record) = records.find(id) else {
            let err = StoreError::NotFound { kind: T::KIND, id };
            log::warn!("Restore refused: {}", err);
            return false;
        };
        if !self.backup(reason) {
            log::error!("Restore of {} {} aborted: could not back up current data", T::KIND, id);
            return false;
        }
        match self.write_root(record.data()) {
            Ok(()) => {
                log::info!("Restored {} {}", T::KIND, id);
                true
            }
            Err(e) => {
                log::error!("Failed to restore {} {}: {}", T::KIND, id, e);
                false
            }
        }
    }

    fn apply_import(&self, doc: ClaimDocument) -> bool {
        if !self.backup(BackupReason::PreImport) {
            log::error!("Import aborted: could not back up current data");
            return false;
        }
        let saved = self.save(&doc);
        if saved {
            log::info!("Claim data imported");
        }
        saved
    }

    /// Read a history log; an unreadable log counts as empty
    fn read_log<T: HistoryRecord>(&self, key: &str, capacity: usize) -> HistoryLog<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HistoryLog::new(capacity),
            Err(e) => {
                log::warn!("Could not read {} list: {}", T::KIND, e);
                return HistoryLog::new(capacity);
            }
        };
        HistoryLog::decode(&raw, capacity).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable {} list: {}", T::KIND, e);
            HistoryLog::new(capacity)
        })
    }

    fn write_log<T: HistoryRecord>(&self, key: &str, log: &HistoryLog<T>) -> Result<(), StoreError> {
        let raw = log.encode().map_err(StoreError::Encode)?;
        self.backend.set(key, &raw)?;
        Ok(())
    }
}

fn default_snapshot_label(now_ms: i64) -> String {
    let at = DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_default();
    format!("Snapshot {}", at.format("%Y-%m-%d %H:%M:%S UTC"))
}
