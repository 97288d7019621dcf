//! Claim Store - versioned local document store for the claim assistant
//!
//! Core modules:
//! - `document`: Root document shape and typed sections
//! - `platform`: Storage backends and clocks (LocalStorage on web)
//! - `persistence`: Load/save gateway, validation, migration, backups, export
//! - `config`: Storage keys and retention caps

pub mod config;
pub mod document;
pub mod persistence;
pub mod platform;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::StoreConfig;
pub use document::{ClaimDocument, Section, SectionValue};
pub use persistence::{Backup, BackupReason, ClaimStore, Snapshot, TransferEnvelope};
pub use platform::{Clock, MemoryBackend, StorageBackend, SystemClock};

/// Store configuration constants
pub mod consts {
    /// Current root document schema version
    pub const SCHEMA_VERSION: u32 = 2;
    /// The only transfer envelope version accepted on import
    pub const EXPORT_VERSION: u32 = 1;

    /// Root document key
    pub const STORAGE_KEY: &str = "cn_storage_v2";
    /// Backup ring key
    pub const BACKUPS_KEY: &str = "cn_storage_backups";
    /// Snapshot catalog key
    pub const SNAPSHOTS_KEY: &str = "cn_snapshots";
    /// Prefix shared by every key this application has ever written
    pub const LEGACY_PREFIX: &str = "cn_";

    /// Backups kept before the oldest is evicted
    pub const MAX_BACKUPS: usize = 10;
    /// Snapshots kept before the oldest is evicted
    pub const MAX_SNAPSHOTS: usize = 20;

    /// Roadmap stage a fresh claim starts on
    pub const FIRST_STAGE: i64 = 1;
}
