//! Save/load persistence with recovery
//!
//! Features:
//! - Versioned root document with schema migration (incl. legacy flat keys)
//! - Structural validation and repair
//! - Bounded backup ring and snapshot catalog
//! - Versioned export/import envelope

pub mod envelope;
pub mod error;
pub mod history;
pub mod migration;
pub mod store;
pub mod validation;

pub use envelope::{EnvelopeError, TransferEnvelope, export_file_name};
pub use error::StoreError;
pub use history::{Backup, BackupReason, HistoryLog, Snapshot};
pub use migration::{LEGACY_KEYS, is_stale, migrate};
pub use store::ClaimStore;
pub use validation::{repair_structure, validate_structure};
