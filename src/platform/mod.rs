//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Durable key-value storage (LocalStorage on web, a directory natively)
//! - Wall-clock time

pub mod storage;
pub mod time;

pub use storage::{BackendError, MemoryBackend, StorageBackend};
pub use time::{Clock, ManualClock, SystemClock};

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorageBackend;

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileBackend;
