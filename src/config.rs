//! Store configuration
//!
//! Storage keys and retention caps. Defaults match the key layout the web app
//! has always used, so a default-configured store reads existing browser data.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Keys and retention limits used by a [`crate::ClaimStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key holding the root document
    pub root_key: String,
    /// Key holding the backup ring
    pub backups_key: String,
    /// Key holding the snapshot catalog
    pub snapshots_key: String,
    /// Key prefix swept by `purge_all`
    pub purge_prefix: String,

    /// Backup ring capacity
    pub max_backups: usize,
    /// Snapshot catalog capacity
    pub max_snapshots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_key: STORAGE_KEY.to_string(),
            backups_key: BACKUPS_KEY.to_string(),
            snapshots_key: SNAPSHOTS_KEY.to_string(),
            purge_prefix: LEGACY_PREFIX.to_string(),

            max_backups: MAX_BACKUPS,
            max_snapshots: MAX_SNAPSHOTS,
        }
    }
}

impl StoreConfig {
    /// Config with every key namespaced under `prefix` (e.g. for a second claim)
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            root_key: format!("{prefix}storage_v2"),
            backups_key: format!("{prefix}storage_backups"),
            snapshots_key: format!("{prefix}snapshots"),
            purge_prefix: prefix.to_string(),
            ..Self::default()
        }
    }

    /// The three keys owned by the store, in layout order
    pub fn owned_keys(&self) -> [&str; 3] {
        [&self.root_key, &self.backups_key, &self.snapshots_key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_layout() {
        let config = StoreConfig::default();
        assert_eq!(config.owned_keys(), ["cn_storage_v2", "cn_storage_backups", "cn_snapshots"]);
        assert_eq!(config.max_backups, 10);
        assert_eq!(config.max_snapshots, 20);
    }

    #[test]
    fn test_prefixed_config_keeps_caps() {
        let config = StoreConfig::with_prefix("claim2_");
        assert_eq!(config.root_key, "claim2_storage_v2");
        assert_eq!(config.purge_prefix, "claim2_");
        assert_eq!(config.max_backups, MAX_BACKUPS);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"max_backups": 3}"#).unwrap();
        assert_eq!(config.max_backups, 3);
        assert_eq!(config.root_key, STORAGE_KEY);
    }
}
