//! Durable sync configuration.
//!
//! One small record persisted in the coordinator's local store namespace.
//! Note the deliberate asymmetry with key material: `encryption_enabled`
//! is durable while the key itself is session-scoped, so the config can
//! say encryption is on while no key is present on this device.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{LocalStore, LocalStoreExt};

/// Key under which the config is stored in its namespace.
pub const CONFIG_KEY: &str = "config";

/// Durable synchronization settings for this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Whether the user has turned sync on.
    pub enabled: bool,
    /// Whether the remote files are (to be) end-to-end encrypted.
    pub encryption_enabled: bool,
    /// When this device last completed a sync, epoch milliseconds. 0 = never.
    pub last_sync: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            encryption_enabled: false,
            last_sync: 0,
        }
    }
}

impl SyncConfig {
    /// Load the config from `store`, falling back to defaults on first run
    /// or if the stored value does not parse.
    pub async fn load(store: &dyn LocalStore) -> Self {
        store.get_as(CONFIG_KEY).await.unwrap_or_default()
    }

    /// Persist the config to `store` and flush.
    pub async fn persist(&self, store: &dyn LocalStore) -> Result<()> {
        store.set_as(CONFIG_KEY, self).await?;
        store.save().await
    }
}
