//! Remote metadata file.
//!
//! A well-known file in the shared remote location, always written
//! unencrypted regardless of the encryption mode, so that any device can
//! detect "some device turned encryption on" before it has a key. The
//! metadata is authoritative for the *fact* that encryption is enabled,
//! never for the key itself.

use serde::{Deserialize, Serialize};

/// Name of the metadata file in the remote location.
pub const METADATA_FILE: &str = ".metadata.json";

/// Current metadata format version.
pub const METADATA_VERSION: u32 = 1;

/// Unencrypted remote descriptor of the shared store's encryption state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetadata {
    /// Whether the domain files in the remote location are encrypted.
    pub encryption_enabled: bool,
    /// Format version for future compatibility.
    pub version: u32,
}

impl RemoteMetadata {
    /// Create metadata describing the given encryption state.
    pub fn new(encryption_enabled: bool) -> Self {
        Self {
            encryption_enabled,
            version: METADATA_VERSION,
        }
    }

    /// Parse metadata from its JSON file body.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize metadata to its JSON file body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
