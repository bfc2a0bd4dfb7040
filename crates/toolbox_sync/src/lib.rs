#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Durable sync configuration
pub mod config;

/// Sync coordinator (gating, remote I/O, force-sync fan-out)
pub mod coordinator;

/// Per-domain stores (favorites, bookmarks, notes)
pub mod domain;

/// Error (common error types)
pub mod error;

/// Encryption key session boundary
pub mod keys;

/// In-memory collaborator implementations
pub mod memory;

/// Last-writer-wins merge
pub mod merge;

/// Remote metadata file (`.metadata.json`)
pub mod metadata;

/// Record capability trait for merge
pub mod record;

/// Remote channel boundary
pub mod remote;

/// Local durable key-value store boundary
pub mod store;

pub use config::SyncConfig;
pub use coordinator::{ForceSyncCallback, SubscriptionId, SyncCoordinator};
pub use error::{Result, SyncError};
pub use keys::KeySession;
pub use merge::merge;
pub use record::SyncRecord;
pub use remote::{BoxFuture, RemoteChannel};
pub use store::{LocalStore, LocalStoreExt};
