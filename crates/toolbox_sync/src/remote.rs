//! Remote channel boundary.
//!
//! The remote channel is the shared, device-independent file store used as
//! the synchronization medium (an iCloud container in the desktop app).
//! Devices never talk to each other directly; they converge by reading and
//! rewriting named files in this shared location.
//!
//! ## Object safety
//!
//! `RemoteChannel` is designed to be object-safe so it can live behind
//! `Arc<dyn RemoteChannel>` inside the coordinator. To enable this, all
//! async methods return boxed futures.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// A boxed future for object-safe async methods.
///
/// Futures are `Send` for compatibility with multi-threaded runtimes.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability to read and write named files in the shared remote location.
///
/// The encrypted variants route through the transport's encrypt/decrypt
/// transform and are only valid once a key session exists; callers are
/// expected to gate on [`KeySession::has_key`](crate::KeySession::has_key)
/// before using them.
pub trait RemoteChannel: Send + Sync {
    /// Human-readable name for this channel (e.g. "icloud").
    fn name(&self) -> &str;

    /// Whether the channel is reachable right now.
    ///
    /// Probed once per session by the coordinator; a `false` here degrades
    /// every sync operation to a no-op for the rest of the session.
    fn is_available(&self) -> bool;

    /// Read a file's content. `Ok(None)` means the file does not exist.
    fn read_file<'a>(&'a self, filename: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Write a file, replacing any previous content.
    fn write_file<'a>(&'a self, filename: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Read a file through the decrypt transform. `Ok(None)` means absent;
    /// an error typically means the stored bytes were not ciphertext for
    /// the current key.
    fn read_file_encrypted<'a>(
        &'a self,
        filename: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>>;

    /// Write a file through the encrypt transform.
    fn write_file_encrypted<'a>(
        &'a self,
        filename: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}
