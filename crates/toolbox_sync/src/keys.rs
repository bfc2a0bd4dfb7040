//! Encryption key session boundary.
//!
//! The derived key only ever exists in process memory: it is installed by
//! supplying a password, destroyed by an explicit clear or process exit,
//! and never persisted. Durable configuration can therefore claim that
//! encryption is enabled while no key is present on this device. That
//! divergence is the "needs password" state the coordinator checks before
//! every remote operation.

use crate::error::Result;
use crate::remote::BoxFuture;

/// Holds a password-derived encryption key for the lifetime of the process.
pub trait KeySession: Send + Sync {
    /// Whether a derived key is currently present in memory.
    fn has_key(&self) -> bool;

    /// Derive a key from `password` and install it in the session.
    fn set_password<'a>(&'a self, password: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Drop the key. Subsequent encrypted operations must be skipped by
    /// callers until a password is supplied again.
    fn clear(&self);
}
