//! In-memory collaborator implementations.
//!
//! These back the crate's own tests and are useful for headless or
//! first-run scenarios where no real transport is wired up yet. They are
//! first-class exports, not test-only code.
//!
//! [`MemoryRemote`] seals "encrypted" writes in a recognizable envelope so
//! the plain and encrypted paths are distinguishable: an encrypted file
//! read through the plain path comes back as an opaque blob, and a plain
//! file read through the encrypted path fails, which is exactly the shape
//! real transports present during a mode transition.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::keys::KeySession;
use crate::remote::{BoxFuture, RemoteChannel};
use crate::store::LocalStore;

const SEALED_PREFIX: &str = "sealed:";

// ============================================================================
// MemoryLocalStore
// ============================================================================

/// In-memory durable map namespace.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<String, Value>>,
    saves: AtomicUsize,
}

impl MemoryLocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `save` has been called. Lets tests assert that
    /// mutations were actually flushed.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl LocalStore for MemoryLocalStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move { self.values.lock().unwrap().get(key).cloned() })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        })
    }

    fn save<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ============================================================================
// MemoryKeySession
// ============================================================================

/// In-memory key session: "derives" a key by remembering the password.
#[derive(Debug, Default)]
pub struct MemoryKeySession {
    key: Mutex<Option<String>>,
}

impl MemoryKeySession {
    /// Create a session with no key present.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySession for MemoryKeySession {
    fn has_key(&self) -> bool {
        self.key.lock().unwrap().is_some()
    }

    fn set_password<'a>(&'a self, password: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if password.is_empty() {
                return Err(SyncError::KeyRejected);
            }
            *self.key.lock().unwrap() = Some(password.to_string());
            Ok(())
        })
    }

    fn clear(&self) {
        *self.key.lock().unwrap() = None;
    }
}

// ============================================================================
// MemoryRemote
// ============================================================================

/// In-memory remote channel with per-operation call counters.
///
/// The counters make it a spy: tests can assert that a gated operation
/// performed zero remote calls. `set_failing` simulates transport faults
/// and `set_available` the channel going away for the session.
pub struct MemoryRemote {
    files: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    failing: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryRemote {
    /// Create an empty, available remote.
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Toggle availability.
    pub fn set_available(&self, value: bool) {
        self.available.store(value, Ordering::SeqCst);
    }

    /// Make every subsequent read and write fail with a transport error.
    pub fn set_failing(&self, value: bool) {
        self.failing.store(value, Ordering::SeqCst);
    }

    /// Number of read operations attempted (plain and encrypted).
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write operations attempted (plain and encrypted).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored bytes for a file, bypassing any transform. `None` if the
    /// file does not exist.
    pub fn raw(&self, filename: &str) -> Option<String> {
        self.files.lock().unwrap().get(filename).cloned()
    }

    /// Store raw bytes directly, bypassing counters and transforms. For
    /// seeding test fixtures.
    pub fn put_raw(&self, filename: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), content.to_string());
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("simulated transport failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteChannel for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn read_file<'a>(&'a self, filename: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.files.lock().unwrap().get(filename).cloned())
        })
    }

    fn write_file<'a>(&'a self, filename: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.files
                .lock()
                .unwrap()
                .insert(filename.to_string(), content.to_string());
            Ok(())
        })
    }

    fn read_file_encrypted<'a>(
        &'a self,
        filename: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let stored = self.files.lock().unwrap().get(filename).cloned();
            match stored {
                None => Ok(None),
                Some(raw) => {
                    let sealed = raw.strip_prefix(SEALED_PREFIX).ok_or_else(|| {
                        SyncError::Transport(format!("{filename}: stored bytes are not sealed"))
                    })?;
                    let bytes = BASE64
                        .decode(sealed)
                        .map_err(|e| SyncError::Transport(format!("{filename}: {e}")))?;
                    String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|e| SyncError::Transport(format!("{filename}: {e}")))
                }
            }
        })
    }

    fn write_file_encrypted<'a>(
        &'a self,
        filename: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let sealed = format!("{SEALED_PREFIX}{}", BASE64.encode(content));
            self.files
                .lock()
                .unwrap()
                .insert(filename.to_string(), sealed);
            Ok(())
        })
    }
}
