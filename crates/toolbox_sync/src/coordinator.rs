//! Sync coordinator.
//!
//! The coordinator owns the durable sync configuration, the probed state of
//! its collaborators (remote availability, key presence) and the force-sync
//! subscriber registry. Every remote-touching operation goes through its
//! gate: sync must be enabled, the remote reachable, and, when encryption
//! is on, a key must be present. The gate fails closed so a keyless device
//! can never overwrite ciphertext with plaintext or vice versa.
//!
//! Failure semantics: remote and transport errors degrade to "no-op, return
//! prior state, log". Domain stores never see an error from here; outcomes
//! are communicated through boolean or optional return values only, so a
//! failed background sync can never block the foreground mutation that
//! triggered it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::keys::KeySession;
use crate::merge::merge;
use crate::metadata::{METADATA_FILE, RemoteMetadata};
use crate::record::SyncRecord;
use crate::remote::{BoxFuture, RemoteChannel};
use crate::store::LocalStore;

/// A unique identifier for a force-sync subscription.
pub type SubscriptionId = u64;

/// Callback invoked on every force-sync broadcast.
///
/// Returns a future so the coordinator can join all subscribers instead of
/// guessing how long they need.
pub type ForceSyncCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// The domain files mirrored in the remote location. The re-encryption pass
/// walks exactly this list.
pub const KNOWN_FILES: [&str; 3] = ["notes.json", "bookmarks.json", "favorites.json"];

/// Upper bound on how long `sync_all` waits for subscribers to finish.
const FORCE_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Serialize a collection into its remote document body
/// `{ "<domainKey>": [...] }`.
pub(crate) fn encode_collection<T: Serialize>(domain_key: &str, records: &[T]) -> Result<String> {
    let mut doc = serde_json::Map::new();
    doc.insert(domain_key.to_string(), serde_json::to_value(records)?);
    Ok(serde_json::to_string_pretty(&Value::Object(doc))?)
}

/// Parse a remote document body back into a collection.
///
/// Malformed JSON, a missing domain key, or records of the wrong shape all
/// decode as an empty collection: a corrupt remote file must never stop a
/// sync, it just loses the vote.
pub(crate) fn decode_collection<T: DeserializeOwned>(domain_key: &str, content: &str) -> Vec<T> {
    let Ok(mut parsed) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(records) = parsed.get_mut(domain_key).map(Value::take) else {
        return Vec::new();
    };
    serde_json::from_value(records).unwrap_or_default()
}

/// Coordinates synchronization between local domain stores and the shared
/// remote location.
///
/// One instance exists per process; domain stores hold it behind an `Arc`
/// and delegate all remote interaction to it.
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteChannel>,
    keys: Arc<dyn KeySession>,
    store: Arc<dyn LocalStore>,
    config: Mutex<SyncConfig>,
    /// Probed once per session in `init`.
    available: AtomicBool,
    initialized: AtomicBool,
    /// Depth counter: force-sync fan-out nests per-file syncs.
    syncing: AtomicUsize,
    subscribers: RwLock<HashMap<SubscriptionId, ForceSyncCallback>>,
    next_subscription: AtomicU64,
    /// Per-filename locks serializing the read-merge-write window so two
    /// overlapping syncs of the same domain cannot interleave.
    file_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncCoordinator {
    /// Create a coordinator over the given collaborators. Call
    /// [`init`](Self::init) before anything else.
    pub fn new(
        remote: Arc<dyn RemoteChannel>,
        keys: Arc<dyn KeySession>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            remote,
            keys,
            store,
            config: Mutex::new(SyncConfig::default()),
            available: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            syncing: AtomicUsize::new(0),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Load durable config, probe the remote, and reconcile the local
    /// encryption flag against remote metadata. Idempotent: repeated calls
    /// are no-ops.
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let loaded = SyncConfig::load(self.store.as_ref()).await;
        *self.config.lock().unwrap() = loaded;

        let available = self.remote.is_available();
        self.available.store(available, Ordering::SeqCst);

        if available {
            self.reconcile_remote_metadata().await;
        }
    }

    /// If the remote says encryption is on and local config disagrees,
    /// correct and persist local config. The metadata is authoritative for
    /// the fact that encryption is enabled, never for the key itself, so
    /// this is always read through the plain path.
    async fn reconcile_remote_metadata(&self) {
        let content = match self.remote.read_file(METADATA_FILE).await {
            Ok(Some(content)) => content,
            Ok(None) => return,
            Err(e) => {
                log::debug!("no readable remote metadata: {e}");
                return;
            }
        };

        let metadata = match RemoteMetadata::from_json(&content) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("malformed remote metadata ignored: {e}");
                return;
            }
        };

        let corrected = {
            let mut config = self.config.lock().unwrap();
            if metadata.encryption_enabled && !config.encryption_enabled {
                config.encryption_enabled = true;
                true
            } else {
                false
            }
        };

        if corrected {
            log::info!("another device enabled encryption; updating local config");
            self.persist_config().await;
        }
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    /// Snapshot of the durable configuration.
    pub fn config(&self) -> SyncConfig {
        self.config.lock().unwrap().clone()
    }

    /// Whether the remote channel was reachable when this session started.
    pub fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Whether a derived key is present in the session right now.
    pub fn has_key(&self) -> bool {
        self.keys.has_key()
    }

    /// Sync is turned on and the remote is reachable.
    pub fn enabled(&self) -> bool {
        self.config.lock().unwrap().enabled && self.available()
    }

    /// Encryption is enabled but the password has not been entered yet on
    /// this device.
    pub fn needs_password(&self) -> bool {
        self.config.lock().unwrap().encryption_enabled && !self.has_key()
    }

    /// The single gate for every remote operation: sync is enabled and,
    /// when encryption is on, a key is present.
    pub fn can_sync(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        !self.needs_password()
    }

    /// Whether a sync operation is currently in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst) > 0
    }

    /// When this device last completed a sync, epoch milliseconds.
    pub fn last_sync(&self) -> i64 {
        self.config.lock().unwrap().last_sync
    }

    /// Files are read and written through the encrypt transform.
    fn encrypted_mode(&self) -> bool {
        self.config.lock().unwrap().encryption_enabled && self.has_key()
    }

    // ========================================================================
    // Configuration mutations
    // ========================================================================

    /// Turn sync on or off. Turning it on triggers an immediate `sync_all`.
    pub async fn set_enabled(&self, value: bool) {
        self.config.lock().unwrap().enabled = value;
        self.persist_config().await;

        if value && self.available() {
            self.sync_all().await;
        }
    }

    /// Turn the encryption mode on or off.
    ///
    /// Pushes metadata describing the new state (always unencrypted) so
    /// other devices can detect it, then, if sync is on and a key is
    /// present, rewrites every known domain file in the new mode. The
    /// rewrite is not atomic across files; a crash mid-loop leaves some
    /// files in the old mode until the next toggle.
    pub async fn set_encryption_enabled(&self, value: bool) {
        self.config.lock().unwrap().encryption_enabled = value;
        self.persist_config().await;

        if self.available() {
            match RemoteMetadata::new(value).to_json() {
                Ok(body) => {
                    if let Err(e) = self.remote.write_file(METADATA_FILE, &body).await {
                        log::warn!("failed to write remote metadata: {e}");
                    }
                }
                Err(e) => log::warn!("failed to encode remote metadata: {e}"),
            }
        }

        let should_rewrite =
            self.config.lock().unwrap().enabled && self.available() && self.has_key();
        if should_rewrite {
            self.re_encrypt_all_files().await;
        }
    }

    /// Derive a key from `password` and install it in the session.
    /// Returns whether the key was accepted; never raises past this
    /// boundary.
    pub async fn set_encryption_password(&self, password: &str) -> bool {
        match self.keys.set_password(password).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to set encryption password: {e}");
                false
            }
        }
    }

    /// Drop the session key. Subsequent remote operations fall back to
    /// "skip" until a password is supplied again.
    pub fn clear_encryption_key(&self) {
        self.keys.clear();
    }

    /// Rewrite every known domain file in the current mode.
    ///
    /// Each file is read with a try-encrypted-then-fallback-plaintext
    /// strategy, so the pass works no matter which mode the file was last
    /// written in. Per-file failures are logged and the loop continues.
    pub async fn re_encrypt_all_files(&self) {
        for filename in KNOWN_FILES {
            let lock = self.file_lock(filename);
            let _serialized = lock.lock().await;

            let content = match self.remote.read_file_encrypted(filename).await {
                Ok(Some(content)) => Some(content),
                Ok(None) | Err(_) => match self.remote.read_file(filename).await {
                    Ok(content) => content,
                    Err(e) => {
                        log::warn!("failed to read {filename} during re-encryption: {e}");
                        continue;
                    }
                },
            };

            let Some(content) = content else {
                continue;
            };

            let written = if self.encrypted_mode() {
                self.remote.write_file_encrypted(filename, &content).await
            } else {
                self.remote.write_file(filename, &content).await
            };
            if let Err(e) = written {
                log::warn!("failed to rewrite {filename}: {e}");
            }
        }
    }

    // ========================================================================
    // Per-domain synchronization
    // ========================================================================

    /// Reconcile one domain's local collection with its remote file.
    ///
    /// Reads the remote copy (decrypting in encrypted mode), merges it with
    /// `local`, writes the merged collection back in the same mode, stamps
    /// `last_sync`, and returns the merged collection, which the caller
    /// must adopt as the new local truth.
    ///
    /// On any gate failure or remote I/O error the original `local` is
    /// returned unchanged and the problem is logged, never propagated. The
    /// whole read-merge-write window holds a per-filename lock, so two
    /// concurrent syncs of the same domain serialize instead of racing.
    pub async fn sync_file<T>(&self, filename: &str, local: Vec<T>, domain_key: &str) -> Vec<T>
    where
        T: SyncRecord + Clone + Serialize + DeserializeOwned + Send,
    {
        if !self.enabled() {
            return local;
        }
        if self.needs_password() {
            log::warn!("sync skipped for {filename}: encryption enabled but no key available");
            return local;
        }

        let lock = self.file_lock(filename);
        let _serialized = lock.lock().await;
        let _in_flight = self.begin_syncing();

        let encrypted = self.encrypted_mode();
        let content = if encrypted {
            self.remote.read_file_encrypted(filename).await
        } else {
            self.remote.read_file(filename).await
        };
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                log::warn!("failed to read {filename} from remote: {e}");
                return local;
            }
        };

        let remote_records: Vec<T> = content
            .as_deref()
            .map(|content| decode_collection(domain_key, content))
            .unwrap_or_default();

        let merged = merge(&local, &remote_records);

        let body = match encode_collection(domain_key, &merged) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to encode {filename}: {e}");
                return local;
            }
        };
        let written = if encrypted {
            self.remote.write_file_encrypted(filename, &body).await
        } else {
            self.remote.write_file(filename, &body).await
        };
        if let Err(e) = written {
            log::warn!("failed to write {filename} to remote: {e}");
            return local;
        }

        self.stamp_last_sync().await;
        merged
    }

    /// One-directional push of a collection to its remote file, without a
    /// merge. Same gating and failure-swallowing as `sync_file`.
    pub async fn write_remote<T: Serialize>(&self, filename: &str, records: &[T], domain_key: &str) {
        if !self.enabled() {
            return;
        }
        if self.needs_password() {
            log::warn!("remote write skipped for {filename}: encryption enabled but no key available");
            return;
        }

        let body = match encode_collection(domain_key, records) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to encode {filename}: {e}");
                return;
            }
        };

        let lock = self.file_lock(filename);
        let _serialized = lock.lock().await;

        let written = if self.encrypted_mode() {
            self.remote.write_file_encrypted(filename, &body).await
        } else {
            self.remote.write_file(filename, &body).await
        };
        if let Err(e) = written {
            log::warn!("failed to write {filename} to remote: {e}");
        }
    }

    /// One-directional pull of a collection from its remote file, without a
    /// merge. `None` when the remote is unreachable, gated, absent, or
    /// unreadable.
    pub async fn read_remote<T: DeserializeOwned>(
        &self,
        filename: &str,
        domain_key: &str,
    ) -> Option<Vec<T>> {
        if !self.available() {
            return None;
        }
        if self.needs_password() {
            log::warn!("remote read skipped for {filename}: encryption enabled but no key available");
            return None;
        }

        let content = if self.encrypted_mode() {
            self.remote.read_file_encrypted(filename).await
        } else {
            self.remote.read_file(filename).await
        };
        match content {
            Ok(Some(content)) => Some(decode_collection(domain_key, &content)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("failed to read {filename} from remote: {e}");
                None
            }
        }
    }

    // ========================================================================
    // Force-sync broadcast
    // ========================================================================

    /// Broadcast a force-sync signal to every subscribed domain store and
    /// wait for all of them to finish (bounded by a timeout), then stamp
    /// `last_sync`. Best effort: subscriber failures are invisible here.
    pub async fn sync_all(&self) {
        if !self.enabled() {
            return;
        }
        if self.needs_password() {
            log::warn!("sync all skipped: encryption enabled but no key available");
            return;
        }

        let _in_flight = self.begin_syncing();

        let callbacks: Vec<ForceSyncCallback> =
            self.subscribers.read().unwrap().values().cloned().collect();
        let joined = join_all(callbacks.iter().map(|callback| callback()));
        if tokio::time::timeout(FORCE_SYNC_TIMEOUT, joined).await.is_err() {
            log::warn!("force sync did not finish within {FORCE_SYNC_TIMEOUT:?}");
        }

        self.stamp_last_sync().await;
    }

    /// Subscribe to the force-sync broadcast. The returned id unsubscribes
    /// via [`unsubscribe`](Self::unsubscribe).
    pub fn on_force_sync(&self, callback: ForceSyncCallback) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().unwrap().insert(id, callback);
        id
    }

    /// Remove a force-sync subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.write().unwrap().remove(&id).is_some()
    }

    /// Number of active force-sync subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn file_lock(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.file_locks.lock().unwrap();
        locks.entry(filename.to_string()).or_default().clone()
    }

    fn begin_syncing(&self) -> SyncingGuard<'_> {
        self.syncing.fetch_add(1, Ordering::SeqCst);
        SyncingGuard(&self.syncing)
    }

    async fn persist_config(&self) {
        let config = self.config();
        if let Err(e) = config.persist(self.store.as_ref()).await {
            log::warn!("failed to persist sync config: {e}");
        }
    }

    async fn stamp_last_sync(&self) {
        self.config.lock().unwrap().last_sync = chrono::Utc::now().timestamp_millis();
        self.persist_config().await;
    }
}

struct SyncingGuard<'a>(&'a AtomicUsize);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
