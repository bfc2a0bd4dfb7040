//! Favorite tool ids.
//!
//! The simplest domain: a flat list of tool identifiers with no
//! timestamps, so the merge degenerates to order-preserving set union.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::coordinator::{SubscriptionId, SyncCoordinator};
use crate::store::{LocalStore, LocalStoreExt};

/// Remote file mirroring this collection.
pub const FAVORITES_FILE: &str = "favorites.json";
/// Domain key inside the remote document and the local store.
pub const FAVORITES_KEY: &str = "favorites";

/// Store of favorite tool ids.
pub struct FavoritesStore {
    local: Arc<dyn LocalStore>,
    sync: Arc<SyncCoordinator>,
    items: Mutex<Vec<String>>,
    initialized: AtomicBool,
}

impl FavoritesStore {
    /// Create an empty store over its local namespace and the coordinator.
    pub fn new(local: Arc<dyn LocalStore>, sync: Arc<SyncCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            local,
            sync,
            items: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
        })
    }

    /// Load the local collection, then reconcile with the remote copy if
    /// the coordinator's gate allows it. Idempotent.
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(saved) = self.local.get_as::<Vec<String>>(FAVORITES_KEY).await {
            *self.items.lock().unwrap() = saved;
        }
        if self.sync.can_sync() {
            self.sync_now().await;
        }
    }

    /// Merge with the remote copy, adopt the result as local truth, and
    /// persist it. The coordinator writes the merged collection back
    /// remotely, so both sides converge.
    pub async fn sync_now(&self) {
        let local = self.items.lock().unwrap().clone();
        let merged = self.sync.sync_file(FAVORITES_FILE, local, FAVORITES_KEY).await;
        *self.items.lock().unwrap() = merged;
        self.persist().await;
    }

    /// Register on the force-sync broadcast for the lifetime of this store.
    pub fn subscribe_force_sync(self: &Arc<Self>) -> SubscriptionId {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.sync.on_force_sync(Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(store) = weak.upgrade() {
                    store.sync_now().await;
                }
            })
        }))
    }

    /// Snapshot of the current favorites.
    pub fn favorites(&self) -> Vec<String> {
        self.items.lock().unwrap().clone()
    }

    /// Whether `tool_id` is currently a favorite.
    pub fn is_favorite(&self, tool_id: &str) -> bool {
        self.items.lock().unwrap().iter().any(|id| id == tool_id)
    }

    /// Add a favorite. No-op if already present.
    pub async fn add(&self, tool_id: &str) {
        {
            let mut items = self.items.lock().unwrap();
            if items.iter().any(|id| id == tool_id) {
                return;
            }
            items.push(tool_id.to_string());
        }
        self.persist().await;
        self.push_remote().await;
    }

    /// Remove a favorite.
    pub async fn remove(&self, tool_id: &str) {
        self.items.lock().unwrap().retain(|id| id != tool_id);
        self.persist().await;
        self.push_remote().await;
    }

    /// Flip a favorite on or off; returns whether it is a favorite now.
    pub async fn toggle(&self, tool_id: &str) -> bool {
        let now_favorite = {
            let mut items = self.items.lock().unwrap();
            if let Some(position) = items.iter().position(|id| id == tool_id) {
                items.remove(position);
                false
            } else {
                items.push(tool_id.to_string());
                true
            }
        };
        self.persist().await;
        self.push_remote().await;
        now_favorite
    }

    async fn persist(&self) {
        let items = self.items.lock().unwrap().clone();
        if let Err(e) = self.local.set_as(FAVORITES_KEY, &items).await {
            log::warn!("failed to persist favorites: {e}");
            return;
        }
        if let Err(e) = self.local.save().await {
            log::warn!("failed to save favorites store: {e}");
        }
    }

    async fn push_remote(&self) {
        let items = self.items.lock().unwrap().clone();
        self.sync
            .write_remote(FAVORITES_FILE, &items, FAVORITES_KEY)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryKeySession, MemoryLocalStore, MemoryRemote};

    struct Fixture {
        remote: Arc<MemoryRemote>,
        local: Arc<MemoryLocalStore>,
        sync: Arc<SyncCoordinator>,
        store: Arc<FavoritesStore>,
    }

    async fn fixture(sync_enabled: bool) -> Fixture {
        let remote = Arc::new(MemoryRemote::new());
        let keys = Arc::new(MemoryKeySession::new());
        let sync = Arc::new(SyncCoordinator::new(
            remote.clone(),
            keys,
            Arc::new(MemoryLocalStore::new()),
        ));
        sync.init().await;
        if sync_enabled {
            sync.set_enabled(true).await;
        }
        let local = Arc::new(MemoryLocalStore::new());
        let store = FavoritesStore::new(local.clone(), sync.clone());
        Fixture {
            remote,
            local,
            sync,
            store,
        }
    }

    #[tokio::test]
    async fn toggle_add_remove() {
        let f = fixture(false).await;
        f.store.init().await;

        assert!(f.store.toggle("base64").await);
        assert!(f.store.is_favorite("base64"));

        f.store.add("json").await;
        f.store.add("json").await; // idempotent
        assert_eq!(f.store.favorites(), vec!["base64", "json"]);

        assert!(!f.store.toggle("base64").await);
        f.store.remove("json").await;
        assert!(f.store.favorites().is_empty());
    }

    #[tokio::test]
    async fn mutations_are_locally_durable_without_remote() {
        let f = fixture(false).await;
        f.store.init().await;

        f.store.add("base64").await;
        assert!(f.local.save_count() > 0);
        assert_eq!(
            f.local.get_as::<Vec<String>>(FAVORITES_KEY).await,
            Some(vec!["base64".to_string()])
        );
        assert_eq!(f.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn init_reloads_persisted_favorites() {
        let f = fixture(false).await;
        f.local
            .set_as(FAVORITES_KEY, &vec!["uuid".to_string()])
            .await
            .unwrap();

        f.store.init().await;
        assert!(f.store.is_favorite("uuid"));

        // Second init is a no-op.
        f.store.init().await;
        assert_eq!(f.store.favorites().len(), 1);
    }

    #[tokio::test]
    async fn init_with_sync_converges_with_remote() {
        let f = fixture(true).await;
        f.remote
            .put_raw(FAVORITES_FILE, r#"{"favorites": ["remote-tool"]}"#);
        f.local
            .set_as(FAVORITES_KEY, &vec!["local-tool".to_string()])
            .await
            .unwrap();

        f.store.init().await;

        let favorites = f.store.favorites();
        assert!(favorites.contains(&"local-tool".to_string()));
        assert!(favorites.contains(&"remote-tool".to_string()));

        // Merged truth pushed back remotely and persisted locally.
        let body = f.remote.raw(FAVORITES_FILE).unwrap();
        assert!(body.contains("local-tool") && body.contains("remote-tool"));
        assert_eq!(
            f.local.get_as::<Vec<String>>(FAVORITES_KEY).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn needs_password_short_circuits_init() {
        let f = fixture(true).await;
        f.sync.set_encryption_enabled(true).await;
        let reads_before = f.remote.read_count();

        f.store.init().await;

        // Local-only mode: no remote interaction beyond the earlier toggle.
        assert_eq!(f.remote.read_count(), reads_before);
    }

    #[tokio::test]
    async fn mutation_pushes_to_remote_when_enabled() {
        let f = fixture(true).await;
        f.store.init().await;

        f.store.add("base64").await;

        let body = f.remote.raw(FAVORITES_FILE).unwrap();
        assert!(body.contains("base64"));
    }

    #[tokio::test]
    async fn force_sync_broadcast_pulls_remote_changes() {
        let f = fixture(true).await;
        f.store.init().await;
        let _subscription = f.store.subscribe_force_sync();

        f.remote
            .put_raw(FAVORITES_FILE, r#"{"favorites": ["added-elsewhere"]}"#);
        f.sync.sync_all().await;

        assert!(f.store.is_favorite("added-elsewhere"));
    }

    #[tokio::test]
    async fn dropped_store_stops_reacting_to_broadcasts() {
        let f = fixture(true).await;
        f.store.init().await;
        let _subscription = f.store.subscribe_force_sync();

        let Fixture { remote, sync, store, .. } = f;
        drop(store);

        remote.put_raw(FAVORITES_FILE, r#"{"favorites": ["later"]}"#);
        // Must not panic or hang on a dead subscriber.
        sync.sync_all().await;
    }
}
