//! Notes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::coordinator::{SubscriptionId, SyncCoordinator};
use crate::record::SyncRecord;
use crate::store::{LocalStore, LocalStoreExt};

/// Remote file mirroring this collection.
pub const NOTES_FILE: &str = "notes.json";
/// Domain key inside the remote document and the local store.
pub const NOTES_KEY: &str = "notes";

/// A free-form text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable unique identifier, shared across devices.
    pub id: String,
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Last edit time, epoch milliseconds.
    pub updated_at: i64,
}

impl SyncRecord for Note {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn updated_at(&self) -> Option<i64> {
        Some(self.updated_at)
    }
    fn created_at(&self) -> Option<i64> {
        Some(self.created_at)
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub content: Option<String>,
}

/// Store of notes, newest first.
pub struct NotesStore {
    local: Arc<dyn LocalStore>,
    sync: Arc<SyncCoordinator>,
    items: Mutex<Vec<Note>>,
    initialized: AtomicBool,
}

impl NotesStore {
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
        if let Some(saved) = self.local.get_as::<Vec<Note>>(NOTES_KEY).await {
            *self.items.lock().unwrap() = saved;
        }
        if self.sync.can_sync() {
            self.sync_now().await;
        }
    }

    /// Merge with the remote copy, adopt the result as local truth, and
    /// persist it.
    pub async fn sync_now(&self) {
        let local = self.items.lock().unwrap().clone();
        let merged = self.sync.sync_file(NOTES_FILE, local, NOTES_KEY).await;
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

    /// Snapshot of all notes.
    pub fn notes(&self) -> Vec<Note> {
        self.items.lock().unwrap().clone()
    }

    /// Look up one note by id.
    pub fn get(&self, id: &str) -> Option<Note> {
        self.items.lock().unwrap().iter().find(|n| n.id == id).cloned()
    }

    /// Create a note and return it.
    pub async fn add(&self, title: &str, content: &str) -> Note {
        let now = chrono::Utc::now().timestamp_millis();
        let note = Note {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.items.lock().unwrap().insert(0, note.clone());
        self.persist().await;
        self.push_remote().await;
        note
    }

    /// Apply `patch` to the note with `id`, stamping `updated_at`. Returns
    /// whether the note existed.
    pub async fn update(&self, id: &str, patch: NotePatch) -> bool {
        let changed = {
            let mut items = self.items.lock().unwrap();
            match items.iter_mut().find(|n| n.id == id) {
                None => false,
                Some(note) => {
                    if let Some(title) = patch.title {
                        note.title = title;
                    }
                    if let Some(content) = patch.content {
                        note.content = content;
                    }
                    note.updated_at = chrono::Utc::now().timestamp_millis();
                    true
                }
            }
        };
        if changed {
            self.persist().await;
            self.push_remote().await;
        }
        changed
    }

    /// Delete the note with `id`.
    pub async fn remove(&self, id: &str) {
        self.items.lock().unwrap().retain(|n| n.id != id);
        self.persist().await;
        self.push_remote().await;
    }

    async fn persist(&self) {
        let items = self.items.lock().unwrap().clone();
        if let Err(e) = self.local.set_as(NOTES_KEY, &items).await {
            log::warn!("failed to persist notes: {e}");
            return;
        }
        if let Err(e) = self.local.save().await {
            log::warn!("failed to save notes store: {e}");
        }
    }

    async fn push_remote(&self) {
        let items = self.items.lock().unwrap().clone();
        self.sync.write_remote(NOTES_FILE, &items, NOTES_KEY).await;
    }
}
