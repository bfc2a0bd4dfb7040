//! Bookmarks.
//!
//! Records carry `createdAt` from birth and gain `updatedAt` on edit, so
//! conflict resolution sees edits, not just creations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::coordinator::{SubscriptionId, SyncCoordinator};
use crate::record::SyncRecord;
use crate::store::{LocalStore, LocalStoreExt};

/// Remote file mirroring this collection.
pub const BOOKMARKS_FILE: &str = "bookmarks.json";
/// Domain key inside the remote document and the local store.
pub const BOOKMARKS_KEY: &str = "bookmarks";

/// A saved link with optional tags and favicon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Stable unique identifier, shared across devices.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Target URL.
    pub url: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// User tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Last edit time, epoch milliseconds. Absent until first edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl SyncRecord for Bookmark {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }
    fn created_at(&self) -> Option<i64> {
        Some(self.created_at)
    }
}

/// Input for creating a bookmark; id and timestamps are assigned by the
/// store.
#[derive(Debug, Clone, Default)]
pub struct BookmarkDraft {
    /// Display title.
    pub title: String,
    /// Target URL.
    pub url: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// User tags.
    pub tags: Vec<String>,
    /// Optional favicon URL.
    pub favicon: Option<String>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BookmarkPatch {
    /// New title.
    pub title: Option<String>,
    /// New URL.
    pub url: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// New favicon URL.
    pub favicon: Option<String>,
}

/// Store of bookmarks, newest first.
pub struct BookmarksStore {
    local: Arc<dyn LocalStore>,
    sync: Arc<SyncCoordinator>,
    items: Mutex<Vec<Bookmark>>,
    initialized: AtomicBool,
}

impl BookmarksStore {
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
        if let Some(saved) = self.local.get_as::<Vec<Bookmark>>(BOOKMARKS_KEY).await {
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
        let merged = self.sync.sync_file(BOOKMARKS_FILE, local, BOOKMARKS_KEY).await;
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

    /// Snapshot of all bookmarks.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.items.lock().unwrap().clone()
    }

    /// Look up one bookmark by id.
    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.items.lock().unwrap().iter().find(|b| b.id == id).cloned()
    }

    /// Create a bookmark from `draft` and return it.
    pub async fn add(&self, draft: BookmarkDraft) -> Bookmark {
        let bookmark = Bookmark {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            url: draft.url,
            description: draft.description,
            tags: draft.tags,
            favicon: draft.favicon,
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: None,
        };
        self.items.lock().unwrap().insert(0, bookmark.clone());
        self.persist().await;
        self.push_remote().await;
        bookmark
    }

    /// Apply `patch` to the bookmark with `id`, stamping `updated_at`.
    /// Returns whether the bookmark existed.
    pub async fn update(&self, id: &str, patch: BookmarkPatch) -> bool {
        let changed = {
            let mut items = self.items.lock().unwrap();
            match items.iter_mut().find(|b| b.id == id) {
                None => false,
                Some(bookmark) => {
                    if let Some(title) = patch.title {
                        bookmark.title = title;
                    }
                    if let Some(url) = patch.url {
                        bookmark.url = url;
                    }
                    if let Some(description) = patch.description {
                        bookmark.description = Some(description);
                    }
                    if let Some(tags) = patch.tags {
                        bookmark.tags = tags;
                    }
                    if let Some(favicon) = patch.favicon {
                        bookmark.favicon = Some(favicon);
                    }
                    bookmark.updated_at = Some(chrono::Utc::now().timestamp_millis());
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

    /// Delete the bookmark with `id`.
    pub async fn remove(&self, id: &str) {
        self.items.lock().unwrap().retain(|b| b.id != id);
        self.persist().await;
        self.push_remote().await;
    }

    /// All bookmarks carrying `tag`.
    pub fn get_by_tag(&self, tag: &str) -> Vec<Bookmark> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.tags.iter().any(|t| t == tag))
            .cloned()
            .collect()
    }

    /// Every tag in use, sorted and deduplicated.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Case-insensitive substring search over title, url, description and
    /// tags.
    pub fn search(&self, query: &str) -> Vec<Bookmark> {
        let q = query.to_lowercase();
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&q)
                    || b.url.to_lowercase().contains(&q)
                    || b.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&q))
                    || b.tags.iter().any(|t| t.to_lowercase().contains(&q))
            })
            .cloned()
            .collect()
    }

    async fn persist(&self) {
        let items = self.items.lock().unwrap().clone();
        if let Err(e) = self.local.set_as(BOOKMARKS_KEY, &items).await {
            log::warn!("failed to persist bookmarks: {e}");
            return;
        }
        if let Err(e) = self.local.save().await {
            log::warn!("failed to save bookmarks store: {e}");
        }
    }

    async fn push_remote(&self) {
        let items = self.items.lock().unwrap().clone();
        self.sync
            .write_remote(BOOKMARKS_FILE, &items, BOOKMARKS_KEY)
            .await;
    }
}
