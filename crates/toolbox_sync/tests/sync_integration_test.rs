//! Integration tests exercising full multi-device sync through a shared
//! in-memory remote.

use std::sync::Arc;

use toolbox_sync::domain::{BookmarkDraft, BookmarksStore, FavoritesStore, NotesStore};
use toolbox_sync::memory::{MemoryKeySession, MemoryLocalStore, MemoryRemote};
use toolbox_sync::SyncCoordinator;

/// One simulated device: its own coordinator and domain stores, sharing
/// only the remote with other devices.
struct Device {
    sync: Arc<SyncCoordinator>,
    favorites: Arc<FavoritesStore>,
    bookmarks: Arc<BookmarksStore>,
    notes: Arc<NotesStore>,
}

impl Device {
    async fn connect(remote: Arc<MemoryRemote>) -> Self {
        let sync = Arc::new(SyncCoordinator::new(
            remote,
            Arc::new(MemoryKeySession::new()),
            Arc::new(MemoryLocalStore::new()),
        ));
        sync.init().await;
        sync.set_enabled(true).await;

        let favorites = FavoritesStore::new(Arc::new(MemoryLocalStore::new()), sync.clone());
        let bookmarks = BookmarksStore::new(Arc::new(MemoryLocalStore::new()), sync.clone());
        let notes = NotesStore::new(Arc::new(MemoryLocalStore::new()), sync.clone());
        favorites.init().await;
        bookmarks.init().await;
        notes.init().await;
        favorites.subscribe_force_sync();
        bookmarks.subscribe_force_sync();
        notes.subscribe_force_sync();

        Self {
            sync,
            favorites,
            bookmarks,
            notes,
        }
    }
}

fn draft(title: &str, url: &str) -> BookmarkDraft {
    BookmarkDraft {
        title: title.into(),
        url: url.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn two_devices_converge_across_all_domains() {
    let remote = Arc::new(MemoryRemote::new());
    let alpha = Device::connect(remote.clone()).await;
    let beta = Device::connect(remote.clone()).await;

    let bookmark = alpha.bookmarks.add(draft("Docs", "https://docs.rs")).await;
    alpha.favorites.add("tool-a").await;

    let note = beta.notes.add("Meeting", "agenda").await;
    beta.favorites.add("tool-b").await;

    alpha.sync.sync_all().await;
    beta.sync.sync_all().await;
    alpha.sync.sync_all().await;

    assert!(alpha.notes.get(&note.id).is_some());
    assert!(beta.bookmarks.get(&bookmark.id).is_some());

    let mut alpha_favs = alpha.favorites.favorites();
    let mut beta_favs = beta.favorites.favorites();
    alpha_favs.sort();
    beta_favs.sort();
    assert_eq!(alpha_favs, vec!["tool-a".to_string(), "tool-b".to_string()]);
    assert_eq!(alpha_favs, beta_favs);
}

#[tokio::test]
async fn concurrent_edits_of_one_record_converge_to_the_newer() {
    let remote = Arc::new(MemoryRemote::new());
    let alpha = Device::connect(remote.clone()).await;
    let beta = Device::connect(remote.clone()).await;

    let note = alpha.notes.add("Draft", "v1").await;
    alpha.sync.sync_all().await;
    beta.sync.sync_all().await;
    assert!(beta.notes.get(&note.id).is_some());

    // Both edit offline; beta's edit carries the later stamp.
    alpha
        .notes
        .update(&note.id, toolbox_sync::domain::NotePatch {
            content: Some("alpha edit".into()),
            ..Default::default()
        })
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    beta.notes
        .update(&note.id, toolbox_sync::domain::NotePatch {
            content: Some("beta edit".into()),
            ..Default::default()
        })
        .await;

    alpha.sync.sync_all().await;
    beta.sync.sync_all().await;
    alpha.sync.sync_all().await;

    assert_eq!(alpha.notes.get(&note.id).unwrap().content, "beta edit");
    assert_eq!(beta.notes.get(&note.id).unwrap().content, "beta edit");
}

#[tokio::test]
async fn encrypted_devices_share_data_while_keyless_device_stays_out() {
    let remote = Arc::new(MemoryRemote::new());
    let alpha = Device::connect(remote.clone()).await;

    assert!(alpha.sync.set_encryption_password("orchid").await);
    alpha.sync.set_encryption_enabled(true).await;

    let bookmark = alpha.bookmarks.add(draft("Secret", "https://example.com")).await;

    // Payload on the wire is sealed, not plain JSON.
    let body = remote.raw("bookmarks.json").unwrap();
    assert!(!body.contains("Secret"));

    // A second device with the password reads everything.
    let beta = Device::connect(remote.clone()).await;
    assert!(beta.sync.needs_password());
    assert!(beta.sync.set_encryption_password("orchid").await);
    beta.sync.sync_all().await;
    assert!(beta.bookmarks.get(&bookmark.id).is_some());

    // A keyless device never touches the remote payloads.
    let gamma = Device::connect(remote.clone()).await;
    let reads_before = remote.read_count();
    gamma.sync.sync_all().await;
    gamma.bookmarks.sync_now().await;
    assert_eq!(remote.read_count(), reads_before);
    assert!(gamma.bookmarks.get(&bookmark.id).is_none());
}

#[tokio::test]
async fn enabling_encryption_reseals_existing_files() {
    let remote = Arc::new(MemoryRemote::new());
    let alpha = Device::connect(remote.clone()).await;

    let note = alpha.notes.add("Plain at first", "body").await;
    assert!(remote.raw("notes.json").unwrap().contains("Plain at first"));

    assert!(alpha.sync.set_encryption_password("orchid").await);
    alpha.sync.set_encryption_enabled(true).await;
    assert!(!remote.raw("notes.json").unwrap().contains("Plain at first"));

    // A fresh device adopts the remote's encryption flag and can still
    // read the resealed history once it has the password.
    let beta = Device::connect(remote.clone()).await;
    assert!(beta.sync.config().encryption_enabled);
    assert!(beta.sync.set_encryption_password("orchid").await);
    beta.sync.sync_all().await;
    assert!(beta.notes.get(&note.id).is_some());
}

#[tokio::test]
async fn force_sync_broadcast_reaches_every_domain_store() {
    let remote = Arc::new(MemoryRemote::new());
    let alpha = Device::connect(remote.clone()).await;
    let beta = Device::connect(remote.clone()).await;

    beta.favorites.add("shared").await;
    beta.bookmarks.add(draft("Shared", "https://shared")).await;
    beta.notes.add("Shared", "body").await;

    // One broadcast on alpha pulls all three collections down.
    alpha.sync.sync_all().await;

    assert!(alpha.favorites.is_favorite("shared"));
    assert_eq!(alpha.bookmarks.bookmarks().len(), 1);
    assert_eq!(alpha.notes.notes().len(), 1);
}
