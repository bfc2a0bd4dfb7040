//! Per-domain stores.
//!
//! Each domain store owns one local collection (favorite tool ids,
//! bookmarks, notes) and the synchronization glue around it. The glue
//! follows one pattern across all three:
//!
//! - `init` loads the local collection, then, if the coordinator's gate
//!   allows it, merges with the remote copy and adopts the result,
//!   pushing it back so both sides converge on first contact. A device
//!   that needs a password skips remote interaction entirely and runs
//!   local-only.
//! - Every mutation updates in-memory state synchronously, persists
//!   locally, then pushes to the remote best-effort. Local durability
//!   never depends on remote reachability.
//! - `subscribe_force_sync` registers the store on the coordinator's
//!   broadcast for its lifetime; each signal repeats the merge-and-push.

pub mod bookmarks;
pub mod favorites;
pub mod notes;

pub use bookmarks::{Bookmark, BookmarkDraft, BookmarkPatch, BookmarksStore};
pub use favorites::FavoritesStore;
pub use notes::{Note, NotePatch, NotesStore};
