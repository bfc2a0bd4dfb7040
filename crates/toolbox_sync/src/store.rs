//! Local durable key-value store boundary.
//!
//! Local persistence is an opaque durable map from string keys to JSON
//! values, one namespace per collection file (`favorites.json`,
//! `bookmarks.json`, ...). Each component is handed a store handle already
//! scoped to its namespace. Mutations are buffered by `set` and made
//! durable by `save`, mirroring how the desktop app's settings plugin
//! behaves.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::remote::BoxFuture;

/// Object-safe async handle to one namespace of the durable local map.
pub trait LocalStore: Send + Sync {
    /// Look up a value by key. `None` means the key has never been set.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>>;

    /// Set a value for a key (in memory until `save`).
    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;

    /// Flush buffered mutations to durable storage.
    fn save<'a>(&'a self) -> BoxFuture<'a, Result<()>>;
}

/// Typed accessors over any [`LocalStore`]. Only called from this crate's
/// own async fns, never stored or spawned directly.
#[allow(async_fn_in_trait)]
pub trait LocalStoreExt: LocalStore {
    /// Look up a key and deserialize it into `T`.
    ///
    /// Missing keys and values of the wrong shape both come back as `None`;
    /// a half-written value is treated the same as an absent one.
    async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    /// Serialize `value` and set it for `key`.
    async fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}
