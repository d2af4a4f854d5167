//! Favorited properties.
//!
//! Anonymous visitors keep favorites under [`ANONYMOUS_FAVORITES_KEY`]; a
//! signed-in buyer keeps them under `buyer_favorites`. On buyer login the
//! two are merged and the anonymous set is removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use realty_core::{PropertyId, RoleNamespace};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::session::SessionStore;
use crate::storage::{ANONYMOUS_FAVORITES_KEY, SessionStorage, SlotKeys, persist_batch};

type FavoriteSet = BTreeSet<PropertyId>;

/// Favorites for whoever is currently browsing.
pub struct FavoritesStore {
    storage: Arc<dyn SessionStorage>,
    sessions: Arc<SessionStore>,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FavoritesStore {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, sessions: Arc<SessionStore>) -> Self {
        Self {
            storage,
            sessions,
            write_lock: Mutex::new(()),
        }
    }

    async fn active_key(&self) -> String {
        if self.sessions.is_authenticated(RoleNamespace::Buyer).await {
            SlotKeys::for_role(RoleNamespace::Buyer).favorites
        } else {
            ANONYMOUS_FAVORITES_KEY.to_string()
        }
    }

    fn read(&self, key: &str) -> Result<FavoriteSet, StorageError> {
        match self.storage.load(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(FavoriteSet::new()),
        }
    }

    async fn write(&self, key: String, set: &FavoriteSet) -> Result<(), StorageError> {
        let raw = serde_json::to_string(set)?;
        persist_batch(&self.storage, vec![(key, Some(raw))]).await
    }

    /// Favorited property ids, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored set cannot be read.
    pub async fn list(&self) -> Result<Vec<PropertyId>, StorageError> {
        let key = self.active_key().await;
        Ok(self.read(&key)?.into_iter().collect())
    }

    /// Whether `id` is favorited.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored set cannot be read.
    pub async fn contains(&self, id: PropertyId) -> Result<bool, StorageError> {
        let key = self.active_key().await;
        Ok(self.read(&key)?.contains(&id))
    }

    /// Favorite `id`. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be read or written.
    pub async fn add(&self, id: PropertyId) -> Result<bool, StorageError> {
        self.update(|set| set.insert(id)).await
    }

    /// Unfavorite `id`. Returns `false` if it was not favorited.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be read or written.
    pub async fn remove(&self, id: PropertyId) -> Result<bool, StorageError> {
        self.update(|set| set.remove(&id)).await
    }

    /// Flip `id`. Returns whether it is favorited afterwards.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be read or written.
    pub async fn toggle(&self, id: PropertyId) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let key = self.active_key().await;
        let mut set = self.read(&key)?;
        let now_favorite = if set.remove(&id) {
            false
        } else {
            set.insert(id);
            true
        };
        self.write(key, &set).await?;
        Ok(now_favorite)
    }

    async fn update(&self, change: impl FnOnce(&mut FavoriteSet) -> bool) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let key = self.active_key().await;
        let mut set = self.read(&key)?;
        if !change(&mut set) {
            return Ok(false);
        }
        self.write(key, &set).await?;
        Ok(true)
    }

    /// Fold the anonymous set and `server` into the buyer's set.
    ///
    /// The buyer set becomes `anonymous ∪ buyer ∪ server` and the anonymous
    /// key is removed, in one batch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either set cannot be read or the batch
    /// cannot be written.
    #[instrument(skip(self, server), fields(server_count = server.len()))]
    pub async fn merge_on_login(&self, server: &[PropertyId]) -> Result<Vec<PropertyId>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let buyer_key = SlotKeys::for_role(RoleNamespace::Buyer).favorites;

        let anonymous = self.read(ANONYMOUS_FAVORITES_KEY)?;
        let mut merged = self.read(&buyer_key)?;
        let local_count = anonymous.len();
        merged.extend(anonymous);
        merged.extend(server.iter().copied());

        let raw = serde_json::to_string(&merged)?;
        persist_batch(
            &self.storage,
            vec![
                (buyer_key, Some(raw)),
                (ANONYMOUS_FAVORITES_KEY.to_string(), None),
            ],
        )
        .await?;

        if local_count > 0 {
            info!(local_count, total = merged.len(), "Merged anonymous favorites into buyer account");
        } else {
            debug!(total = merged.len(), "Buyer favorites synced");
        }
        Ok(merged.into_iter().collect())
    }
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore").finish_non_exhaustive()
    }
}
