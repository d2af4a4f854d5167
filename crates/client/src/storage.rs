//! Durable key-value storage for session slots and favorites.
//!
//! Every write is a batch so that a slot's token, identity and auth flag are
//! always persisted or removed together.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realty_core::RoleNamespace;
use tracing::debug;

use crate::error::StorageError;

/// Key used for favorites saved while nobody is signed in.
pub const ANONYMOUS_FAVORITES_KEY: &str = "favorites";

/// One write in a batch: `Some` sets the key, `None` removes it.
pub type StorageOp = (String, Option<String>);

/// Persisted key-value store.
pub trait SessionStorage: Send + Sync {
    /// Read one key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Apply every operation in `ops` atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be persisted; in that case
    /// none of it is applied.
    fn write_batch(&self, ops: &[StorageOp]) -> Result<(), StorageError>;
}

/// Persisted keys belonging to one role namespace.
#[derive(Debug, Clone)]
pub struct SlotKeys {
    pub token: String,
    pub user: String,
    pub auth: String,
    pub id: String,
    pub favorites: String,
}

impl SlotKeys {
    #[must_use]
    pub fn for_role(role: RoleNamespace) -> Self {
        let prefix = role.storage_prefix();
        Self {
            token: format!("{prefix}_token"),
            user: format!("{prefix}_user"),
            auth: format!("{prefix}_auth"),
            id: format!("{prefix}_id"),
            favorites: format!("{prefix}_favorites"),
        }
    }

    /// Every key of the namespace, for a full clear.
    #[must_use]
    pub fn all(&self) -> [&str; 5] {
        [
            self.token.as_str(),
            self.user.as_str(),
            self.auth.as_str(),
            self.id.as_str(),
            self.favorites.as_str(),
        ]
    }
}

/// Apply a batch on tokio's blocking pool.
///
/// Async callers persist through this so file I/O never runs on a runtime
/// worker, even while they hold a session lock.
///
/// # Errors
///
/// Returns `StorageError` if the batch cannot be persisted or the blocking
/// task fails.
pub async fn persist_batch(
    storage: &Arc<dyn SessionStorage>,
    ops: Vec<StorageOp>,
) -> Result<(), StorageError> {
    let storage = Arc::clone(storage);
    tokio::task::spawn_blocking(move || storage.write_batch(&ops))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-batch cannot leave the map half-written: batches are
    // applied to a copy and swapped in.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply(map: &mut BTreeMap<String, String>, ops: &[StorageOp]) {
    for (key, value) in ops {
        match value {
            Some(value) => {
                map.insert(key.clone(), value.clone());
            }
            None => {
                map.remove(key);
            }
        }
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, String> {
        lock(&self.entries).clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write_batch(&self, ops: &[StorageOp]) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        apply(&mut next, ops);
        *entries = next;
        Ok(())
    }
}

// =============================================================================
// File storage
// =============================================================================

/// Storage backed by a single JSON object file.
///
/// Batches are written to a sibling temp file and renamed into place.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be read or is
    /// not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Session file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write_batch(&self, ops: &[StorageOp]) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        apply(&mut next, ops);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "realty-storage-{name}-{}-{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[test]
    fn test_slot_keys_are_namespaced() {
        let admin = SlotKeys::for_role(RoleNamespace::Admin);
        let agent = SlotKeys::for_role(RoleNamespace::Agent);
        assert_eq!(admin.token, "admin_token");
        assert_eq!(admin.auth, "admin_auth");
        assert_eq!(agent.user, "agent_user");
        assert!(admin.all().iter().all(|k| !agent.all().contains(k)));
    }

    #[test]
    fn test_memory_batch_sets_and_removes() {
        let storage = MemoryStorage::new();
        storage
            .write_batch(&[
                ("a".to_string(), Some("1".to_string())),
                ("b".to_string(), Some("2".to_string())),
            ])
            .unwrap();
        storage
            .write_batch(&[("a".to_string(), None), ("c".to_string(), Some("3".to_string()))])
            .unwrap();

        assert_eq!(storage.load("a").unwrap(), None);
        assert_eq!(storage.load("b").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.load("c").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_file_storage_persists_across_reopen() {
        let path = temp_path("reopen");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .write_batch(&[("admin_token".to_string(), Some("t-1".to_string()))])
                .unwrap();
        }
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.load("admin_token").unwrap().as_deref(), Some("t-1"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_persist_batch_writes_file_off_the_runtime() {
        let path = temp_path("blocking");
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::open(&path).unwrap());
        let slots = tokio::sync::RwLock::new(());
        let _held = slots.write().await;

        persist_batch(
            &storage,
            vec![
                ("buyer_token".to_string(), Some("t-2".to_string())),
                ("buyer_auth".to_string(), Some("true".to_string())),
            ],
        )
        .await
        .unwrap();
        persist_batch(&storage, vec![("buyer_auth".to_string(), None)])
            .await
            .unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.load("buyer_token").unwrap().as_deref(), Some("t-2"));
        assert_eq!(reopened.load("buyer_auth").unwrap(), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let path = temp_path("missing");
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.load("anything").unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Serialization(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
