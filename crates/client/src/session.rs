//! Session slot store.
//!
//! One slot per [`RoleNamespace`], each holding a bearer token and the
//! identity it belongs to. All slots live behind a single lock so a reader
//! can never observe a token without its identity, and every write goes to
//! durable storage before it becomes visible in memory.
//!
//! Each slot carries a generation counter that is bumped on every set and
//! clear. Fetchers capture the generation when they start and check it again
//! before applying a response, which is how stale responses (logout or
//! re-login while a request was in flight) are discarded.

use std::collections::HashMap;
use std::sync::Arc;

use realty_core::{Identity, RoleNamespace};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::storage::{SessionStorage, SlotKeys, StorageOp, persist_batch};

#[derive(Default)]
struct SlotState {
    token: Option<SecretString>,
    principal: Option<Identity>,
    generation: u64,
}

impl SlotState {
    const fn authenticated(&self) -> bool {
        self.token.is_some() && self.principal.is_some()
    }
}

/// Consistent view of one authenticated slot.
#[derive(Clone)]
pub struct SessionSnapshot {
    pub token: SecretString,
    pub principal: Identity,
    pub generation: u64,
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("token", &"[REDACTED]")
            .field("principal", &self.principal.email)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Registry of the four role-scoped session slots.
///
/// Constructed once and shared by `Arc`; there is no ambient global.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    slots: RwLock<HashMap<RoleNamespace, SlotState>>,
}

impl SessionStore {
    /// Create a store with every slot empty.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let slots = RoleNamespace::ALL
            .into_iter()
            .map(|role| (role, SlotState::default()))
            .collect();
        Self {
            storage,
            slots: RwLock::new(slots),
        }
    }

    /// Durable storage backing this store.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Restore every slot whose persisted triple is complete.
    ///
    /// A partial or unreadable triple is removed from storage and the slot
    /// is left empty. Returns the namespaces that were restored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage cannot be read or repaired.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<Vec<RoleNamespace>, StorageError> {
        let mut slots = self.slots.write().await;
        let mut restored = Vec::new();

        for role in RoleNamespace::ALL {
            let keys = SlotKeys::for_role(role);
            let token = self.storage.load(&keys.token)?;
            let user = self.storage.load(&keys.user)?;
            let auth = self.storage.load(&keys.auth)?;

            let principal = user
                .as_deref()
                .and_then(|raw| serde_json::from_str::<Identity>(raw).ok());

            match (token, principal, auth.as_deref()) {
                (Some(token), Some(principal), Some("true")) => {
                    let slot = slots.entry(role).or_default();
                    slot.token = Some(SecretString::from(token));
                    slot.principal = Some(principal);
                    slot.generation += 1;
                    restored.push(role);
                }
                (None, None, None) if user.is_none() => {}
                _ => {
                    warn!(role = %role, "Discarding incomplete persisted session");
                    let ops: Vec<StorageOp> = [&keys.token, &keys.user, &keys.auth, &keys.id]
                        .into_iter()
                        .map(|key| (key.clone(), None))
                        .collect();
                    persist_batch(&self.storage, ops).await?;
                }
            }
        }

        if !restored.is_empty() {
            info!(roles = ?restored, "Restored persisted sessions");
        }
        Ok(restored)
    }

    /// Bearer token for `role`, if that slot is authenticated.
    pub async fn token(&self, role: RoleNamespace) -> Option<SecretString> {
        let slots = self.slots.read().await;
        slots
            .get(&role)
            .filter(|slot| slot.authenticated())
            .and_then(|slot| slot.token.clone())
    }

    /// Identity for `role`, if that slot is authenticated.
    pub async fn principal(&self, role: RoleNamespace) -> Option<Identity> {
        self.snapshot(role).await.map(|snapshot| snapshot.principal)
    }

    /// Stored principal id for `role`.
    pub async fn principal_id(&self, role: RoleNamespace) -> Option<realty_core::UserId> {
        self.principal(role).await.and_then(|principal| principal.id)
    }

    /// Token, identity and generation of `role`, read together.
    pub async fn snapshot(&self, role: RoleNamespace) -> Option<SessionSnapshot> {
        let slots = self.slots.read().await;
        let slot = slots.get(&role)?;
        match (&slot.token, &slot.principal) {
            (Some(token), Some(principal)) => Some(SessionSnapshot {
                token: token.clone(),
                principal: principal.clone(),
                generation: slot.generation,
            }),
            _ => None,
        }
    }

    /// Whether `role` is authenticated.
    pub async fn is_authenticated(&self, role: RoleNamespace) -> bool {
        self.slots
            .read()
            .await
            .get(&role)
            .is_some_and(SlotState::authenticated)
    }

    /// Whether `role` is still authenticated under `generation`.
    pub async fn is_current(&self, role: RoleNamespace, generation: u64) -> bool {
        self.slots
            .read()
            .await
            .get(&role)
            .is_some_and(|slot| slot.authenticated() && slot.generation == generation)
    }

    /// Install a new session for `role`. Returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be persisted; the
    /// in-memory slot is left unchanged in that case.
    #[instrument(skip(self, token, principal), fields(email = %principal.email))]
    pub async fn set_session(
        &self,
        role: RoleNamespace,
        token: SecretString,
        principal: Identity,
    ) -> Result<u64, StorageError> {
        let keys = SlotKeys::for_role(role);
        let user_json = serde_json::to_string(&principal)?;
        let ops = vec![
            (keys.token, Some(token.expose_secret().to_string())),
            (keys.user, Some(user_json)),
            (keys.auth, Some("true".to_string())),
            (keys.id, principal.id.map(|id| id.to_string())),
        ];

        let mut slots = self.slots.write().await;
        persist_batch(&self.storage, ops).await?;

        let slot = slots.entry(role).or_default();
        slot.token = Some(token);
        slot.principal = Some(principal);
        slot.generation += 1;
        info!(role = %role, generation = slot.generation, "Session established");
        Ok(slot.generation)
    }

    /// Drop `role`'s session and every persisted key of that namespace.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage cannot be updated. The in-memory
    /// slot is cleared regardless so the session cannot be used again.
    #[instrument(skip(self))]
    pub async fn clear_session(&self, role: RoleNamespace) -> Result<(), StorageError> {
        let mut slots = self.slots.write().await;
        self.clear_locked(&mut slots, role).await
    }

    /// Clear `role` only if it is still on `generation`.
    ///
    /// Used by the 401 handler: a session that was replaced since the
    /// request started is left alone. Returns whether the slot was cleared.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage cannot be updated.
    #[instrument(skip(self))]
    pub async fn expire_if_current(
        &self,
        role: RoleNamespace,
        generation: u64,
    ) -> Result<bool, StorageError> {
        let mut slots = self.slots.write().await;
        let current = slots
            .get(&role)
            .is_some_and(|slot| slot.authenticated() && slot.generation == generation);
        if !current {
            return Ok(false);
        }
        self.clear_locked(&mut slots, role).await?;
        Ok(true)
    }

    async fn clear_locked(
        &self,
        slots: &mut HashMap<RoleNamespace, SlotState>,
        role: RoleNamespace,
    ) -> Result<(), StorageError> {
        let keys = SlotKeys::for_role(role);
        let ops: Vec<StorageOp> = keys
            .all()
            .into_iter()
            .map(|key| (key.to_string(), None))
            .collect();

        let slot = slots.entry(role).or_default();
        if slot.authenticated() {
            info!(role = %role, "Session cleared");
        } else {
            debug!(role = %role, "Clearing already-empty session");
        }
        slot.token = None;
        slot.principal = None;
        slot.generation += 1;

        persist_batch(&self.storage, ops).await
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use realty_core::{RoleType, UserId};

    use super::*;
    use crate::storage::MemoryStorage;

    fn identity(email: &str, role_type: RoleType) -> Identity {
        Identity {
            id: Some(UserId::new(1)),
            display_name: "Test User".to_string(),
            email: email.to_string(),
            role_type,
            raw_profile: serde_json::Map::new(),
        }
    }

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        (storage, store)
    }

    #[tokio::test]
    async fn test_empty_slots_are_unauthenticated() {
        let (_, store) = store();
        for role in RoleNamespace::ALL {
            assert!(!store.is_authenticated(role).await);
            assert!(store.token(role).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_set_session_persists_triple() {
        let (storage, store) = store();
        store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("tok-admin"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();

        let entries = storage.entries();
        assert_eq!(entries.get("admin_token").map(String::as_str), Some("tok-admin"));
        assert_eq!(entries.get("admin_auth").map(String::as_str), Some("true"));
        assert_eq!(entries.get("admin_id").map(String::as_str), Some("1"));
        assert!(entries.contains_key("admin_user"));
        assert!(store.is_authenticated(RoleNamespace::Admin).await);
    }

    #[tokio::test]
    async fn test_clear_session_leaves_other_roles() {
        let (storage, store) = store();
        store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("tok-admin"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();
        store
            .set_session(
                RoleNamespace::Agent,
                SecretString::from("tok-agent"),
                identity("agent@example.com", RoleType::Agent),
            )
            .await
            .unwrap();

        store.clear_session(RoleNamespace::Admin).await.unwrap();

        let entries = storage.entries();
        assert!(entries.keys().all(|k| !k.starts_with("admin_")));
        assert_eq!(entries.get("agent_token").map(String::as_str), Some("tok-agent"));
        assert!(store.is_authenticated(RoleNamespace::Agent).await);
        assert!(!store.is_authenticated(RoleNamespace::Admin).await);
    }

    #[tokio::test]
    async fn test_generation_moves_on_every_write() {
        let (_, store) = store();
        let first = store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("a"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();
        assert!(store.is_current(RoleNamespace::Admin, first).await);

        store.clear_session(RoleNamespace::Admin).await.unwrap();
        assert!(!store.is_current(RoleNamespace::Admin, first).await);

        let second = store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("b"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();
        assert!(second > first);
        assert!(!store.is_current(RoleNamespace::Admin, first).await);
    }

    #[tokio::test]
    async fn test_expire_if_current_ignores_replaced_session() {
        let (_, store) = store();
        let old = store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("a"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();
        store
            .set_session(
                RoleNamespace::Admin,
                SecretString::from("b"),
                identity("admin@example.com", RoleType::Admin),
            )
            .await
            .unwrap();

        assert!(!store.expire_if_current(RoleNamespace::Admin, old).await.unwrap());
        assert!(store.is_authenticated(RoleNamespace::Admin).await);
    }

    #[tokio::test]
    async fn test_hydrate_restores_complete_triples_only() {
        let storage = Arc::new(MemoryStorage::new());
        let admin = serde_json::to_string(&identity("admin@example.com", RoleType::Admin)).unwrap();
        storage
            .write_batch(&[
                ("admin_token".to_string(), Some("tok".to_string())),
                ("admin_user".to_string(), Some(admin)),
                ("admin_auth".to_string(), Some("true".to_string())),
                // Agent slot is missing its identity
                ("agent_token".to_string(), Some("orphan".to_string())),
                ("agent_auth".to_string(), Some("true".to_string())),
            ])
            .unwrap();

        let store = SessionStore::new(storage.clone());
        let restored = store.hydrate().await.unwrap();

        assert_eq!(restored, vec![RoleNamespace::Admin]);
        assert!(store.is_authenticated(RoleNamespace::Admin).await);
        assert!(!store.is_authenticated(RoleNamespace::Agent).await);
        assert!(storage.entries().keys().all(|k| !k.starts_with("agent_")));
    }

    #[tokio::test]
    async fn test_snapshot_debug_redacts_token() {
        let (_, store) = store();
        store
            .set_session(
                RoleNamespace::Buyer,
                SecretString::from("very-secret-token"),
                identity("buyer@example.com", RoleType::Buyer),
            )
            .await
            .unwrap();
        let snapshot = store.snapshot(RoleNamespace::Buyer).await.unwrap();
        let debug = format!("{snapshot:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret-token"));
    }
}
