//! Admin console: queue refreshes and read-only admin lookups.
//!
//! A refresh never fails loudly. Each one reports a [`RefreshOutcome`], and
//! a failure only touches the queue that failed. A 401 ends the admin
//! session when the session that issued the request is still the current
//! one; otherwise the response belongs to a session that is already gone
//! and is dropped without touching anything.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use realty_core::{ApprovableEntity, Document, EntityId, EntityKind, QueueId, RoleNamespace};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::conversions::{convert_document, convert_listing};
use crate::envelope::{ListEnvelope, count_from_json};
use crate::error::ApiError;
use crate::http::ApiClient;
use crate::notice::{Notice, NoticeKind, NoticeSink};
use crate::queue::{QueueCache, QueueSnapshot, merge_sources, needs_documents, sources};
use crate::session::SessionStore;
use crate::stats::DerivedStats;

const DOCUMENT_PAGE_SIZE: u32 = 20;

/// What one queue refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The queue was replaced with `count` entities.
    Updated { count: usize },
    /// No admin session; nothing was requested.
    Skipped,
    /// The fetch failed; the previous contents are kept.
    Failed(String),
    /// The admin session expired and the cache was dropped.
    Expired,
    /// The response belonged to a session that has since ended or been
    /// replaced; nothing was applied.
    Discarded,
}

impl RefreshOutcome {
    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Verified and pending company counts reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatistics {
    pub verified: u64,
    pub pending: u64,
}

/// The admin console engine.
pub struct AdminConsole {
    pub(crate) api: ApiClient,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) cache: QueueCache,
    pub(crate) notices: Arc<dyn NoticeSink>,
}

impl AdminConsole {
    #[must_use]
    pub fn new(api: ApiClient, sessions: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            api,
            sessions,
            cache: QueueCache::new(),
            notices,
        }
    }

    /// Attach the queue cache to admin session `generation`.
    pub async fn bind_session(&self, generation: u64) {
        self.cache.bind(generation).await;
    }

    /// Drop every cached queue.
    pub async fn detach(&self) {
        self.cache.invalidate().await;
    }

    /// Current contents of one queue.
    pub async fn queue(&self, queue: QueueId) -> Vec<ApprovableEntity> {
        self.cache.get(queue).await
    }

    /// Current contents of every fetched queue.
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.cache.snapshot().await
    }

    /// Dashboard counters over the current cache.
    pub async fn stats(&self) -> DerivedStats {
        DerivedStats::compute(&self.cache.snapshot().await)
    }

    /// Refetch one queue and replace it wholesale.
    #[instrument(skip(self), fields(queue = %queue))]
    pub async fn refresh(&self, queue: QueueId) -> RefreshOutcome {
        let Some(session) = self.sessions.snapshot(RoleNamespace::Admin).await else {
            debug!("No admin session, skipping refresh");
            return RefreshOutcome::Skipped;
        };
        let generation = session.generation;

        match self.fetch_queue(queue, &session.token).await {
            Ok(items) => {
                if !self.sessions.is_current(RoleNamespace::Admin, generation).await {
                    debug!(generation, "Admin session changed during refresh");
                    return RefreshOutcome::Discarded;
                }
                let count = items.len();
                if self.cache.publish(queue, generation, items).await {
                    debug!(count, "Queue refreshed");
                    RefreshOutcome::Updated { count }
                } else {
                    RefreshOutcome::Discarded
                }
            }
            Err(ApiError::Unauthorized(_)) => {
                if self.handle_unauthorized(generation).await {
                    RefreshOutcome::Expired
                } else {
                    RefreshOutcome::Discarded
                }
            }
            Err(e) => {
                if !self.sessions.is_current(RoleNamespace::Admin, generation).await {
                    debug!(error = %e, "Ignoring failure from an ended admin session");
                    return RefreshOutcome::Discarded;
                }
                let message = e.to_string();
                warn!(error = %message, "Queue refresh failed, keeping previous contents");
                self.notices.push(Notice::new(NoticeKind::QueueError {
                    queue,
                    message: message.clone(),
                }));
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Refresh several queues concurrently.
    pub async fn refresh_many(&self, queues: &[QueueId]) -> Vec<(QueueId, RefreshOutcome)> {
        let outcomes = join_all(queues.iter().map(|&queue| self.refresh(queue))).await;
        queues.iter().copied().zip(outcomes).collect()
    }

    /// Refresh every queue concurrently.
    pub async fn refresh_all(&self) -> Vec<(QueueId, RefreshOutcome)> {
        self.refresh_many(&QueueId::ALL).await
    }

    /// End the admin session after a 401 seen under `generation`.
    ///
    /// Returns `true` if the session was expired, `false` if the 401 belonged
    /// to a session that had already ended or been replaced.
    pub(crate) async fn handle_unauthorized(&self, generation: u64) -> bool {
        let expired = match self
            .sessions
            .expire_if_current(RoleNamespace::Admin, generation)
            .await
        {
            Ok(expired) => expired,
            Err(e) => {
                warn!(error = %e, "Failed to remove expired admin session from storage");
                true
            }
        };

        if expired {
            warn!(generation, "Admin session expired");
            self.cache.invalidate().await;
            self.notices.push(Notice::session_expired(RoleNamespace::Admin));
        } else {
            debug!(generation, "Ignoring 401 from an ended admin session");
        }
        expired
    }

    async fn fetch_queue(
        &self,
        queue: QueueId,
        token: &SecretString,
    ) -> Result<Vec<ApprovableEntity>, ApiError> {
        let lists = try_join_all(sources(queue).iter().map(|source| async move {
            let body = self
                .api
                .get_json(source.path, &source.query(), Some(token))
                .await?;
            Ok::<_, ApiError>(convert_listing(
                queue,
                ListEnvelope::from_json(body).into_items(),
                source.default_status(),
            ))
        }))
        .await?;

        let mut items = merge_sources(lists);
        if needs_documents(queue) {
            self.attach_documents(&mut items, token).await;
        }
        Ok(items)
    }

    /// Load each agent's documents concurrently. A failed lookup leaves that
    /// agent with no documents.
    async fn attach_documents(&self, items: &mut [ApprovableEntity], token: &SecretString) {
        let lookups = items
            .iter()
            .map(|entity| self.documents_for(EntityKind::Agent, entity.id, token));
        let results = join_all(lookups).await;

        for (entity, result) in items.iter_mut().zip(results) {
            match result {
                Ok(documents) => entity.documents = documents,
                Err(e) => {
                    warn!(id = %entity.id, error = %e, "Failed to load agent documents");
                    entity.documents = Vec::new();
                }
            }
        }
    }

    async fn documents_for(
        &self,
        owner: EntityKind,
        id: EntityId,
        token: &SecretString,
    ) -> Result<Vec<Document>, ApiError> {
        let owner_type = match owner {
            EntityKind::Company => "COMPANY",
            _ => "AGENT",
        };
        let query = [
            ("page", "0".to_string()),
            ("size", DOCUMENT_PAGE_SIZE.to_string()),
            ("sortBy", "uploadedAt".to_string()),
            ("sortDir", "desc".to_string()),
        ];
        let body = self
            .api
            .get_json(&format!("/documents/entity/{owner_type}/{id}"), &query, Some(token))
            .await?;
        Ok(ListEnvelope::from_json(body)
            .into_items()
            .into_iter()
            .filter_map(convert_document)
            .collect())
    }

    /// Documents uploaded for an agent or company.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` without sending anything when no
    /// admin is signed in, or `ApiError::Protocol` for an owner kind that
    /// has no documents.
    #[instrument(skip(self))]
    pub async fn fetch_documents(
        &self,
        owner: EntityKind,
        id: EntityId,
    ) -> Result<Vec<Document>, ApiError> {
        if !matches!(
            owner,
            EntityKind::Agent | EntityKind::CompanyAgent | EntityKind::Company
        ) {
            return Err(ApiError::Protocol(format!("{owner} records carry no documents")));
        }
        let token = self.admin_token().await?;
        self.documents_for(owner, id, &token).await
    }

    /// Verified and pending company counts.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if either count cannot be fetched or read.
    #[instrument(skip(self))]
    pub async fn company_statistics(&self) -> Result<CompanyStatistics, ApiError> {
        let token = self.admin_token().await?;
        let (verified, pending) = futures::try_join!(
            self.api
                .get_json("/companies/statistics/verified", &[], Some(&token)),
            self.api
                .get_json("/companies/statistics/pending", &[], Some(&token)),
        )?;

        let read = |body: &serde_json::Value, which: &str| {
            count_from_json(body)
                .ok_or_else(|| ApiError::Protocol(format!("Unreadable {which} company count")))
        };
        let stats = CompanyStatistics {
            verified: read(&verified, "verified")?,
            pending: read(&pending, "pending")?,
        };
        info!(verified = stats.verified, pending = stats.pending, "Company statistics loaded");
        Ok(stats)
    }

    async fn admin_token(&self) -> Result<SecretString, ApiError> {
        self.sessions
            .token(RoleNamespace::Admin)
            .await
            .ok_or_else(|| ApiError::Unauthorized("No admin session".to_string()))
    }
}

impl std::fmt::Debug for AdminConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConsole")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use realty_core::{Identity, RoleType, UserId};

    use super::*;
    use crate::config::ClientConfig;
    use crate::notice::NoticeBoard;
    use crate::storage::MemoryStorage;

    fn console() -> (AdminConsole, Arc<NoticeBoard>) {
        // Nothing listens here; these tests never reach the network.
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let sessions = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let board = Arc::new(NoticeBoard::new());
        let console = AdminConsole::new(ApiClient::new(&config).unwrap(), sessions, board.clone());
        (console, board)
    }

    fn admin() -> Identity {
        Identity {
            id: Some(UserId::new(1)),
            display_name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            role_type: RoleType::Admin,
            raw_profile: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_admin_is_skipped() {
        let (console, board) = console();
        assert_eq!(console.refresh(QueueId::Companies).await, RefreshOutcome::Skipped);
        assert!(board.peek().is_empty());
        assert_eq!(console.stats().await, DerivedStats::default());
    }

    #[tokio::test]
    async fn test_unauthorized_from_current_session_expires_it() {
        let (console, board) = console();
        let generation = console
            .sessions
            .set_session(RoleNamespace::Admin, SecretString::from("t"), admin())
            .await
            .unwrap();
        console.bind_session(generation).await;

        assert!(console.handle_unauthorized(generation).await);
        assert!(!console.sessions.is_authenticated(RoleNamespace::Admin).await);
        assert_eq!(console.cache.generation().await, None);

        let notices = board.drain();
        assert_eq!(notices.len(), 1);
        assert!(!notices[0].is_dismissible());
    }

    #[tokio::test]
    async fn test_unauthorized_from_replaced_session_is_ignored() {
        let (console, board) = console();
        let old = console
            .sessions
            .set_session(RoleNamespace::Admin, SecretString::from("old"), admin())
            .await
            .unwrap();
        let new = console
            .sessions
            .set_session(RoleNamespace::Admin, SecretString::from("new"), admin())
            .await
            .unwrap();
        console.bind_session(new).await;

        assert!(!console.handle_unauthorized(old).await);
        assert!(console.sessions.is_authenticated(RoleNamespace::Admin).await);
        assert_eq!(console.cache.generation().await, Some(new));
        assert!(board.peek().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_documents_requires_admin() {
        let (console, _) = console();
        let err = console
            .fetch_documents(EntityKind::Agent, EntityId::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = console
            .fetch_documents(EntityKind::Property, EntityId::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Protocol(_)));
    }
}
