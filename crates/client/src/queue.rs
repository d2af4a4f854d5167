//! Entity queue cache.
//!
//! The admin console keeps one in-memory list per [`QueueId`]. The cache is
//! bound to one admin session generation at a time; results fetched under
//! any other generation are discarded on publish, and the whole cache is
//! dropped when the admin session ends.

use std::collections::{BTreeMap, HashSet};

use realty_core::{ApprovableEntity, QueueId, VerificationStatus};
use tokio::sync::RwLock;
use tracing::debug;

/// One remote list that feeds a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSource {
    pub path: &'static str,
    pub size: u32,
    pub sort: Option<&'static str>,
    /// Whether the endpoint lists records awaiting review.
    pub lists_pending: bool,
}

impl QueueSource {
    const fn new(path: &'static str, size: u32) -> Self {
        Self {
            path,
            size,
            sort: None,
            lists_pending: false,
        }
    }

    const fn pending(path: &'static str, size: u32) -> Self {
        Self {
            lists_pending: true,
            ..Self::new(path, size)
        }
    }

    const fn sorted(path: &'static str, size: u32, sort: &'static str) -> Self {
        Self {
            sort: Some(sort),
            ..Self::new(path, size)
        }
    }

    /// Status assumed for a record from this endpoint that reports none.
    #[must_use]
    pub const fn default_status(&self) -> VerificationStatus {
        if self.lists_pending {
            VerificationStatus::Pending
        } else {
            VerificationStatus::Approved
        }
    }

    /// Query parameters for the first page.
    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", "0".to_string()), ("size", self.size.to_string())];
        if let Some(sort) = self.sort {
            query.push(("sort", sort.to_string()));
        }
        query
    }
}

const PROPERTY_SORT: &str = "createdAt,desc";

const PROPERTIES: [QueueSource; 2] = [
    QueueSource {
        lists_pending: true,
        ..QueueSource::sorted("/properties/pending-verification", 100, PROPERTY_SORT)
    },
    QueueSource::sorted("/public/properties", 100, PROPERTY_SORT),
];
const ALL_AGENTS: [QueueSource; 1] = [QueueSource::new("/agents", 100)];
const PENDING_AGENTS: [QueueSource; 1] =
    [QueueSource::pending("/admin/agents/pending-approval/individual", 50)];
const PENDING_COMPANY_AGENTS: [QueueSource; 1] =
    [QueueSource::pending("/admin/agents/pending-approval/from-company", 50)];
const COMPANIES: [QueueSource; 1] = [QueueSource::new("/companies", 100)];
const PENDING_COMPANIES: [QueueSource; 1] =
    [QueueSource::pending("/admin/dashboard/pending-approvals/companies", 50)];
const PROJECTS: [QueueSource; 1] = [QueueSource::new("/properties/projects/view", 100)];
const PENDING_PROJECTS: [QueueSource; 1] = [QueueSource::pending("/properties/projects/pending", 50)];

/// Remote lists feeding `queue`, in merge order.
#[must_use]
pub const fn sources(queue: QueueId) -> &'static [QueueSource] {
    match queue {
        QueueId::Properties => &PROPERTIES,
        QueueId::AllAgents => &ALL_AGENTS,
        QueueId::PendingAgents => &PENDING_AGENTS,
        QueueId::PendingCompanyAgents => &PENDING_COMPANY_AGENTS,
        QueueId::Companies => &COMPANIES,
        QueueId::PendingCompanies => &PENDING_COMPANIES,
        QueueId::Projects => &PROJECTS,
        QueueId::PendingProjects => &PENDING_PROJECTS,
    }
}

/// Whether `queue` gets a per-entity document enrichment pass.
#[must_use]
pub const fn needs_documents(queue: QueueId) -> bool {
    matches!(queue, QueueId::PendingCompanyAgents)
}

/// Concatenate source lists in order, dropping ids already seen.
#[must_use]
pub fn merge_sources(lists: Vec<Vec<ApprovableEntity>>) -> Vec<ApprovableEntity> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|entity| seen.insert(entity.id))
        .collect()
}

/// Contents of every queue at one instant.
pub type QueueSnapshot = BTreeMap<QueueId, Vec<ApprovableEntity>>;

#[derive(Debug, Default)]
struct CacheState {
    generation: Option<u64>,
    queues: QueueSnapshot,
}

/// In-memory queues owned by the admin session.
#[derive(Debug, Default)]
pub struct QueueCache {
    state: RwLock<CacheState>,
}

impl QueueCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the cache to admin session `generation`, dropping anything
    /// cached for an earlier session.
    pub async fn bind(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation != Some(generation) {
            state.queues.clear();
            state.generation = Some(generation);
        }
    }

    /// Detach from the admin session and drop every queue.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.generation = None;
        state.queues.clear();
    }

    /// Generation the cache is currently bound to.
    pub async fn generation(&self) -> Option<u64> {
        self.state.read().await.generation
    }

    /// Replace `queue` wholesale if the cache is still bound to `generation`.
    ///
    /// Returns `false` (and changes nothing) for a stale result.
    pub async fn publish(
        &self,
        queue: QueueId,
        generation: u64,
        items: Vec<ApprovableEntity>,
    ) -> bool {
        let mut state = self.state.write().await;
        if state.generation != Some(generation) {
            debug!(queue = %queue, generation, "Discarding result for a stale admin session");
            return false;
        }
        state.queues.insert(queue, items);
        true
    }

    /// Contents of one queue (empty if never fetched).
    pub async fn get(&self, queue: QueueId) -> Vec<ApprovableEntity> {
        self.state
            .read()
            .await
            .queues
            .get(&queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `queue` has been fetched under the current session.
    pub async fn contains(&self, queue: QueueId) -> bool {
        self.state.read().await.queues.contains_key(&queue)
    }

    /// Contents of every fetched queue.
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.state.read().await.queues.clone()
    }
}
