//! Approvable entities and the queues that hold them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DocumentId, EntityId, UserId};
use super::status::VerificationStatus;

/// Kind of entity that goes through the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Independent agent.
    Agent,
    /// Agent registered through a company.
    CompanyAgent,
    Company,
    Property,
    Project,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Agent,
        Self::CompanyAgent,
        Self::Company,
        Self::Property,
        Self::Project,
    ];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::CompanyAgent => write!(f, "company_agent"),
            Self::Company => write!(f, "company"),
            Self::Property => write!(f, "property"),
            Self::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "agent" => Ok(Self::Agent),
            "company_agent" => Ok(Self::CompanyAgent),
            "company" => Ok(Self::Company),
            "property" => Ok(Self::Property),
            "project" => Ok(Self::Project),
            other => Err(format!("invalid entity kind: {other}")),
        }
    }
}

/// References from an entity to the company and user that own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnerRefs {
    pub company: Option<EntityId>,
    pub user: Option<UserId>,
}

/// A document uploaded for an entity (licence scans, registration papers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<DocumentId>,
    pub file_name: Option<String>,
    pub document_type: Option<String>,
    pub url: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Everything the server sent for this document.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// An entity as held in a queue.
///
/// Only the fields the workflow needs are lifted out; the rest of the
/// server's record is kept verbatim in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovableEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub verification_status: VerificationStatus,
    pub owner: OwnerRefs,
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Uploaded documents, only populated for queues with an enrichment pass.
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl ApprovableEntity {
    /// Whether a boolean payload flag is set under any of the given names.
    #[must_use]
    pub fn flag(&self, names: &[&str]) -> bool {
        names.iter().any(|name| {
            self.payload
                .get(*name)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        })
    }
}

/// Identifier of a cached queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueId {
    Properties,
    AllAgents,
    PendingAgents,
    PendingCompanyAgents,
    Companies,
    PendingCompanies,
    Projects,
    PendingProjects,
}

impl QueueId {
    pub const ALL: [Self; 8] = [
        Self::Properties,
        Self::AllAgents,
        Self::PendingAgents,
        Self::PendingCompanyAgents,
        Self::Companies,
        Self::PendingCompanies,
        Self::Projects,
        Self::PendingProjects,
    ];

    /// Kind of entity held by this queue.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Properties => EntityKind::Property,
            Self::AllAgents | Self::PendingAgents => EntityKind::Agent,
            Self::PendingCompanyAgents => EntityKind::CompanyAgent,
            Self::Companies | Self::PendingCompanies => EntityKind::Company,
            Self::Projects | Self::PendingProjects => EntityKind::Project,
        }
    }

    /// Whether every entity in this queue must be `PENDING`.
    #[must_use]
    pub const fn is_pending_queue(self) -> bool {
        matches!(
            self,
            Self::PendingAgents
                | Self::PendingCompanyAgents
                | Self::PendingCompanies
                | Self::PendingProjects
        )
    }

    /// Name used in notices and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::AllAgents => "allAgents",
            Self::PendingAgents => "pendingAgents",
            Self::PendingCompanyAgents => "pendingCompanyAgents",
            Self::Companies => "companies",
            Self::PendingCompanies => "pendingCompanies",
            Self::Projects => "projects",
            Self::PendingProjects => "pendingProjects",
        }
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for QueueId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|queue| queue.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid queue: {s}"))
    }
}
