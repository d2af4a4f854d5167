//! Approval coordinator.
//!
//! Approve, reject and create-phase mutations issued from the admin console.
//! The coordinator never edits the queue cache itself: once the authority
//! accepts a mutation, the queues it could have changed are refetched, and
//! that refetch is the only thing that moves an entity between queues.

use std::collections::BTreeMap;

use realty_core::{EntityId, EntityKind, QueueId, RoleNamespace, UserId};
use reqwest::multipart::{Form, Part};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::console::AdminConsole;
use crate::error::{ApiError, MutationError};
use crate::notice::{Notice, NoticeKind};

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Approve,
    Reject,
    CreatePhase,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::CreatePhase => "create-phase",
        })
    }
}

const AGENT_QUEUES: [QueueId; 3] = [
    QueueId::PendingAgents,
    QueueId::PendingCompanyAgents,
    QueueId::AllAgents,
];
const COMPANY_QUEUES: [QueueId; 3] = [
    QueueId::PendingCompanies,
    QueueId::Companies,
    QueueId::PendingCompanyAgents,
];
const PROPERTY_QUEUES: [QueueId; 1] = [QueueId::Properties];
const PROJECT_QUEUES: [QueueId; 2] = [QueueId::PendingProjects, QueueId::Projects];
const PHASE_QUEUES: [QueueId; 2] = [QueueId::Projects, QueueId::PendingProjects];

/// Queues to refetch after a successful `mutation` on `kind`.
///
/// Never empty. An agent decision touches both pending agent queues, since
/// the same agent can be listed in each.
#[must_use]
pub const fn refresh_set(kind: EntityKind, mutation: MutationKind) -> &'static [QueueId] {
    match (kind, mutation) {
        (_, MutationKind::CreatePhase) => &PHASE_QUEUES,
        (EntityKind::Agent | EntityKind::CompanyAgent, _) => &AGENT_QUEUES,
        (EntityKind::Company, _) => &COMPANY_QUEUES,
        (EntityKind::Property, _) => &PROPERTY_QUEUES,
        (EntityKind::Project, _) => &PROJECT_QUEUES,
    }
}

/// Whether decisions on `kind` carry the deciding admin's id.
const fn requires_admin_id(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Agent | EntityKind::CompanyAgent | EntityKind::Company
    )
}

fn decision_path(kind: EntityKind, id: EntityId, mutation: MutationKind) -> String {
    let base = match kind {
        EntityKind::Agent | EntityKind::CompanyAgent => format!("/admin/agents/{id}"),
        EntityKind::Company => format!("/companies/{id}"),
        EntityKind::Property => format!("/properties/{id}"),
        EntityKind::Project => format!("/properties/projects/view/{id}"),
    };
    format!("{base}/{mutation}")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRequest<'a> {
    approver_id: UserId,
    approval_notes: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionRequest<'a> {
    rejector_id: UserId,
    rejection_reason: &'a str,
    rejection_details: Option<&'a str>,
}

/// File attached to a new project phase.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Multipart field name.
    pub field_name: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Contents of a new project phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseDraft {
    pub name: String,
    pub description: Option<String>,
    /// Extra text fields, sent as-is.
    pub fields: BTreeMap<String, String>,
    pub attachments: Vec<Attachment>,
}

impl PhaseDraft {
    fn into_form(self) -> Result<Form, MutationError> {
        if self.name.trim().is_empty() {
            return Err(MutationError::InvalidInput("phase name is required".to_string()));
        }

        let mut form = Form::new().text("name", self.name);
        if let Some(description) = self.description {
            form = form.text("description", description);
        }
        for (key, value) in self.fields {
            form = form.text(key, value);
        }
        for attachment in self.attachments {
            let mut part = Part::bytes(attachment.bytes).file_name(attachment.file_name);
            if let Some(mime) = attachment.mime_type {
                part = part
                    .mime_str(&mime)
                    .map_err(|e| MutationError::InvalidInput(format!("bad mime type {mime}: {e}")))?;
            }
            form = form.part(attachment.field_name, part);
        }
        Ok(form)
    }
}

impl AdminConsole {
    /// Approve a pending entity.
    ///
    /// # Errors
    ///
    /// - `MutationError::AuthRequired` if no admin is signed in (or the
    ///   admin has no id for an agent or company decision)
    /// - `MutationError::SessionExpired` if the authority answered 401
    /// - `MutationError::ServerRejected` with the server's message
    #[instrument(skip(self, notes), fields(kind = %kind, id = %id))]
    pub async fn approve(
        &self,
        kind: EntityKind,
        id: EntityId,
        notes: Option<&str>,
    ) -> Result<(), MutationError> {
        let (token, generation, approver_id) = self.mutation_session(kind).await?;
        let path = decision_path(kind, id, MutationKind::Approve);

        let result = match approver_id {
            Some(approver_id) => {
                let body = ApprovalRequest {
                    approver_id,
                    approval_notes: notes,
                };
                self.api
                    .post_for_status(&path, &[], Some(&body), Some(&token))
                    .await
            }
            None => {
                self.api
                    .post_for_status::<Value>(&path, &[], None, Some(&token))
                    .await
            }
        };

        self.complete(kind, MutationKind::Approve, generation, result, format!("{kind} {id} approved"))
            .await
    }

    /// Reject a pending entity with a reason.
    ///
    /// # Errors
    ///
    /// Same as [`AdminConsole::approve`], plus `MutationError::InvalidInput`
    /// for an empty reason.
    #[instrument(skip(self, reason, details), fields(kind = %kind, id = %id))]
    pub async fn reject(
        &self,
        kind: EntityKind,
        id: EntityId,
        reason: &str,
        details: Option<&str>,
    ) -> Result<(), MutationError> {
        if reason.trim().is_empty() {
            return Err(MutationError::InvalidInput("a rejection reason is required".to_string()));
        }
        let (token, generation, rejector_id) = self.mutation_session(kind).await?;
        let path = decision_path(kind, id, MutationKind::Reject);

        let result = match rejector_id {
            Some(rejector_id) => {
                let body = RejectionRequest {
                    rejector_id,
                    rejection_reason: reason,
                    rejection_details: details,
                };
                self.api
                    .post_for_status(&path, &[], Some(&body), Some(&token))
                    .await
            }
            None => {
                self.api
                    .post_for_status::<Value>(
                        &path,
                        &[("reason", reason.to_string())],
                        None,
                        Some(&token),
                    )
                    .await
            }
        };

        self.complete(kind, MutationKind::Reject, generation, result, format!("{kind} {id} rejected"))
            .await
    }

    /// Add a phase to a project.
    ///
    /// # Errors
    ///
    /// Same as [`AdminConsole::approve`], plus `MutationError::InvalidInput`
    /// for a draft that cannot be encoded.
    #[instrument(skip(self, draft), fields(project = %project_id, phase = %draft.name))]
    pub async fn create_project_phase(
        &self,
        project_id: EntityId,
        draft: PhaseDraft,
    ) -> Result<(), MutationError> {
        let form = draft.into_form()?;
        let (token, generation, _) = self.mutation_session(EntityKind::Project).await?;

        let result = self
            .api
            .post_multipart(&format!("/projects/{project_id}/phases"), form, Some(&token))
            .await
            .map(|_| ());

        self.complete(
            EntityKind::Project,
            MutationKind::CreatePhase,
            generation,
            result,
            format!("Phase added to project {project_id}"),
        )
        .await
    }

    /// Token and generation of the admin session, plus the admin's id when
    /// `kind` needs it. Nothing is sent without them.
    async fn mutation_session(
        &self,
        kind: EntityKind,
    ) -> Result<(SecretString, u64, Option<UserId>), MutationError> {
        let session = self
            .sessions
            .snapshot(RoleNamespace::Admin)
            .await
            .ok_or(MutationError::AuthRequired("no admin session"))?;

        let admin_id = if requires_admin_id(kind) {
            Some(
                session
                    .principal
                    .id
                    .ok_or(MutationError::AuthRequired("admin identity has no id"))?,
            )
        } else {
            None
        };
        Ok((session.token, session.generation, admin_id))
    }

    async fn complete(
        &self,
        kind: EntityKind,
        mutation: MutationKind,
        generation: u64,
        result: Result<(), ApiError>,
        confirmation: String,
    ) -> Result<(), MutationError> {
        let error = match result {
            Ok(()) => {
                info!(kind = %kind, mutation = %mutation, "Mutation accepted");
                self.notices.push(Notice::new(NoticeKind::Confirmation {
                    message: confirmation,
                }));
                self.refresh_many(refresh_set(kind, mutation)).await;
                return Ok(());
            }
            Err(ApiError::Unauthorized(_)) => {
                return if self.handle_unauthorized(generation).await {
                    Err(MutationError::SessionExpired)
                } else {
                    Err(MutationError::AuthRequired("admin session ended"))
                };
            }
            Err(ApiError::Rejected { status, message }) => {
                MutationError::ServerRejected { status, message }
            }
            Err(ApiError::Network(e)) => MutationError::Network(e),
            Err(ApiError::Protocol(message)) => MutationError::Protocol(message),
        };

        warn!(kind = %kind, mutation = %mutation, error = %error, "Mutation failed");
        self.notices.push(Notice::new(NoticeKind::MutationFailed {
            message: error.to_string(),
        }));
        Err(error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::http::ApiClient;
    use crate::notice::NoticeBoard;
    use crate::session::SessionStore;
    use crate::storage::MemoryStorage;

    fn console() -> (AdminConsole, Arc<NoticeBoard>) {
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let sessions = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let board = Arc::new(NoticeBoard::new());
        let console = AdminConsole::new(ApiClient::new(&config).unwrap(), sessions, board.clone());
        (console, board)
    }

    #[tokio::test]
    async fn test_rejected_mutation_posts_failure_notice() {
        let (console, board) = console();
        let result = console
            .complete(
                EntityKind::Agent,
                MutationKind::Approve,
                0,
                Err(ApiError::Rejected {
                    status: 409,
                    message: "Agent 42 is not pending".to_string(),
                }),
                String::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(MutationError::ServerRejected { status: 409, ref message })
                if message == "Agent 42 is not pending"
        ));
        let notices = board.peek();
        assert_eq!(notices.len(), 1);
        assert!(matches!(
            notices.first().map(|n| &n.kind),
            Some(NoticeKind::MutationFailed { message }) if message == "Agent 42 is not pending"
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_after_session_ended_posts_nothing() {
        let (console, board) = console();
        let result = console
            .complete(
                EntityKind::Company,
                MutationKind::Reject,
                3,
                Err(ApiError::Unauthorized("Token expired".to_string())),
                String::new(),
            )
            .await;

        assert!(matches!(result, Err(MutationError::AuthRequired(_))));
        assert!(board.peek().is_empty());
    }

    #[test]
    fn test_refresh_set_is_total() {
        for kind in EntityKind::ALL {
            for mutation in [MutationKind::Approve, MutationKind::Reject] {
                assert!(!refresh_set(kind, mutation).is_empty());
            }
        }
    }

    #[test]
    fn test_agent_decisions_refresh_both_pending_queues() {
        for kind in [EntityKind::Agent, EntityKind::CompanyAgent] {
            let set = refresh_set(kind, MutationKind::Approve);
            assert!(set.contains(&QueueId::PendingAgents));
            assert!(set.contains(&QueueId::PendingCompanyAgents));
            assert!(set.contains(&QueueId::AllAgents));
        }
        assert!(refresh_set(EntityKind::Company, MutationKind::Reject)
            .contains(&QueueId::PendingCompanyAgents));
        assert_eq!(
            refresh_set(EntityKind::Project, MutationKind::CreatePhase),
            &[QueueId::Projects, QueueId::PendingProjects]
        );
    }

    #[test]
    fn test_decision_paths() {
        let id = EntityId::new(42);
        assert_eq!(
            decision_path(EntityKind::CompanyAgent, id, MutationKind::Approve),
            "/admin/agents/42/approve"
        );
        assert_eq!(
            decision_path(EntityKind::Company, id, MutationKind::Reject),
            "/companies/42/reject"
        );
        assert_eq!(
            decision_path(EntityKind::Project, id, MutationKind::Approve),
            "/properties/projects/view/42/approve"
        );
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(RejectionRequest {
            rejector_id: UserId::new(1),
            rejection_reason: "Incomplete documents",
            rejection_details: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "rejectorId": 1,
                "rejectionReason": "Incomplete documents",
                "rejectionDetails": null
            })
        );
    }

    #[test]
    fn test_phase_draft_validation() {
        assert!(matches!(
            PhaseDraft::default().into_form(),
            Err(MutationError::InvalidInput(_))
        ));

        let draft = PhaseDraft {
            name: "Phase 2".to_string(),
            attachments: vec![Attachment {
                field_name: "files".to_string(),
                file_name: "plan.pdf".to_string(),
                mime_type: Some("not a mime".to_string()),
                bytes: vec![1, 2, 3],
            }],
            ..PhaseDraft::default()
        };
        assert!(matches!(draft.into_form(), Err(MutationError::InvalidInput(_))));
    }
}
