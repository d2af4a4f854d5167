//! Queue refreshes: merging, failures, 401 handling and stale responses.

use std::time::Duration;

use realty_client::{NoticeKind, RefreshOutcome};
use realty_core::{EntityId, EntityKind, QueueId, RoleNamespace, VerificationStatus};
use realty_integration_tests::{FakeAuthority, Shape, entity, paths, profile};
use secrecy::SecretString;
use serde_json::json;

const PASSWORD: &str = "s3cret";

async fn admin_authority() -> FakeAuthority {
    let authority = FakeAuthority::start().await;
    authority.seed_empty_queues();
    authority.add_user("admin@example.com", PASSWORD, profile(1, "admin@example.com", "ADMIN"));
    authority
}

async fn admin_portal(authority: &FakeAuthority) -> realty_client::Portal {
    let (portal, _) = authority.portal().await;
    portal
        .login("admin@example.com", &SecretString::from(PASSWORD), RoleNamespace::Admin)
        .await
        .unwrap();
    portal
}

fn ids(items: &[realty_core::ApprovableEntity]) -> Vec<i64> {
    items.iter().map(|e| e.id.as_i64()).collect()
}

#[tokio::test]
async fn test_admin_login_fills_every_queue() {
    let authority = admin_authority().await;
    authority.seed(paths::COMPANIES, vec![entity(1, Some("APPROVED")), entity(2, None)]);
    authority.seed(paths::PENDING_PROJECTS, vec![entity(9, None)]);

    let portal = admin_portal(&authority).await;
    let snapshot = portal.console().snapshot().await;
    assert_eq!(snapshot.len(), QueueId::ALL.len());
    assert_eq!(ids(&snapshot[&QueueId::Companies]), vec![1, 2]);
    assert_eq!(
        snapshot[&QueueId::PendingProjects][0].verification_status,
        VerificationStatus::Pending
    );
    assert!(portal.notices().drain().is_empty());

    let request = &authority.requests_to(paths::PENDING_COMPANIES)[0];
    assert_eq!(request.query.get("page").map(String::as_str), Some("0"));
    assert_eq!(request.query.get("size").map(String::as_str), Some("50"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer token-1"));
}

#[tokio::test]
async fn test_properties_merge_both_sources() {
    let authority = admin_authority().await;
    authority.seed(paths::PENDING_PROPERTIES, vec![entity(1, None), entity(2, None)]);
    authority.seed(
        paths::PUBLIC_PROPERTIES,
        vec![
            entity(3, Some("VERIFIED")),
            json!({"id": 4, "status": "VERIFIED", "featured": true}),
            entity(5, Some("VERIFIED")),
        ],
    );
    let portal = admin_portal(&authority).await;

    let properties = portal.console().queue(QueueId::Properties).await;
    assert_eq!(properties.len(), 2 + 3);
    assert_eq!(ids(&properties), vec![1, 2, 3, 4, 5]);

    let stats = portal.console().stats().await;
    assert_eq!(stats.total_properties, 5);
    assert_eq!(stats.pending_properties, 2);
    assert_eq!(stats.featured_properties, 1);

    let sorted = &authority.requests_to(paths::PUBLIC_PROPERTIES)[0];
    assert_eq!(sorted.query.get("sort").map(String::as_str), Some("createdAt,desc"));
}

#[tokio::test]
async fn test_properties_merge_drops_public_duplicates() {
    let authority = admin_authority().await;
    authority.seed(paths::PENDING_PROPERTIES, vec![entity(1, Some("PENDING"))]);
    authority.seed(paths::PUBLIC_PROPERTIES, vec![entity(1, Some("VERIFIED")), entity(2, None)]);
    let portal = admin_portal(&authority).await;

    let properties = portal.console().queue(QueueId::Properties).await;
    assert_eq!(ids(&properties), vec![1, 2]);
    assert_eq!(properties[0].verification_status, VerificationStatus::Pending);
}

#[tokio::test]
async fn test_every_response_shape_is_understood() {
    let authority = admin_authority().await;
    authority.set_shape(paths::AGENTS, Shape::Raw);
    authority.set_shape(paths::COMPANIES, Shape::Wrapped);
    authority.seed(paths::AGENTS, vec![entity(1, None), entity(2, None)]);
    authority.seed(paths::COMPANIES, vec![entity(3, None)]);
    authority.seed(paths::PROJECTS, vec![entity(4, None)]);
    let portal = admin_portal(&authority).await;

    let stats = portal.console().stats().await;
    assert_eq!(stats.total_agents, 2);
    assert_eq!(stats.total_companies, 1);
    assert_eq!(stats.total_projects, 1);
}

#[tokio::test]
async fn test_pending_queues_only_hold_pending_entities() {
    let authority = admin_authority().await;
    authority.seed(
        paths::PENDING_INDIVIDUAL_AGENTS,
        vec![
            entity(1, None),
            entity(2, Some("approved")),
            entity(3, Some("Pending")),
            json!({"name": "no id"}),
        ],
    );
    let portal = admin_portal(&authority).await;

    let pending = portal.console().queue(QueueId::PendingAgents).await;
    assert_eq!(ids(&pending), vec![1, 3]);
    assert!(pending.iter().all(|e| e.verification_status.is_pending()));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_contents() {
    let authority = admin_authority().await;
    authority.seed(paths::COMPANIES, vec![entity(1, None), entity(2, None)]);
    let portal = admin_portal(&authority).await;
    let before = portal.console().queue(QueueId::Companies).await;
    let before_json = serde_json::to_string(&before).unwrap();

    authority.seed(paths::COMPANIES, vec![entity(3, None)]);
    authority.fail(paths::COMPANIES, 500, "Database unavailable");

    let outcome = portal.console().refresh(QueueId::Companies).await;
    assert_eq!(
        outcome,
        RefreshOutcome::Failed("Database unavailable".to_string())
    );
    let after = portal.console().queue(QueueId::Companies).await;
    assert_eq!(serde_json::to_string(&after).unwrap(), before_json);

    let notices = portal.notices().drain();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_dismissible());
    assert!(matches!(
        &notices[0].kind,
        NoticeKind::QueueError { queue: QueueId::Companies, message } if message == "Database unavailable"
    ));
    assert!(portal.sessions().is_authenticated(RoleNamespace::Admin).await);
}

#[tokio::test]
async fn test_one_failing_source_fails_the_whole_queue() {
    let authority = admin_authority().await;
    authority.seed(paths::PENDING_PROPERTIES, vec![entity(1, None)]);
    let portal = admin_portal(&authority).await;

    authority.fail(paths::PUBLIC_PROPERTIES, 502, "Bad gateway");
    let outcome = portal.console().refresh(QueueId::Properties).await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert_eq!(ids(&portal.console().queue(QueueId::Properties).await), vec![1]);
}

#[tokio::test]
async fn test_401_while_signed_in_expires_admin_session() {
    let authority = admin_authority().await;
    authority.seed(paths::COMPANIES, vec![entity(1, None)]);
    let portal = admin_portal(&authority).await;

    authority.revoke_tokens();
    let outcome = portal.console().refresh(QueueId::Companies).await;
    assert_eq!(outcome, RefreshOutcome::Expired);

    assert!(!portal.sessions().is_authenticated(RoleNamespace::Admin).await);
    assert!(portal.console().snapshot().await.is_empty());
    let notices = portal.notices().drain();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        notices[0].kind,
        NoticeKind::SessionExpired {
            role: RoleNamespace::Admin,
            login_path: "/admin/login"
        }
    ));

    // Later refreshes are not even attempted
    let sent = authority.requests().len();
    assert_eq!(portal.console().refresh(QueueId::Companies).await, RefreshOutcome::Skipped);
    assert_eq!(authority.requests().len(), sent);
}

#[tokio::test]
async fn test_401_after_logout_is_swallowed() {
    let authority = admin_authority().await;
    let portal = admin_portal(&authority).await;

    authority.delay(paths::PENDING_COMPANIES, Duration::from_millis(300));
    authority.fail(paths::PENDING_COMPANIES, 401, "Token expired");

    let (outcome, logout) = tokio::join!(
        portal.console().refresh(QueueId::PendingCompanies),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            portal.logout(RoleNamespace::Admin).await
        }
    );
    logout.unwrap();

    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert!(portal.notices().drain().is_empty());
    assert!(portal.console().snapshot().await.is_empty());
}

#[tokio::test]
async fn test_response_after_logout_is_discarded() {
    let authority = admin_authority().await;
    let portal = admin_portal(&authority).await;

    authority.seed(paths::COMPANIES, vec![entity(1, None)]);
    authority.delay(paths::COMPANIES, Duration::from_millis(300));

    let (outcome, logout) = tokio::join!(portal.console().refresh(QueueId::Companies), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        portal.logout(RoleNamespace::Admin).await
    });
    logout.unwrap();

    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert!(portal.console().queue(QueueId::Companies).await.is_empty());
}

#[tokio::test]
async fn test_response_after_relogin_is_discarded() {
    let authority = admin_authority().await;
    let portal = admin_portal(&authority).await;
    authority.seed(paths::COMPANIES, vec![entity(1, None)]);
    authority.delay(paths::COMPANIES, Duration::from_millis(300));

    let (outcome, _) = tokio::join!(portal.console().refresh(QueueId::Companies), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        portal
            .login("admin@example.com", &SecretString::from(PASSWORD), RoleNamespace::Admin)
            .await
    });

    // The relogin's own refresh may or may not have completed first; either
    // way the stale one must not be applied as if current.
    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert!(portal.sessions().is_authenticated(RoleNamespace::Admin).await);
}

#[tokio::test]
async fn test_company_agent_queue_gets_documents() {
    let authority = admin_authority().await;
    authority.seed(
        paths::PENDING_COMPANY_AGENTS,
        vec![entity(42, Some("PENDING")), entity(43, Some("PENDING"))],
    );
    authority.seed_documents(
        42,
        vec![json!({
            "id": 7,
            "fileName": "licence.pdf",
            "documentType": "LICENSE",
            "fileUrl": "https://files.example.com/7",
            "uploadedAt": "2024-05-01T10:00:00Z"
        })],
    );
    let portal = admin_portal(&authority).await;

    let queue = portal.console().queue(QueueId::PendingCompanyAgents).await;
    assert_eq!(queue[0].documents.len(), 1);
    assert_eq!(queue[0].documents[0].file_name.as_deref(), Some("licence.pdf"));
    assert!(queue[1].documents.is_empty());

    let lookup = &authority.requests_to("/documents/entity/AGENT/42")[0];
    assert_eq!(lookup.query.get("size").map(String::as_str), Some("20"));
    assert_eq!(lookup.query.get("sortBy").map(String::as_str), Some("uploadedAt"));
    assert_eq!(lookup.query.get("sortDir").map(String::as_str), Some("desc"));
}

#[tokio::test]
async fn test_document_failure_leaves_agent_without_documents() {
    let authority = admin_authority().await;
    authority.seed(paths::PENDING_COMPANY_AGENTS, vec![entity(42, None)]);
    authority.seed_documents(42, vec![json!({"id": 1, "fileName": "a.pdf"})]);
    authority.fail("/documents/entity/AGENT/42", 500, "Storage offline");
    let portal = admin_portal(&authority).await;

    let queue = portal.console().queue(QueueId::PendingCompanyAgents).await;
    assert_eq!(ids(&queue), vec![42]);
    assert!(queue[0].documents.is_empty());
}

#[tokio::test]
async fn test_admin_lookups() {
    let authority = admin_authority().await;
    authority.seed(
        paths::COMPANIES,
        vec![json!({"id": 1, "verificationStatus": "APPROVED"}), entity(2, None)],
    );
    authority.seed(paths::PENDING_COMPANIES, vec![entity(3, None), entity(4, None)]);
    authority.seed_documents(5, vec![json!({"id": 1, "name": "registration.pdf"})]);
    let portal = admin_portal(&authority).await;

    let stats = portal.console().company_statistics().await.unwrap();
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.pending, 2);

    let documents = portal
        .console()
        .fetch_documents(EntityKind::Company, EntityId::new(5))
        .await
        .unwrap();
    assert_eq!(documents[0].file_name.as_deref(), Some("registration.pdf"));
    assert_eq!(authority.requests_to("/documents/entity/COMPANY/5").len(), 1);
}
