//! Conversions from raw API JSON to domain types.

use realty_core::{
    ApprovableEntity, Document, DocumentId, EntityId, EntityKind, Identity, OwnerRefs,
    PropertyId, QueueId, RoleType, UserId, VerificationStatus, id_from_json,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Status fields, in the order they are consulted.
const STATUS_FIELDS: [&str; 3] = ["verificationStatus", "status", "approvalStatus"];

fn nested_id<T: From<i64>>(map: &Map<String, Value>, flat: &str, object: &str) -> Option<T> {
    map.get(flat)
        .and_then(id_from_json)
        .or_else(|| map.get(object).and_then(|o| o.get("id")).and_then(id_from_json))
}

fn string_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Status reported by the record, if it is present and recognized.
fn status_of(map: &Map<String, Value>) -> Option<VerificationStatus> {
    STATUS_FIELDS
        .iter()
        .filter_map(|field| map.get(*field).and_then(Value::as_str))
        .find_map(|raw| raw.parse().ok())
}

/// Convert one list item into an entity of `kind`.
///
/// Returns `None` for anything without a usable id. `default_status` fills
/// in records that carry no recognizable status.
#[must_use]
pub fn convert_entity(
    kind: EntityKind,
    item: Value,
    default_status: VerificationStatus,
) -> Option<ApprovableEntity> {
    let Value::Object(payload) = item else {
        return None;
    };
    let id: EntityId = payload.get("id").and_then(id_from_json)?;
    let verification_status = status_of(&payload).unwrap_or(default_status);
    let owner = OwnerRefs {
        company: nested_id(&payload, "companyId", "company"),
        user: nested_id(&payload, "userId", "user"),
    };

    Some(ApprovableEntity {
        id,
        kind,
        verification_status,
        owner,
        payload,
        documents: Vec::new(),
    })
}

/// Convert a normalized list into the entities of `queue`.
///
/// For pending queues a record without a status is taken as `PENDING` and a
/// record reporting any other status is left out, so a pending queue only
/// ever holds pending entities. Elsewhere a record without a status is taken
/// as `APPROVED`.
#[must_use]
pub fn convert_queue(queue: QueueId, items: Vec<Value>) -> Vec<ApprovableEntity> {
    let default_status = if queue.is_pending_queue() {
        VerificationStatus::Pending
    } else {
        VerificationStatus::Approved
    };
    convert_listing(queue, items, default_status)
}

/// [`convert_queue`] with an explicit status for records that carry none.
#[must_use]
pub fn convert_listing(
    queue: QueueId,
    items: Vec<Value>,
    default_status: VerificationStatus,
) -> Vec<ApprovableEntity> {
    let kind = queue.entity_kind();
    items
        .into_iter()
        .filter_map(|item| {
            let converted = convert_entity(kind, item, default_status);
            if converted.is_none() {
                warn!(queue = %queue, "Dropping list item without a usable id");
            }
            converted
        })
        .filter(|entity| {
            let keep = !queue.is_pending_queue() || entity.verification_status.is_pending();
            if !keep {
                debug!(
                    queue = %queue,
                    id = %entity.id,
                    status = %entity.verification_status,
                    "Excluding resolved entity from pending queue"
                );
            }
            keep
        })
        .collect()
}

/// Convert one document record.
#[must_use]
pub fn convert_document(item: Value) -> Option<Document> {
    let Value::Object(payload) = item else {
        return None;
    };
    let id: Option<DocumentId> = payload.get("id").and_then(id_from_json);
    let file_name = string_field(&payload, "fileName").or_else(|| string_field(&payload, "name"));
    let document_type =
        string_field(&payload, "documentType").or_else(|| string_field(&payload, "type"));
    let url = string_field(&payload, "fileUrl")
        .or_else(|| string_field(&payload, "url"))
        .or_else(|| string_field(&payload, "downloadUrl"));
    let uploaded_at = ["uploadedAt", "createdAt"]
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_str))
        .find_map(|raw| raw.parse::<chrono::DateTime<chrono::Utc>>().ok());

    Some(Document {
        id,
        file_name,
        document_type,
        url,
        uploaded_at,
        payload,
    })
}

/// Role strings carried by a principal: `roleType`, then `role`, then
/// `roles` (strings or objects with a `name`).
fn principal_roles(user: &Map<String, Value>) -> Vec<String> {
    for field in ["roleType", "role"] {
        if let Some(role) = string_field(user, field) {
            return vec![role];
        }
    }
    user.get("roles")
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(|role| match role {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => string_field(o, "name"),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Convert the `user` object of a login response into an [`Identity`].
///
/// # Errors
///
/// Returns a description of the problem if `user` is not an object.
pub fn convert_principal(user: Value) -> Result<Identity, String> {
    let Value::Object(raw_profile) = user else {
        return Err("login response user is not an object".to_string());
    };

    let id: Option<UserId> = raw_profile
        .get("id")
        .or_else(|| raw_profile.get("userId"))
        .and_then(id_from_json);
    let email = string_field(&raw_profile, "email").unwrap_or_default();
    let full_name = || {
        match (
            string_field(&raw_profile, "firstName"),
            string_field(&raw_profile, "lastName"),
        ) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first),
            (None, Some(last)) => Some(last),
            (None, None) => None,
        }
    };
    let display_name = string_field(&raw_profile, "fullName")
        .or_else(full_name)
        .or_else(|| string_field(&raw_profile, "name"))
        .or_else(|| string_field(&raw_profile, "username"))
        .unwrap_or_else(|| email.clone());

    let roles = principal_roles(&raw_profile);
    let role_type = RoleType::most_privileged(roles.iter().map(String::as_str));

    Ok(Identity {
        id,
        display_name,
        email,
        role_type,
        raw_profile,
    })
}

/// Favorited property ids listed on a principal's profile, under
/// `favorites` or `favoriteProperties` (ids or objects with an `id`).
#[must_use]
pub fn profile_favorites(profile: &Map<String, Value>) -> Vec<PropertyId> {
    ["favorites", "favoriteProperties"]
        .iter()
        .filter_map(|field| profile.get(*field).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| match item {
            Value::Object(o) => o
                .get("id")
                .or_else(|| o.get("propertyId"))
                .and_then(id_from_json),
            other => id_from_json(other),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_convert_entity_reads_owner_refs() {
        let entity = convert_entity(
            EntityKind::Agent,
            json!({"id": "42", "status": "pending", "company": {"id": 7}, "userId": 9}),
            VerificationStatus::Approved,
        )
        .unwrap();
        assert_eq!(entity.id, EntityId::new(42));
        assert_eq!(entity.verification_status, VerificationStatus::Pending);
        assert_eq!(entity.owner.company, Some(EntityId::new(7)));
        assert_eq!(entity.owner.user, Some(UserId::new(9)));
        assert_eq!(entity.payload.get("userId"), Some(&json!(9)));
    }

    #[test]
    fn test_convert_entity_requires_id() {
        assert!(convert_entity(EntityKind::Company, json!({"name": "x"}), VerificationStatus::Pending).is_none());
        assert!(convert_entity(EntityKind::Company, json!([1]), VerificationStatus::Pending).is_none());
    }

    #[test]
    fn test_verification_status_field_wins() {
        let entity = convert_entity(
            EntityKind::Property,
            json!({"id": 1, "verificationStatus": "VERIFIED", "status": "ACTIVE"}),
            VerificationStatus::Pending,
        )
        .unwrap();
        assert_eq!(entity.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn test_pending_queue_stamps_and_filters() {
        let items = vec![
            json!({"id": 1}),
            json!({"id": 2, "status": "APPROVED"}),
            json!({"id": 3, "verificationStatus": "Pending"}),
            json!({"name": "no id"}),
        ];
        let entities = convert_queue(QueueId::PendingAgents, items);
        let ids: Vec<_> = entities.iter().map(|e| e.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(entities.iter().all(|e| e.verification_status.is_pending()));
    }

    #[test]
    fn test_non_pending_queue_keeps_everything() {
        let items = vec![json!({"id": 1, "status": "PENDING"}), json!({"id": 2})];
        let entities = convert_queue(QueueId::AllAgents, items);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].verification_status, VerificationStatus::Approved);
    }

    #[test]
    fn test_listing_default_status() {
        let entities = convert_listing(
            QueueId::Properties,
            vec![json!({"id": 1}), json!({"id": 2, "status": "REJECTED"})],
            VerificationStatus::Pending,
        );
        assert_eq!(entities[0].verification_status, VerificationStatus::Pending);
        assert_eq!(entities[1].verification_status, VerificationStatus::Rejected);
    }

    #[test]
    fn test_convert_document() {
        let doc = convert_document(json!({
            "id": 5,
            "fileName": "licence.pdf",
            "documentType": "LICENSE",
            "fileUrl": "https://files.example.com/5",
            "uploadedAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(doc.id, Some(DocumentId::new(5)));
        assert_eq!(doc.file_name.as_deref(), Some("licence.pdf"));
        assert_eq!(doc.document_type.as_deref(), Some("LICENSE"));
        assert!(doc.uploaded_at.is_some());
    }

    #[test]
    fn test_convert_principal_name_fallbacks() {
        let identity = convert_principal(json!({
            "id": 3,
            "firstName": "Dana",
            "lastName": "Reyes",
            "email": "dana@example.com",
            "roles": [{"name": "ROLE_USER"}, {"name": "ROLE_ADMIN"}]
        }))
        .unwrap();
        assert_eq!(identity.display_name, "Dana Reyes");
        assert_eq!(identity.role_type, RoleType::Admin);
        assert_eq!(identity.id, Some(UserId::new(3)));

        let identity = convert_principal(json!({"email": "x@example.com", "roleType": "AGENT"})).unwrap();
        assert_eq!(identity.display_name, "x@example.com");
        assert_eq!(identity.role_type, RoleType::Agent);
    }

    #[test]
    fn test_convert_principal_unknown_role_is_buyer() {
        let identity = convert_principal(json!({"email": "x@example.com", "role": "LANDLORD"})).unwrap();
        assert_eq!(identity.role_type, RoleType::Buyer);
        assert!(convert_principal(json!("x")).is_err());
    }

    #[test]
    fn test_profile_favorites() {
        let profile = json!({"favorites": [1, "2", {"id": 3}], "favoriteProperties": [{"propertyId": 4}]});
        let ids: Vec<_> = profile_favorites(profile.as_object().unwrap())
            .into_iter()
            .map(|id| id.as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
