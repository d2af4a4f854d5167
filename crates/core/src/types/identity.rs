//! Authenticated principal as stored in a session slot.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::role::RoleType;

/// Identity of a signed-in principal.
///
/// Each session slot owns its own copy; identities are never shared between
/// slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Option<UserId>,
    pub display_name: String,
    pub email: String,
    pub role_type: RoleType,
    /// The principal object exactly as the authority returned it.
    #[serde(default)]
    pub raw_profile: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role_type, RoleType::Admin)
    }
}
