//! Role namespaces (session partitions) and principal role types.

use serde::{Deserialize, Deserializer, Serialize};

/// Partition key for session storage.
///
/// Each namespace holds an independent session so that, for example, an
/// admin console and an agent portal can be signed in side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleNamespace {
    Buyer,
    Admin,
    Company,
    Agent,
}

impl RoleNamespace {
    /// Every namespace, in a stable order.
    pub const ALL: [Self; 4] = [Self::Buyer, Self::Admin, Self::Company, Self::Agent];

    /// Prefix used for this namespace's persisted keys.
    #[must_use]
    pub const fn storage_prefix(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Admin => "admin",
            Self::Company => "company",
            Self::Agent => "agent",
        }
    }

    /// Login entry point a user is sent back to when this session expires.
    #[must_use]
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::Buyer => "/login",
            Self::Admin => "/admin/login",
            Self::Company => "/company/login",
            Self::Agent => "/agent/login",
        }
    }
}

impl std::fmt::Display for RoleNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_prefix())
    }
}

impl std::str::FromStr for RoleNamespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" | "user" => Ok(Self::Buyer),
            "admin" => Ok(Self::Admin),
            "company" => Ok(Self::Company),
            "agent" => Ok(Self::Agent),
            other => Err(format!("invalid role namespace: {other}")),
        }
    }
}

/// Role of an authenticated principal, as classified from the login response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    #[default]
    Buyer,
    Agent,
    CompanyAdmin,
    CompanyAgent,
    Admin,
}

impl RoleType {
    /// Privilege rank used to pick one role out of a multi-role principal.
    const fn rank(self) -> u8 {
        match self {
            Self::Admin => 4,
            Self::CompanyAdmin => 3,
            Self::Agent => 2,
            Self::CompanyAgent => 1,
            Self::Buyer => 0,
        }
    }

    /// Parse a role string from the wire.
    ///
    /// Case-insensitive, tolerates a `ROLE_` prefix, and treats a bare
    /// `COMPANY` as a company administrator. Returns `None` for anything
    /// unrecognized.
    #[must_use]
    pub fn parse_wire(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match name {
            "ADMIN" | "SUPER_ADMIN" => Some(Self::Admin),
            "COMPANY" | "COMPANY_ADMIN" => Some(Self::CompanyAdmin),
            "COMPANY_AGENT" => Some(Self::CompanyAgent),
            "AGENT" => Some(Self::Agent),
            "BUYER" | "USER" => Some(Self::Buyer),
            _ => None,
        }
    }

    /// Pick the most privileged recognized role out of several.
    ///
    /// Unrecognized strings are ignored; an empty or fully unrecognized set
    /// classifies as [`RoleType::Buyer`].
    #[must_use]
    pub fn most_privileged<'a, I>(roles: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        roles
            .into_iter()
            .filter_map(Self::parse_wire)
            .max_by_key(|role| role.rank())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for RoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Agent => write!(f, "AGENT"),
            Self::CompanyAdmin => write!(f, "COMPANY_ADMIN"),
            Self::CompanyAgent => write!(f, "COMPANY_AGENT"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

impl<'de> Deserialize<'de> for RoleType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_wire(&raw).unwrap_or_default())
    }
}
