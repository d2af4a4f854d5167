//! Verification status shared by every approvable entity.
//!
//! The remote authority spells statuses inconsistently across entity kinds
//! (`PENDING`, `pending`, `Pending_Approval`...). Everything is normalized
//! into [`VerificationStatus`] at the wire boundary and compared as an enum
//! from then on.

use serde::{Deserialize, Deserializer, Serialize};

/// Verification status of an approvable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Awaiting an admin decision.
    #[default]
    Pending,
    /// Approved by an admin.
    Approved,
    /// Rejected by an admin.
    Rejected,
    /// Verified (listing/company equivalent of approved).
    Verified,
}

impl VerificationStatus {
    /// Whether the entity still awaits a decision.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Verified => write!(f, "VERIFIED"),
        }
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    /// Case-insensitive parse. Aliases seen on the wire (`PENDING_APPROVAL`,
    /// `PENDING_VERIFICATION`, `ACTIVE`) map onto the canonical variants.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "PENDING_APPROVAL" | "PENDING_VERIFICATION" | "UNDER_REVIEW" => {
                Ok(Self::Pending)
            }
            "APPROVED" | "ACTIVE" => Ok(Self::Approved),
            "REJECTED" | "DECLINED" => Ok(Self::Rejected),
            "VERIFIED" => Ok(Self::Verified),
            other => Err(format!("invalid verification status: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for VerificationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("pending".parse::<VerificationStatus>(), Ok(VerificationStatus::Pending));
        assert_eq!("Approved".parse::<VerificationStatus>(), Ok(VerificationStatus::Approved));
        assert_eq!(" VERIFIED ".parse::<VerificationStatus>(), Ok(VerificationStatus::Verified));
        assert_eq!(
            "pending_verification".parse::<VerificationStatus>(),
            Ok(VerificationStatus::Pending)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("archived".parse::<VerificationStatus>().is_err());
    }

    #[test]
    fn test_serde_round_trip_uses_canonical_spelling() {
        let json = serde_json::to_string(&VerificationStatus::Rejected).unwrap_or_default();
        assert_eq!(json, "\"REJECTED\"");
        let parsed: Result<VerificationStatus, _> = serde_json::from_str("\"rejected\"");
        assert!(matches!(parsed, Ok(VerificationStatus::Rejected)));
    }

    #[test]
    fn test_only_pending_is_pending() {
        assert!(VerificationStatus::Pending.is_pending());
        assert!("pending_approval".parse::<VerificationStatus>().is_ok_and(VerificationStatus::is_pending));
        for status in [
            VerificationStatus::Approved,
            VerificationStatus::Rejected,
            VerificationStatus::Verified,
        ] {
            assert!(!status.is_pending());
        }
    }
}
