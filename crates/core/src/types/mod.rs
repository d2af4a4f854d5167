//! Core types for the realty portals.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod entity;
pub mod id;
pub mod identity;
pub mod role;
pub mod status;

pub use entity::{ApprovableEntity, Document, EntityKind, OwnerRefs, QueueId};
pub use id::*;
pub use identity::Identity;
pub use role::{RoleNamespace, RoleType};
pub use status::VerificationStatus;
