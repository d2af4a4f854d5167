//! Realty Core - domain vocabulary shared by the realty portals.
//!
//! Roles, verification statuses, identities and the entities an admin
//! reviews. `realty-client` builds its session and approval engine on these;
//! `realty-cli` prints them.
//!
//! Nothing here talks to the network or disk. Wire quirks (numeric IDs sent
//! as strings, statuses in any casing) are absorbed at the type level so
//! callers only ever see the canonical forms.
//!
//! # Modules
//!
//! - [`types`] - IDs, [`RoleNamespace`]/[`RoleType`], [`VerificationStatus`],
//!   [`Identity`] and [`ApprovableEntity`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
