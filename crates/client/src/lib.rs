//! Realty Client - session, queue and approval engine for the realty portals.
//!
//! Four portals (buyer, admin, company, agent) share one remote authority.
//! Each keeps its own session slot, so signing into one never disturbs the
//! others. The admin console keeps a cache of entity queues and applies
//! approve/reject decisions through the authority, refetching the affected
//! queues after every accepted mutation.
//!
//! # Modules
//!
//! - [`session`] - Role-scoped session slots with generation counters
//! - [`auth`] - Login, logout and role classification
//! - [`console`] - Queue refreshes and admin lookups
//! - [`coordinator`] - Approve, reject and create-phase mutations
//! - [`favorites`] - Anonymous and buyer favorites
//! - [`portal`] - Everything above wired together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realty_client::{ClientConfig, FileStorage, Portal};
//!
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileStorage::open(&config.session_file)?);
//! let portal = Portal::new(config, storage).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod console;
pub mod conversions;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod favorites;
pub mod http;
pub mod notice;
pub mod portal;
pub mod queue;
pub mod session;
pub mod stats;
pub mod storage;

pub use auth::{IdentityResolver, LoginOutcome, classify};
pub use config::{ClientConfig, CompanyAgentRouting, ConfigError, LogFormat};
pub use console::{AdminConsole, CompanyStatistics, RefreshOutcome};
pub use coordinator::{Attachment, MutationKind, PhaseDraft, refresh_set};
pub use envelope::ListEnvelope;
pub use error::{ApiError, AuthError, MutationError, PortalError, StorageError};
pub use favorites::FavoritesStore;
pub use http::ApiClient;
pub use notice::{Notice, NoticeBoard, NoticeKind, NoticeSink};
pub use portal::Portal;
pub use queue::{QueueCache, QueueSnapshot};
pub use session::{SessionSnapshot, SessionStore};
pub use stats::DerivedStats;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, SlotKeys};
