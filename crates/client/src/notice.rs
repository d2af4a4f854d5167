//! User-facing notices.
//!
//! The engine never renders anything itself; it posts notices to a
//! [`NoticeSink`] and the front end decides how to show them.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use realty_core::{QueueId, RoleNamespace};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// A mutation succeeded.
    Confirmation { message: String },
    /// One queue failed to refresh; its previous contents are still shown.
    QueueError { queue: QueueId, message: String },
    /// A session expired. The user should sign in again at `login_path`.
    SessionExpired {
        role: RoleNamespace,
        login_path: &'static str,
    },
    /// A mutation failed; `message` is the server's own wording when available.
    MutationFailed { message: String },
}

/// A notice with the time it was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            kind,
            raised_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn session_expired(role: RoleNamespace) -> Self {
        Self::new(NoticeKind::SessionExpired {
            role,
            login_path: role.login_path(),
        })
    }

    /// Whether the user can dismiss this and carry on.
    #[must_use]
    pub const fn is_dismissible(&self) -> bool {
        !matches!(self.kind, NoticeKind::SessionExpired { .. })
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NoticeKind::Confirmation { message } | NoticeKind::MutationFailed { message } => {
                f.write_str(message)
            }
            NoticeKind::QueueError { queue, message } => {
                write!(f, "Could not refresh {queue}: {message}")
            }
            NoticeKind::SessionExpired { login_path, .. } => {
                write!(f, "Your session has expired, please log in again ({login_path})")
            }
        }
    }
}

/// Receiver of notices.
pub trait NoticeSink: Send + Sync {
    fn push(&self, notice: Notice);
}

/// In-memory notice list, drained by the front end.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending notice.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of the pending notices, leaving them in place.
    #[must_use]
    pub fn peek(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NoticeSink for NoticeBoard {
    fn push(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
