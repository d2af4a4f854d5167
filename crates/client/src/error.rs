//! Error types for the client engine.
//!
//! Transport failures are described once by [`ApiError`] and then mapped
//! into the error type of the operation that observed them: [`AuthError`] for
//! logins, [`MutationError`] for approve/reject/create, and
//! [`crate::RefreshOutcome`] for queue refreshes (which never fail loudly).

use thiserror::Error;

/// Errors from one request to the remote authority.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The authority answered 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The authority answered with another non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never completed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ApiError {
    /// HTTP status of a rejection, if this error carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Rejected { status, .. } => Some(*status),
            Self::Network(_) | Self::Protocol(_) => None,
        }
    }
}

/// Errors reading or writing persisted session state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from a login attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Admin console login with a non-admin principal.
    #[error("Permission denied: this account is not an administrator")]
    PermissionDenied,

    /// The authority refused the credentials; the message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => Self::Rejected(message),
            ApiError::Rejected { message, .. } => Self::Rejected(message),
            ApiError::Network(e) => Self::Network(e),
            ApiError::Protocol(message) => Self::Protocol(message),
        }
    }
}

/// Errors from an approve, reject or create mutation.
#[derive(Debug, Error)]
pub enum MutationError {
    /// No admin session (or no admin identity id) - nothing was sent.
    #[error("Authentication required: {0}")]
    AuthRequired(&'static str),

    /// The admin session expired while the mutation was in flight.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// The authority refused the mutation; the message is shown verbatim.
    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The request could not be built from the caller's input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors constructing a [`crate::Portal`].
#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_is_verbatim() {
        let err = ApiError::Rejected {
            status: 409,
            message: "Agent already approved".to_string(),
        };
        assert_eq!(err.to_string(), "Agent already approved");
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_auth_error_from_api_error() {
        let err = AuthError::from(ApiError::Rejected {
            status: 400,
            message: "Bad credentials".to_string(),
        });
        assert_eq!(err.to_string(), "Bad credentials");

        let err = AuthError::from(ApiError::Protocol("not json".to_string()));
        assert!(matches!(err, AuthError::Protocol(_)));
    }

    #[test]
    fn test_unauthorized_login_keeps_server_message() {
        let err = AuthError::from(ApiError::Unauthorized("Invalid email or password".to_string()));
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_mutation_error_display() {
        let err = MutationError::AuthRequired("admin token missing");
        assert_eq!(err.to_string(), "Authentication required: admin token missing");
        assert_eq!(
            MutationError::SessionExpired.to_string(),
            "Session expired, please log in again"
        );
    }
}
