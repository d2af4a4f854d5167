//! Identity resolver.
//!
//! Authenticates against the role-agnostic login endpoint, classifies the
//! returned principal into one role namespace, and writes exactly one
//! session slot.

use std::sync::Arc;

use realty_core::{Identity, RoleNamespace, RoleType};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::CompanyAgentRouting;
use crate::conversions::convert_principal;
use crate::error::{ApiError, AuthError, StorageError};
use crate::http::ApiClient;
use crate::session::SessionStore;

const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(alias = "token")]
    access_token: Option<String>,
    user: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Slot the session was written to.
    pub role: RoleNamespace,
    pub identity: Identity,
    /// Generation of the new session in that slot.
    pub generation: u64,
}

/// Pick the namespace a non-admin login is stored under.
///
/// `COMPANY_ADMIN` always lands in the company slot and `AGENT` in the agent
/// slot. `COMPANY_AGENT` follows `routing`. Buyers and anything else land in
/// the buyer slot.
#[must_use]
pub const fn classify(
    role_type: RoleType,
    intended: RoleNamespace,
    routing: CompanyAgentRouting,
) -> RoleNamespace {
    match role_type {
        RoleType::CompanyAdmin => RoleNamespace::Company,
        RoleType::Agent => RoleNamespace::Agent,
        RoleType::CompanyAgent => match routing {
            CompanyAgentRouting::AlwaysCompany => RoleNamespace::Company,
            CompanyAgentRouting::AlwaysAgent => RoleNamespace::Agent,
            CompanyAgentRouting::ByIntent => match intended {
                RoleNamespace::Company => RoleNamespace::Company,
                _ => RoleNamespace::Agent,
            },
        },
        RoleType::Buyer | RoleType::Admin => RoleNamespace::Buyer,
    }
}

/// Login, logout and password flows.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    api: ApiClient,
    sessions: Arc<SessionStore>,
    routing: CompanyAgentRouting,
}

impl IdentityResolver {
    #[must_use]
    pub const fn new(
        api: ApiClient,
        sessions: Arc<SessionStore>,
        routing: CompanyAgentRouting,
    ) -> Self {
        Self {
            api,
            sessions,
            routing,
        }
    }

    /// Sign in through the portal for `intended`.
    ///
    /// An admin console login is only accepted for an `ADMIN` principal;
    /// every other login is classified with [`classify`]. Exactly one slot
    /// is written, and none on failure.
    ///
    /// # Errors
    ///
    /// - `AuthError::PermissionDenied` for a non-admin on the admin console
    /// - `AuthError::Rejected` with the server's message for bad credentials
    /// - `AuthError::Network` if the authority could not be reached
    /// - `AuthError::Protocol` for a malformed login response
    #[instrument(skip(self, password), fields(identifier = %identifier, intended = %intended))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
        intended: RoleNamespace,
    ) -> Result<LoginOutcome, AuthError> {
        let body = self
            .api
            .post_json(
                LOGIN_PATH,
                &[],
                &LoginRequest {
                    identifier,
                    password: password.expose_secret(),
                },
                None,
            )
            .await?;

        let response: LoginResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Protocol(format!("Invalid login response: {e}")))?;
        let token = response
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::Protocol("Login response has no access token".to_string()))?;
        let identity = convert_principal(
            response
                .user
                .ok_or_else(|| AuthError::Protocol("Login response has no user".to_string()))?,
        )
        .map_err(AuthError::Protocol)?;

        let role = if intended == RoleNamespace::Admin {
            if !identity.is_admin() {
                warn!(role_type = %identity.role_type, "Rejected non-admin login on admin console");
                return Err(AuthError::PermissionDenied);
            }
            RoleNamespace::Admin
        } else {
            classify(identity.role_type, intended, self.routing)
        };

        let generation = self
            .sessions
            .set_session(role, SecretString::from(token), identity.clone())
            .await?;
        info!(role = %role, role_type = %identity.role_type, "Login succeeded");

        Ok(LoginOutcome {
            role,
            identity,
            generation,
        })
    }

    /// Sign out of `role`.
    ///
    /// The server is told on a best-effort basis; the local slot is cleared
    /// whatever it answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted session cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self, role: RoleNamespace) -> Result<(), StorageError> {
        if let Some(token) = self.sessions.token(role).await
            && let Err(e) = self
                .api
                .post_for_status::<Value>(LOGOUT_PATH, &[], None, Some(&token))
                .await
        {
            warn!(role = %role, error = %e, "Server logout failed, clearing local session anyway");
        }
        self.sessions.clear_session(role).await
    }

    /// Ask the authority to send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the request is refused or cannot be sent.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, identifier: &str) -> Result<(), AuthError> {
        self.api
            .post_for_status::<Value>(
                FORGOT_PASSWORD_PATH,
                &[("identifier", identifier.to_string())],
                None,
                None,
            )
            .await
            .map_err(AuthError::from)
    }

    /// Set a new password using a reset token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the request is refused or cannot be sent.
    #[instrument(skip(self, reset_token, new_password))]
    pub async fn reset_password(
        &self,
        reset_token: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        let request = ResetPasswordRequest {
            token: reset_token.expose_secret(),
            new_password: new_password.expose_secret(),
        };
        self.api
            .post_for_status(RESET_PASSWORD_PATH, &[], Some(&request), None)
            .await
            .map_err(|e: ApiError| AuthError::from(e))
    }
}
