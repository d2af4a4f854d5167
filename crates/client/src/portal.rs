//! Portal context: the one object a front end holds.

use std::sync::Arc;

use realty_core::RoleNamespace;
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::auth::{IdentityResolver, LoginOutcome};
use crate::config::ClientConfig;
use crate::console::AdminConsole;
use crate::conversions::profile_favorites;
use crate::error::{AuthError, PortalError, StorageError};
use crate::favorites::FavoritesStore;
use crate::http::ApiClient;
use crate::notice::NoticeBoard;
use crate::session::SessionStore;
use crate::storage::SessionStorage;

/// Wires sessions, the admin console, favorites and notices together.
#[derive(Debug)]
pub struct Portal {
    sessions: Arc<SessionStore>,
    resolver: IdentityResolver,
    console: AdminConsole,
    favorites: FavoritesStore,
    notices: Arc<NoticeBoard>,
}

impl Portal {
    /// Build the portal and restore persisted sessions.
    ///
    /// A restored admin session gets the queue cache bound to it; queues
    /// are fetched on the first refresh.
    ///
    /// # Errors
    ///
    /// Returns `PortalError` if the HTTP client cannot be built or storage
    /// cannot be read.
    pub async fn new(
        config: ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, PortalError> {
        let api = ApiClient::new(&config)?;
        let sessions = Arc::new(SessionStore::new(storage.clone()));
        let notices = Arc::new(NoticeBoard::new());

        let restored = sessions.hydrate().await?;
        let console = AdminConsole::new(api.clone(), sessions.clone(), notices.clone());
        if restored.contains(&RoleNamespace::Admin)
            && let Some(admin) = sessions.snapshot(RoleNamespace::Admin).await
        {
            console.bind_session(admin.generation).await;
        }

        Ok(Self {
            resolver: IdentityResolver::new(api, sessions.clone(), config.company_agent_routing),
            favorites: FavoritesStore::new(storage, sessions.clone()),
            sessions,
            console,
            notices,
        })
    }

    /// Sign in and run the follow-up work for the resolved role.
    ///
    /// An admin login binds the queue cache and refreshes every queue. A
    /// buyer login folds the anonymous favorites and the profile's
    /// favorites into the buyer's set; a failure there is logged and does
    /// not undo the login.
    ///
    /// # Errors
    ///
    /// See [`IdentityResolver::login`].
    #[instrument(skip(self, password), fields(intended = %intended))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
        intended: RoleNamespace,
    ) -> Result<LoginOutcome, AuthError> {
        let outcome = self.resolver.login(identifier, password, intended).await?;

        match outcome.role {
            RoleNamespace::Admin => {
                self.console.bind_session(outcome.generation).await;
                let refreshed = self.console.refresh_all().await;
                let updated = refreshed.iter().filter(|(_, o)| o.is_updated()).count();
                info!(updated, total = refreshed.len(), "Initial admin refresh finished");
            }
            RoleNamespace::Buyer => {
                let server = profile_favorites(&outcome.identity.raw_profile);
                if let Err(e) = self.favorites.merge_on_login(&server).await {
                    warn!(error = %e, "Failed to merge favorites on login");
                }
            }
            RoleNamespace::Company | RoleNamespace::Agent => {}
        }
        Ok(outcome)
    }

    /// Sign out of one role. Other slots are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted session cannot be removed.
    pub async fn logout(&self, role: RoleNamespace) -> Result<(), StorageError> {
        if role == RoleNamespace::Admin {
            self.console.detach().await;
        }
        self.resolver.logout(role).await
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub const fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn console(&self) -> &AdminConsole {
        &self.console
    }

    #[must_use]
    pub const fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    #[must_use]
    pub const fn notices(&self) -> &Arc<NoticeBoard> {
        &self.notices
    }
}
