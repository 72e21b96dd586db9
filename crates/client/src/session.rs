//! Session state: who is signed in and with which tokens.
//!
//! [`SessionManager`] owns the access/refresh token pair and the current
//! [`User`]. It is created in the loading state, restored once at startup,
//! and mutated only through login, refresh, logout and profile updates.
//!
//! # Invariants
//!
//! - A user is present exactly when an access token is present. Both live in
//!   one [`Authenticated`] record, so they are set and cleared together.
//! - The [`ApiClient`] bearer credential mirrors the session's access token.
//! - A response that arrives after its cancellation token (or the manager)
//!   was cancelled is dropped without touching state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use shopfront_core::{Email, User, UserUpdate};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, RefreshResponse};
use crate::cancel::CancellationToken;
use crate::error::{ClientError, ErrorKind, ValidationError};
use crate::inflight::{InFlight, Operation};
use crate::store::{TokenStore, keys};

/// Signed-in state: the user together with the credentials that prove it.
#[derive(Debug, Clone)]
pub struct Authenticated {
    user: User,
    access_token: SecretString,
    refresh_token: SecretString,
    authenticated_at: DateTime<Utc>,
    token_refreshed_at: DateTime<Utc>,
}

impl Authenticated {
    fn new(user: User, access_token: SecretString, refresh_token: SecretString) -> Self {
        let now = Utc::now();
        Self {
            user,
            access_token,
            refresh_token,
            authenticated_at: now,
            token_refreshed_at: now,
        }
    }

    /// The signed-in account.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// When the user signed in (or the session was restored).
    #[must_use]
    pub const fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    /// When the access token was last issued.
    #[must_use]
    pub const fn token_refreshed_at(&self) -> DateTime<Utc> {
        self.token_refreshed_at
    }
}

/// Snapshot of the session.
#[derive(Debug, Clone)]
pub struct Session {
    auth: Option<Authenticated>,
    loading: bool,
}

impl Session {
    const fn loading() -> Self {
        Self {
            auth: None,
            loading: true,
        }
    }

    /// The signed-in user, if any.
    ///
    /// Not authoritative while [`is_loading`](Self::is_loading) is true.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.auth.as_ref().map(Authenticated::user)
    }

    /// The current access token, if signed in.
    #[must_use]
    pub fn access_token(&self) -> Option<&SecretString> {
        self.auth.as_ref().map(|auth| &auth.access_token)
    }

    /// The refresh token the session was established with, if signed in.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.auth.as_ref().map(|auth| &auth.refresh_token)
    }

    /// The full signed-in record, if any.
    #[must_use]
    pub const fn authenticated(&self) -> Option<&Authenticated> {
        self.auth.as_ref()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Whether the startup restore is still outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Owns the session and its token lifecycle.
///
/// Share it behind an `Arc`; all operations take `&self`.
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    state: RwLock<Session>,
    inflight: InFlight,
    lifecycle: CancellationToken,
}

impl SessionManager {
    /// Create a manager in the loading state. Call [`restore`](Self::restore)
    /// next.
    #[must_use]
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(Session::loading()),
            inflight: InFlight::default(),
            lifecycle: CancellationToken::new(),
        }
    }

    /// The API client this session authenticates.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// A token cancelled when this manager is disposed. Views derive their
    /// own tokens from it with [`CancellationToken::child`].
    #[must_use]
    pub fn lifecycle(&self) -> CancellationToken {
        self.lifecycle.clone()
    }

    pub(crate) const fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.state.read().await.clone()
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.user().cloned()
    }

    /// Whether a user is signed in.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    /// Whether the startup restore is still outstanding.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading()
    }

    /// Whether `op` is currently outstanding.
    #[must_use]
    pub fn is_pending(&self, op: Operation) -> bool {
        self.inflight.is_active(op)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Silently re-establish the previous session from the persisted refresh
    /// token.
    ///
    /// Never fails for auth or network reasons: any failure leaves the
    /// session signed out. `loading` is false afterwards either way. With no
    /// persisted refresh token no request is made. A refresh token the API
    /// refuses is erased; one that could not be checked (network failure) is
    /// kept for the next start. If a login or logout settled the session
    /// while the restore was outstanding, its result is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Cancelled` if `cancel` fired before the result
    /// was applied, or `ClientError::Busy` if a restore is already running.
    #[instrument(skip(self, cancel))]
    pub async fn restore(&self, cancel: &CancellationToken) -> Result<Session, ClientError> {
        let _guard = self.inflight.begin(Operation::Restore)?;

        let refresh_token = match self.store.get(keys::REFRESH_TOKEN).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read persisted refresh token");
                None
            }
        };

        let Some(refresh_token) = refresh_token else {
            debug!("No persisted session");
            self.ensure_live(cancel)?;
            let mut state = self.state.write().await;
            if state.loading {
                self.api.clear_access_token().await;
                state.auth = None;
                state.loading = false;
            }
            return Ok(state.clone());
        };

        let result = self.api.refresh(&refresh_token).await;

        // A login or logout that finished meanwhile owns both the session and
        // the store.
        let mut state = self.state.write().await;
        if !state.loading {
            self.ensure_live(cancel)?;
            debug!("Session settled while restoring; restore result dropped");
            return Ok(state.clone());
        }

        match result {
            Ok(response) => {
                // Stored before the liveness check: the API has already
                // consumed the old refresh token if it rotates them.
                self.persist_refreshed(&response).await;
                self.ensure_live(cancel)?;

                let refresh_token = response.refresh_token.unwrap_or(refresh_token);
                self.api
                    .set_access_token(response.access_token.clone())
                    .await;
                info!(user_id = %response.user.id, "Session restored");
                state.auth = Some(Authenticated::new(
                    response.user,
                    response.access_token,
                    refresh_token,
                ));
                state.loading = false;
                Ok(state.clone())
            }
            Err(e) => {
                self.ensure_live(cancel)?;
                warn!(error = %e, "Failed to restore session");
                if e.kind() == ErrorKind::Authentication {
                    self.erase_persisted_tokens().await;
                }
                self.api.clear_access_token().await;
                state.auth = None;
                state.loading = false;
                Ok(state.clone())
            }
        }
    }

    /// End this manager's lifecycle. Outstanding operations drop their
    /// responses when they complete.
    pub fn dispose(&self) {
        debug!("Session manager disposed");
        self.lifecycle.cancel();
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// On success both tokens are persisted and the user is set. On failure
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a malformed email or empty
    /// password (no request is made), `ClientError::Authentication` for
    /// rejected credentials, a network/API error if the request fails,
    /// `ClientError::Storage` if the tokens cannot be persisted, or
    /// `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, password, cancel), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<User, ClientError> {
        let email = Email::parse(email).map_err(ValidationError::from)?;
        if secrecy::ExposeSecret::expose_secret(password).is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        self.ensure_live(cancel)?;
        let _guard = self.inflight.begin(Operation::Login)?;

        let response = self.api.login(&email, password).await?;
        self.ensure_live(cancel)?;

        // Held across persistence so a restore finishing meanwhile cannot
        // interleave its tokens with these.
        let mut state = self.state.write().await;
        if let Err(e) = self.persist_token_pair(&response).await {
            self.erase_persisted_tokens().await;
            return Err(e);
        }

        self.api
            .set_access_token(response.access_token.clone())
            .await;
        state.auth = Some(Authenticated::new(
            response.user.clone(),
            response.access_token,
            response.refresh_token,
        ));
        state.loading = false;

        info!(user_id = %response.user.id, "User logged in");
        Ok(response.user)
    }

    /// Sign out.
    ///
    /// The remote logout is best effort: if it fails the local session is
    /// still cleared. Logout is not cancellable, since once the request has
    /// been sent the server-side session may already be gone.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the persisted tokens could not be
    /// erased (the in-memory session is cleared regardless), or
    /// `ClientError::Busy` if a logout is already running.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let _guard = self.inflight.begin(Operation::Logout)?;

        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Remote logout failed; clearing local session anyway");
        }

        self.clear_local().await;
        let access = self.store.remove(keys::ACCESS_TOKEN).await;
        let refresh = self.store.remove(keys::REFRESH_TOKEN).await;
        info!("User logged out");
        access.and(refresh).map_err(ClientError::from)
    }

    /// Exchange the persisted refresh token for a new access token.
    ///
    /// On success the access token is replaced and persisted; the user is
    /// left as it is (or adopted from the response if the session had none,
    /// so a user never exists without a token). On any failure the whole
    /// session, persisted tokens included, is cleared: the caller must sign
    /// in again.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` if there is no refresh token or
    /// the API refuses it, a network/API/storage error otherwise, or
    /// `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, cancel))]
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        self.ensure_live(cancel)?;
        let _guard = self.inflight.begin(Operation::Refresh)?;

        let refresh_token = match self.store.get(keys::REFRESH_TOKEN).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.clear_session().await;
                return Err(ClientError::Authentication(
                    "no refresh token available".to_string(),
                ));
            }
            Err(e) => {
                self.clear_session().await;
                return Err(e.into());
            }
        };

        let response = match self.api.refresh(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                self.ensure_live(cancel)?;
                warn!(error = %e, "Token refresh failed; session cleared");
                self.clear_session().await;
                return Err(e);
            }
        };

        // Stored before the liveness check: the API has already consumed the
        // old refresh token if it rotates them.
        if let Some(rotated) = &response.refresh_token {
            self.persist_refresh_token(rotated).await;
        }
        let stored = self
            .store
            .set(keys::ACCESS_TOKEN, &response.access_token)
            .await;
        self.ensure_live(cancel)?;
        if let Err(e) = stored {
            self.clear_session().await;
            return Err(e.into());
        }
        let refresh_token = response.refresh_token.unwrap_or(refresh_token);

        self.api
            .set_access_token(response.access_token.clone())
            .await;
        let mut state = self.state.write().await;
        match state.auth.as_mut() {
            Some(auth) => {
                auth.access_token = response.access_token;
                auth.refresh_token = refresh_token;
                auth.token_refreshed_at = Utc::now();
            }
            None => {
                state.auth = Some(Authenticated::new(
                    response.user,
                    response.access_token,
                    refresh_token,
                ));
            }
        }
        state.loading = false;

        debug!("Access token refreshed");
        Ok(())
    }

    /// Update the signed-in user's profile and adopt the returned account.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` when signed out,
    /// `ClientError::Validation` for an empty update, an API error if the
    /// request fails, or `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, update, cancel))]
    pub async fn update_profile(
        &self,
        update: &UserUpdate,
        cancel: &CancellationToken,
    ) -> Result<User, ClientError> {
        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        if !self.is_authenticated().await {
            return Err(ClientError::NotAuthenticated);
        }
        self.ensure_live(cancel)?;
        let _guard = self.inflight.begin(Operation::UpdateProfile)?;

        let user = self.api.update_user(update).await?;
        self.ensure_live(cancel)?;

        let mut state = self.state.write().await;
        // Signed out while the request was outstanding: nothing to update
        let Some(auth) = state.auth.as_mut() else {
            return Err(ClientError::NotAuthenticated);
        };
        auth.user = user.clone();
        Ok(user)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Fail with `Cancelled` if the caller's token or this manager is done.
    fn ensure_live(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        if cancel.is_cancelled() || self.lifecycle.is_cancelled() {
            debug!("Dropping result of cancelled operation");
            return Err(ClientError::Cancelled);
        }
        Ok(())
    }

    async fn persist_token_pair(
        &self,
        response: &crate::api::LoginResponse,
    ) -> Result<(), ClientError> {
        self.store
            .set(keys::ACCESS_TOKEN, &response.access_token)
            .await?;
        self.store
            .set(keys::REFRESH_TOKEN, &response.refresh_token)
            .await?;
        Ok(())
    }

    /// Best-effort write of the tokens a refresh returned.
    async fn persist_refreshed(&self, response: &RefreshResponse) {
        if let Err(e) = self
            .store
            .set(keys::ACCESS_TOKEN, &response.access_token)
            .await
        {
            warn!(error = %e, "Could not persist refreshed access token");
        }
        if let Some(rotated) = &response.refresh_token {
            self.persist_refresh_token(rotated).await;
        }
    }

    async fn persist_refresh_token(&self, token: &SecretString) {
        if let Err(e) = self.store.set(keys::REFRESH_TOKEN, token).await {
            warn!(error = %e, "Could not persist rotated refresh token");
        }
    }

    async fn erase_persisted_tokens(&self) {
        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = self.store.remove(key).await {
                warn!(error = %e, key, "Could not erase persisted token");
            }
        }
    }

    /// Drop the in-memory session and the bearer credential.
    async fn clear_local(&self) {
        self.api.clear_access_token().await;
        let mut state = self.state.write().await;
        state.auth = None;
        state.loading = false;
    }

    /// Drop the session everywhere: memory, bearer credential, storage.
    async fn clear_session(&self) {
        self.clear_local().await;
        self.erase_persisted_tokens().await;
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::store::MemoryTokenStore;
    use secrecy::ExposeSecret;
    use url::Url;

    /// Points at a port nothing listens on; any request fails fast.
    fn offline_manager(store: Arc<MemoryTokenStore>) -> SessionManager {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap())
            .with_http_timeout(std::time::Duration::from_secs(2));
        SessionManager::new(ApiClient::new(&config).unwrap(), store)
    }

    #[tokio::test]
    async fn test_starts_loading_and_signed_out() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        let session = manager.session().await;
        assert!(session.is_loading());
        assert!(session.user().is_none());
        assert!(session.access_token().is_none());
    }

    #[tokio::test]
    async fn test_restore_without_token_skips_network() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        let session = manager.restore(&CancellationToken::new()).await.unwrap();
        assert!(!session.is_loading());
        assert!(!session.is_authenticated());
        assert!(!manager.api().has_access_token().await);
    }

    #[tokio::test]
    async fn test_restore_network_failure_keeps_refresh_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set(keys::REFRESH_TOKEN, &SecretString::from("rt"))
            .await
            .unwrap();
        let manager = offline_manager(store.clone());

        let session = manager.restore(&CancellationToken::new()).await.unwrap();
        assert!(!session.is_loading());
        assert!(session.user().is_none());
        let kept = store.get(keys::REFRESH_TOKEN).await.unwrap().unwrap();
        assert_eq!(kept.expose_secret(), "rt");
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        let cancel = CancellationToken::new();

        let err = manager
            .login("", &SecretString::from("pw"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::InvalidEmail(_))
        ));

        let err = manager
            .login("a@b.com", &SecretString::from(""), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyPassword)
        ));
    }

    #[tokio::test]
    async fn test_login_network_failure_leaves_state() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = offline_manager(store.clone());

        let err = manager
            .login("a@b.com", &SecretString::from("pw"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(!manager.is_authenticated().await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_without_token_clears_session() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        let err = manager.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(_)));
        let session = manager.session().await;
        assert!(session.user().is_none() && session.access_token().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_disposed_manager_rejects_operations() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        manager.dispose();
        assert!(manager.is_disposed());

        let err = manager
            .login("a@b.com", &SecretString::from("pw"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(manager.is_loading().await);
    }

    #[tokio::test]
    async fn test_logout_when_offline_still_clears() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set(keys::ACCESS_TOKEN, &SecretString::from("at"))
            .await
            .unwrap();
        store
            .set(keys::REFRESH_TOKEN, &SecretString::from("rt"))
            .await
            .unwrap();
        let manager = offline_manager(store.clone());
        manager
            .api()
            .set_access_token(SecretString::from("at"))
            .await;

        manager.logout().await.unwrap();
        assert!(store.is_empty().await);
        assert!(!manager.api().has_access_token().await);
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_update_profile_requires_session() {
        let manager = offline_manager(Arc::new(MemoryTokenStore::new()));
        let cancel = CancellationToken::new();

        let err = manager
            .update_profile(&UserUpdate::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyUpdate)
        ));

        let update = UserUpdate {
            name: Some("Kim".into()),
            ..Default::default()
        };
        let err = manager.update_profile(&update, &cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }
}
