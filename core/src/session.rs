//! The single authority for who the current user is and which token
//! authorizes requests.
//!
//! # Design
//! A `SessionManager` is an explicit object handed to its dependents as
//! `Arc<SessionManager>`; each instance is an isolated session, so tests
//! build their own. The public view of the session (`AuthState`) lives in a
//! `tokio::sync::watch` channel so views can gate rendering on `loading`
//! without blocking. The bearer token itself is kept out of that channel.
//!
//! Startup runs `checking -> {authenticated, unauthenticated}` exactly once
//! per `initialize()` call and always ends with `loading == false`.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth_api::{AuthApi, LOGIN_FAILED, REGISTER_FAILED};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::storage::{FileTokenStore, TokenStore};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{LoginRequest, RegisterRequest, TokenResponse, User};

/// Read-only snapshot of the session exposed to views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub loading: bool,
}

impl AuthState {
    fn checking() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            loading: true,
        }
    }
}

/// Where the caller should navigate after a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The authenticated home view.
    Home,
    /// The unauthenticated landing view.
    Landing,
}

pub struct SessionManager {
    api: AuthApi,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    token: Mutex<Option<String>>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(api: AuthApi, transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            transport,
            store,
            token: Mutex::new(None),
            state: watch::Sender::new(AuthState::checking()),
        }
    }

    /// Production wiring: `reqwest` transport and a file-backed token store.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::new(
            AuthApi::new(&config.api_base_url),
            Arc::new(transport),
            Arc::new(FileTokenStore::new(&config.token_path)),
        ))
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn auth_state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Resolve once startup validation has reached a terminal state.
    pub async fn wait_until_ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let ready = rx.wait_for(|state| !state.loading).await.map(|state| state.clone());
        ready.unwrap_or_else(|_| self.auth_state())
    }

    /// Restore the persisted session, if any.
    ///
    /// A stored token is validated against the identity endpoint. Any
    /// failure, network or rejection, discards the token and leaves the
    /// session unauthenticated; nothing is surfaced to the caller.
    pub async fn initialize(&self) -> AuthState {
        self.state.send_modify(|state| state.loading = true);

        let stored = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read stored token");
            None
        });

        match stored {
            None => {
                debug!("no stored token, starting unauthenticated");
                self.clear_in_memory();
            }
            Some(token) => match self.validate(&token).await {
                Ok(user) => {
                    debug!(user_id = %user.id, "restored session");
                    self.establish(token, user);
                }
                Err(e) => {
                    warn!(error = %e, "stored token failed validation, discarding");
                    self.clear_stored();
                    self.clear_in_memory();
                }
            },
        }

        self.state.send_modify(|state| state.loading = false);
        self.auth_state()
    }

    /// Ask the server who `token` belongs to.
    pub async fn validate(&self, token: &str) -> Result<User, ApiError> {
        let response = self.transport.execute(self.api.build_me(token)).await?;
        self.api.parse_me(response)
    }

    /// Exchange credentials for a session. On failure the session is left
    /// untouched and the error carries the server's message.
    pub async fn login(&self, email: &str, password: &str) -> Result<Destination, ApiError> {
        let request = self.api.build_login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let granted = self
            .exchange(request, LOGIN_FAILED)
            .await
            .inspect_err(|e| debug!(error = %e, "login failed"))?;
        self.adopt(granted)?;
        Ok(Destination::Home)
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<Destination, ApiError> {
        let request = self.api.build_register(&RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let granted = self
            .exchange(request, REGISTER_FAILED)
            .await
            .inspect_err(|e| debug!(error = %e, "registration failed"))?;
        self.adopt(granted)?;
        Ok(Destination::Home)
    }

    /// Local-only: forget the token and the user. No request is sent.
    pub fn logout(&self) -> Destination {
        self.clear_stored();
        self.clear_in_memory();
        info!("logged out");
        Destination::Landing
    }

    /// Token to attach to authenticated requests.
    pub fn bearer_token(&self) -> Result<String, ApiError> {
        self.token_slot().clone().ok_or(ApiError::NotAuthenticated)
    }

    /// Drop the session after the server rejected `token`.
    ///
    /// Ignored when the session has since moved on to a different token, so
    /// a late rejection cannot log out a newer login.
    pub fn reject_token(&self, token: &str) {
        if self.token_slot().as_deref() != Some(token) {
            debug!("ignoring rejection of a superseded token");
            return;
        }
        warn!("server rejected the session token, clearing session");
        self.clear_stored();
        self.clear_in_memory();
    }

    async fn exchange(
        &self,
        request: crate::http::HttpRequest,
        default_message: &str,
    ) -> Result<TokenResponse, ApiError> {
        let response = self.transport.execute(request).await?;
        self.api.parse_token_response(response, default_message)
    }

    fn adopt(&self, granted: TokenResponse) -> Result<(), ApiError> {
        self.store.save(&granted.access_token)?;
        info!(user_id = %granted.user.id, "session established");
        self.establish(granted.access_token, granted.user);
        Ok(())
    }

    fn establish(&self, token: String, user: User) {
        *self.token_slot() = Some(token);
        self.state.send_modify(|state| {
            state.user = Some(user);
            state.is_authenticated = true;
            state.loading = false;
        });
    }

    fn clear_stored(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored token");
        }
    }

    fn clear_in_memory(&self) {
        *self.token_slot() = None;
        self.state.send_modify(|state| {
            state.user = None;
            state.is_authenticated = false;
        });
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.api)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
