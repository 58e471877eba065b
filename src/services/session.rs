//! Session manager: token lifecycle and authorized requests.
//!
//! The token and the user record are held together in one `Option<Session>`,
//! so the in-memory state is either fully signed in or fully signed out.
//! The same pair is mirrored into a [`SessionStore`] and written/removed as a
//! unit.

use crate::models::{LoginRequest, RegisterRequest, TokenResponse, User};
use crate::services::api_client::{ApiClient, RequestFailure, RequestOptions};
use crate::services::session_store::{SessionStore, StoreError, TOKEN_KEY, USER_KEY};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const ME_PATH: &str = "/auth/me";

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTER_FALLBACK: &str = "Registration failed";

/// An authenticated session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// What [`SessionManager::restore`] found in storage
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// Both entries were present and valid
    Restored(User),
    /// Nothing persisted
    Empty,
    /// Entries were partial or unreadable; storage was cleared
    Malformed,
}

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Credentials or registration data rejected by the server
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    Request(#[from] RequestFailure),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SessionError {
    /// Message suitable for showing next to a login/registration form
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Authentication(msg) => msg.clone(),
            SessionError::Request(failure) => failure.user_message(),
            SessionError::Storage(_) => "Could not save the session on this device".to_string(),
        }
    }
}

/// Owns the authentication session and hands out authorized requests
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
    state: RwLock<Option<Session>>,
}

impl SessionManager {
    /// Create an empty (signed-out) session manager. Call
    /// [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Load a persisted session.
    ///
    /// Absent, partial, or unreadable data leaves the session signed out.
    /// This is never an error for the caller.
    pub fn restore(&self) -> RestoreOutcome {
        let token = self.store.get(TOKEN_KEY);
        let user = self.store.get(USER_KEY);

        let (token, user) = match (token, user) {
            (Ok(None), Ok(None)) => {
                *self.write() = None;
                debug!("No persisted session");
                return RestoreOutcome::Empty;
            }
            (Ok(Some(token)), Ok(Some(user))) if !token.is_empty() => (token, user),
            (token, user) => {
                warn!(
                    token_readable = token.is_ok(),
                    user_readable = user.is_ok(),
                    "Persisted session incomplete, discarding"
                );
                return self.discard_persisted();
            }
        };

        let user: User = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Persisted user record unreadable, discarding session");
                return self.discard_persisted();
            }
        };

        info!(username = %user.username, role = %user.role, "Restored session");
        *self.write() = Some(Session {
            token,
            user: user.clone(),
        });
        RestoreOutcome::Restored(user)
    }

    /// Sign in with username and password
    pub async fn login(&self, username: &str, password: &str) -> Result<User, SessionError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.authenticate(LOGIN_PATH, &body, LOGIN_FALLBACK).await
    }

    /// Create an account and sign in with it
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, SessionError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate(REGISTER_PATH, &body, REGISTER_FALLBACK).await
    }

    /// Clear the session in memory and in storage. Always succeeds.
    pub fn logout(&self) {
        let previous = self.write().take();
        self.clear_persisted();
        match previous {
            Some(session) => info!(username = %session.user.username, "Signed out"),
            None => debug!("Sign-out requested without a session"),
        }
    }

    /// Send a request to the API, attaching the bearer token when signed in.
    ///
    /// The token is read at call time. Without a session the request goes
    /// out unauthenticated and the server decides.
    pub async fn authorized_fetch(&self, path: &str, options: RequestOptions) -> Result<Response, RequestFailure> {
        let token = self.token();
        self.api.send(path, options, token.as_deref()).await
    }

    /// Re-check the session against `/auth/me`.
    ///
    /// A rejected token signs the session out and yields `Ok(None)`; a valid
    /// one refreshes the stored user record.
    pub async fn verify(&self) -> Result<Option<User>, SessionError> {
        let Some(token) = self.token() else {
            return Ok(None);
        };

        let response = self.api.send(ME_PATH, RequestOptions::get(), Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Stored token rejected by server, signing out");
            if self.token().as_deref() == Some(token.as_str()) {
                self.logout();
            }
            return Ok(None);
        }

        let user: User = ApiClient::json(response).await?;
        let mut state = self.write();
        if let Some(session) = state.as_mut().filter(|s| s.token == token) {
            self.store.set(USER_KEY, &serde_json::to_string(&user).map_err(StoreError::from)?)?;
            session.user = user.clone();
        }
        Ok(Some(user))
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.read().as_ref().is_some_and(|s| s.user.is_admin())
    }

    async fn authenticate<T: Serialize>(&self, path: &str, body: &T, fallback: &str) -> Result<User, SessionError> {
        let response = self.api.send(path, RequestOptions::post(body)?, None).await?;

        if !response.status().is_success() {
            let message = match ApiClient::failure(response).await {
                RequestFailure::Status { message: Some(msg), .. } => msg,
                _ => fallback.to_string(),
            };
            warn!(endpoint = %path, reason = %message, "Authentication rejected");
            return Err(SessionError::Authentication(message));
        }

        let data: TokenResponse = ApiClient::json(response).await?;
        self.persist(&data.access_token, &data.user)?;
        info!(username = %data.user.username, role = %data.user.role, "Signed in");

        *self.write() = Some(Session {
            token: data.access_token,
            user: data.user.clone(),
        });
        Ok(data.user)
    }

    /// Write token and user together, rolling back the token if the user
    /// record cannot be written
    fn persist(&self, token: &str, user: &User) -> Result<(), StoreError> {
        let user_json = serde_json::to_string(user)?;
        self.store.set(TOKEN_KEY, token)?;
        if let Err(e) = self.store.set(USER_KEY, &user_json) {
            if let Err(rollback) = self.store.remove(TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back persisted token");
            }
            return Err(e);
        }
        Ok(())
    }

    fn discard_persisted(&self) -> RestoreOutcome {
        *self.write() = None;
        self.clear_persisted();
        RestoreOutcome::Malformed
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session entry");
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
