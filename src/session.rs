// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session controller: owns the token/user pair and hands out credentials.
//!
//! Token and user are installed and removed together. The single exception
//! is [`SessionController::restore`], which attaches a persisted token before
//! the user record has arrived; it resolves to either a full session or a
//! cleared one before returning.

use std::fmt;

use crate::api::fetch_json;
use crate::error::{ApiError, AuthError};
use crate::events::{ClientEvent, SharedEventReporter};
use crate::http::{ApiRequest, HttpClient};
use crate::models::{Credentials, LoginResponse, Registration, Role, User};
use crate::storage::TokenStore;

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTER_FALLBACK: &str = "Registration failed";

/// Which screen the client is currently on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Landing,
    Login,
    Register,
    Browse,
    Podcast(String),
    Search(String),
    Dashboard,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Landing => f.write_str("landing"),
            View::Login => f.write_str("login"),
            View::Register => f.write_str("register"),
            View::Browse => f.write_str("browse"),
            View::Podcast(id) => write!(f, "podcast {id}"),
            View::Search(query) => write!(f, "search '{query}'"),
            View::Dashboard => f.write_str("dashboard"),
        }
    }
}

/// The active token and the account it belongs to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// True once both token and user are present
    pub fn is_active(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}

/// Owns authentication state and builds credentialed requests for every view
pub struct SessionController<S: TokenStore> {
    store: S,
    session: Session,
    view: View,
    reporter: SharedEventReporter,
}

impl<S: TokenStore> SessionController<S> {
    /// Create a controller with no active session.
    ///
    /// Call [`restore`](Self::restore) afterwards to pick up a persisted token.
    pub fn new(store: S, reporter: SharedEventReporter) -> Self {
        Self {
            store,
            session: Session::default(),
            view: View::Landing,
            reporter,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.user()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_podcaster(&self) -> bool {
        self.current_user().is_some_and(User::is_podcaster)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn navigate(&mut self, view: View) {
        tracing::debug!(from = %self.view, to = %view, "navigating");
        self.view = view;
    }

    /// Stamp the current credential onto a request that requires one
    pub fn authorize(&self, request: ApiRequest) -> Result<ApiRequest, ApiError> {
        match self.session.token() {
            Some(token) => Ok(request.bearer(Some(token.to_string()))),
            None => Err(ApiError::NotAuthenticated),
        }
    }

    /// Stamp the current credential onto a request, if there is one
    pub fn credentialed(&self, request: ApiRequest) -> ApiRequest {
        request.bearer(self.session.token.clone())
    }

    /// Pick up a persisted token on startup and validate it against the server.
    ///
    /// Returns true if a session was established. A token the server rejects
    /// is cleared exactly as [`logout`](Self::logout) would.
    pub async fn restore<C: HttpClient>(&mut self, client: &C) -> bool {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "persisted session unreadable, discarding");
                self.end_session();
                return false;
            }
        };

        self.session.token = Some(token);
        let request = self.credentialed(ApiRequest::get("/api/auth/me"));

        match fetch_json::<_, User>(client, request).await {
            Ok(user) => {
                tracing::info!(username = %user.username, "restored session");
                self.reporter.report(ClientEvent::SessionRestored {
                    username: user.username.clone(),
                });
                self.session.user = Some(user);
                true
            }
            Err(e) => {
                tracing::info!(error = %e, "persisted token rejected, clearing session");
                self.end_session();
                self.reporter.report(ClientEvent::SessionExpired {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Log in with email and password.
    ///
    /// On failure the previous session, if any, is left exactly as it was.
    pub async fn login<C: HttpClient>(
        &mut self,
        client: &C,
        email: &str,
        password: &str,
    ) -> Result<&User, AuthError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match request_login(client, &credentials).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(email, error = %e, "login failed");
                self.reporter.report(ClientEvent::LoginFailed {
                    message: e.message(),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&response.access_token) {
            tracing::warn!(error = %e, "could not persist session token");
            self.reporter.report(ClientEvent::LoginFailed {
                message: e.to_string(),
            });
            return Err(e.into());
        }

        tracing::info!(username = %response.user.username, role = %response.user.role, "logged in");
        self.reporter.report(ClientEvent::LoggedIn {
            username: response.user.username.clone(),
        });

        self.session.token = Some(response.access_token);
        let user: &User = self.session.user.insert(response.user);
        Ok(user)
    }

    /// Create a new account. Never touches the active session.
    pub async fn register<C: HttpClient>(
        &self,
        client: &C,
        email: &str,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let registration = Registration {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            role,
        };

        match request_registration(client, &registration).await {
            Ok(user) => {
                tracing::info!(username = %user.username, role = %user.role, "registered account");
                self.reporter.report(ClientEvent::Registered {
                    username: user.username.clone(),
                });
                Ok(user)
            }
            Err(e) => {
                tracing::info!(email, error = %e, "registration failed");
                self.reporter.report(ClientEvent::RegisterFailed {
                    message: e.message(),
                });
                Err(e)
            }
        }
    }

    /// Re-fetch the current user's record for an active session
    pub async fn refresh_user<C: HttpClient>(&mut self, client: &C) -> Result<&User, ApiError> {
        let request = self.authorize(ApiRequest::get("/api/auth/me"))?;
        let user: User = fetch_json(client, request).await?;
        let user: &User = self.session.user.insert(user);
        Ok(user)
    }

    /// End the session: forget the persisted token, drop the user, and go
    /// back to the landing view.
    pub fn logout(&mut self) {
        let username = self.current_user().map(|u| u.username.clone());
        self.end_session();
        tracing::info!(username = username.as_deref().unwrap_or("-"), "logged out");
        self.reporter.report(ClientEvent::LoggedOut);
    }

    fn end_session(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "could not remove persisted session token");
        }
        self.session = Session::default();
        self.view = View::Landing;
    }
}

async fn request_login<C: HttpClient>(
    client: &C,
    credentials: &Credentials,
) -> Result<LoginResponse, AuthError> {
    credentials.validate()?;

    let body = serde_json::to_value(credentials).map_err(|e| AuthError::Unavailable {
        fallback: LOGIN_FALLBACK,
        source: ApiError::Encode {
            path: "/api/auth/login".to_string(),
            source: e,
        },
    })?;

    let response: LoginResponse =
        fetch_json(client, ApiRequest::post("/api/auth/login").json(body))
            .await
            .map_err(|e| AuthError::from_api(e, LOGIN_FALLBACK))?;

    if response.access_token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(response)
}

async fn request_registration<C: HttpClient>(
    client: &C,
    registration: &Registration,
) -> Result<User, AuthError> {
    registration.validate()?;

    let body = serde_json::to_value(registration).map_err(|e| AuthError::Unavailable {
        fallback: REGISTER_FALLBACK,
        source: ApiError::Encode {
            path: "/api/auth/register".to_string(),
            source: e,
        },
    })?;

    fetch_json(client, ApiRequest::post("/api/auth/register").json(body))
        .await
        .map_err(|e| AuthError::from_api(e, REGISTER_FALLBACK))
}
