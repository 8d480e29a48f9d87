//! Supabase auth client and identity-change notifications.

mod controller;
mod session;

use std::fmt;
use std::future::Future;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::error::ErrorCategory;
use crate::models::Identity;
use crate::util::unix_timestamp_now;

pub use controller::{AuthController, AuthSnapshot};
pub use session::{MemorySessionStore, SessionHandle};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: Identity,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

/// Identity-change notification published by the auth client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AuthConfigStatus {
    pub email_enabled: bool,
    pub signup_enabled: bool,
    pub mailer_autoconfirm: bool,
    pub smtp_configured: bool,
    pub rate_limit_email_sent: Option<i64>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("You must be signed in to do that.")]
    NotSignedIn,
    #[error("Your session has expired. Please sign in again. ({0})")]
    SessionExpired(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

impl AuthError {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConfigured | Self::InvalidConfiguration(_) | Self::SecureStorage(_) => {
                ErrorCategory::Configuration
            }
            Self::NotSignedIn | Self::SessionExpired(_) => ErrorCategory::Authorization,
            Self::Json(_) => ErrorCategory::Validation,
            Self::Http(_) | Self::Api(_) => ErrorCategory::Network,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Identity operations the auth controller depends on.
pub trait IdentityApi: Send + Sync + 'static {
    /// Current session, restoring a persisted one (and refreshing it) when needed.
    fn current_session(&self) -> impl Future<Output = AuthResult<Option<AuthSession>>> + Send;

    /// Fresh identity for the current session, or `None` when signed out.
    fn current_identity(&self) -> impl Future<Output = AuthResult<Option<Identity>>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<AuthSession>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> impl Future<Output = AuthResult<SignUpOutcome>> + Send;

    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;

    fn reset_password(&self, email: &str) -> impl Future<Output = AuthResult<()>> + Send;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    site_url: Option<String>,
    client: Client,
    store: S,
    session: SessionHandle,
    events: broadcast::Sender<AuthEvent>,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            auth_url,
            anon_key,
            site_url: None,
            client: Client::builder().build()?,
            store,
            session: SessionHandle::default(),
            events,
        })
    }

    /// Origin used to build the password-reset redirect link.
    #[must_use]
    pub fn with_site_url(mut self, site_url: Option<String>) -> Self {
        self.site_url = site_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    /// Handle to the live session, shared with the table and storage clients.
    #[must_use]
    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let stored_session = match self.session.get() {
            Some(session) => Some(session),
            None => self.store.load_session()?,
        };
        let Some(stored_session) = stored_session else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.session.set(Some(stored_session.clone()));
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::SessionExpired(reason)) => {
                tracing::warn!("Persisted session was rejected: {}", reason);
                self.session.clear();
                let cleared = self.store.clear_session();
                self.notify(AuthEvent::SignedOut);
                cleared?;
                Ok(None)
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                Err(error)
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "data": { "name": display_name.trim() },
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.activate(&session, AuthEvent::SignedIn)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.activate(&session, AuthEvent::SignedIn)?;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::SessionExpired(
                "no refresh token stored".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(status, &body);
            // 4xx means the refresh token itself is no good; anything else may pass.
            return Err(if status.is_client_error() {
                AuthError::SessionExpired(message)
            } else {
                AuthError::Api(message)
            });
        }
        let response = response.json::<SupabaseAuthResponse>().await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.activate(&session, AuthEvent::TokenRefreshed)?;
        Ok(session)
    }

    /// Clears the local session first, then revokes it remotely.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let active = self.session.get();
        self.session.clear();
        let cleared = self.store.clear_session();
        self.notify(AuthEvent::SignedOut);
        cleared?;

        let Some(active) = active else {
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&active.access_token)
            .send()
            .await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        if email.trim().is_empty() {
            return Err(AuthError::Api("Email is required".to_string()));
        }

        let mut request = self
            .client
            .post(format!("{}/recover", self.auth_url))
            .json(&serde_json::json!({ "email": email.trim() }));
        if let Some(site_url) = &self.site_url {
            request = request.query(&[("redirect_to", format!("{site_url}/reset-password"))]);
        }

        let response = self.public_request(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    /// Fetch the user behind the active session from the identity provider.
    pub async fn fetch_identity(&self) -> AuthResult<Option<Identity>> {
        let Some(session) = self.session.get() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let user = response.json::<SupabaseUser>().await?;
        Ok(Some(user.into()))
    }

    pub async fn verify_configuration(&self) -> AuthResult<AuthConfigStatus> {
        let request = self.public_request(
            self.client
                .get(format!("{}/settings", self.auth_url))
                .header("Accept", "application/json"),
        );
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let payload = response.json::<SupabaseSettingsResponse>().await?;
        Ok(payload.into())
    }

    fn activate(&self, session: &AuthSession, event: AuthEvent) -> AuthResult<()> {
        self.session.set(Some(session.clone()));
        self.store.save_session(session)?;
        self.notify(event);
        Ok(())
    }

    fn notify(&self, event: AuthEvent) {
        // No receivers is fine: nobody is observing auth state yet.
        let _ = self.events.send(event);
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }
}

impl<S: SessionPersistence> IdentityApi for SupabaseAuthClient<S> {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.restore_session().await
    }

    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        self.fetch_identity().await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        Self::sign_in(self, email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<SignUpOutcome> {
        Self::sign_up(self, email, password, display_name).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        Self::sign_out(self).await
    }

    async fn reset_password(&self, email: &str) -> AuthResult<()> {
        Self::reset_password(self, email).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested_session = self.session;
        let access_token = self.access_token.or_else(|| {
            nested_session
                .as_ref()
                .and_then(|session| session.access_token.clone())
        });
        let refresh_token = self.refresh_token.or_else(|| {
            nested_session
                .as_ref()
                .and_then(|session| session.refresh_token.clone())
        });
        let expires_at = self
            .expires_at
            .or_else(|| {
                nested_session
                    .as_ref()
                    .and_then(|session| session.expires_at)
            })
            .or_else(|| {
                self.expires_in
                    .or_else(|| {
                        nested_session
                            .as_ref()
                            .and_then(|session| session.expires_in)
                    })
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            });
        let user = self
            .user
            .or_else(|| nested_session.and_then(|session| session.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<SupabaseUserMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct SupabaseUserMetadata {
    #[serde(default)]
    name: Option<String>,
}

impl From<SupabaseUser> for Identity {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
            display_name: value
                .user_metadata
                .and_then(|metadata| metadata.name)
                .filter(|name| !name.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseSettingsResponse {
    external: Option<SupabaseSettingsExternal>,
    disable_signup: Option<bool>,
    mailer_autoconfirm: Option<bool>,
    rate_limit_email_sent: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SupabaseSettingsExternal {
    email: Option<bool>,
    #[serde(default)]
    smtp_admin_email: Option<String>,
    #[serde(default)]
    smtp_host: Option<String>,
}

impl From<SupabaseSettingsResponse> for AuthConfigStatus {
    fn from(value: SupabaseSettingsResponse) -> Self {
        let external = value.external;
        let email_enabled = external.as_ref().and_then(|cfg| cfg.email).unwrap_or(false);
        let signup_enabled = !value.disable_signup.unwrap_or(true);
        let mailer_autoconfirm = value.mailer_autoconfirm.unwrap_or(false);

        let smtp_configured = external.as_ref().is_some_and(|cfg| {
            let has_email = cfg
                .smtp_admin_email
                .as_ref()
                .is_some_and(|email| !email.trim().is_empty());
            let has_host = cfg
                .smtp_host
                .as_ref()
                .is_some_and(|host| !host.trim().is_empty());
            has_email || has_host
        });

        Self {
            email_enabled,
            signup_enabled,
            mailer_autoconfirm,
            smtp_configured,
            rate_limit_email_sent: value.rate_limit_email_sent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

/// Extract the provider's human-readable message from an error body.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", crate::util::compact_text(trimmed), status.as_u16())
    }
}
