//! Remote data client.
//!
//! [`RemoteClient`] bundles the three Supabase surfaces the app talks to
//! (auth, PostgREST tables, storage) behind one shared session. Flows depend
//! on the [`RecordStore`] and [`BlobStore`] traits so they can run against
//! in-memory fakes.

mod rest;
mod storage;

use std::fmt;
use std::future::Future;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth::{
    AuthConfigStatus, AuthEvent, AuthResult, AuthSession, IdentityApi, SessionHandle,
    SessionPersistence, SignUpOutcome, SupabaseAuthClient,
};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::models::{
    CustomQuestion, Identity, NewCustomQuestion, NewPracticeSession, NewResumeFile,
    PracticeSession, ResumeFile, CUSTOM_QUESTIONS_TABLE, PRACTICE_SESSIONS_TABLE,
    RESUME_FILES_TABLE,
};
use crate::util::compact_text;

pub use rest::{eq, order_desc, TableClient};
pub use storage::StorageClient;

/// Typed row operations, always scoped to one user.
pub trait RecordStore: Send + Sync {
    fn insert_practice_session(
        &self,
        row: &NewPracticeSession,
    ) -> impl Future<Output = Result<PracticeSession>> + Send;

    /// Sessions owned by `user_id`, newest first.
    fn list_practice_sessions(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<PracticeSession>>> + Send;

    fn delete_practice_session(
        &self,
        user_id: &str,
        id: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    fn insert_resume_file(
        &self,
        row: &NewResumeFile,
    ) -> impl Future<Output = Result<ResumeFile>> + Send;

    fn insert_custom_question(
        &self,
        row: &NewCustomQuestion,
    ) -> impl Future<Output = Result<CustomQuestion>> + Send;
}

/// Object storage operations.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `object_path`; returns the stored path.
    fn upload(
        &self,
        bucket: &str,
        object_path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String>> + Send;

    fn public_url(&self, bucket: &str, object_path: &str) -> String;

    fn remove(
        &self,
        bucket: &str,
        object_paths: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_buckets(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Project URL, anon key, and the live session every request is signed with.
#[derive(Clone)]
pub struct RemoteTarget {
    base_url: String,
    anon_key: String,
    session: SessionHandle,
}

impl RemoteTarget {
    pub fn new(base_url: &str, anon_key: impl Into<String>, session: SessionHandle) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session,
        }
    }

    /// Adds the project key and the caller's token (the anon key when signed out).
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }
}

pub struct RemoteClient<S: SessionPersistence> {
    auth: SupabaseAuthClient<S>,
    tables: TableClient,
    storage: StorageClient,
}

impl<S: SessionPersistence> RemoteClient<S> {
    /// Build a client for a configured project. Mock mode is refused.
    pub fn connect(config: &RuntimeConfig, store: S) -> Result<Self> {
        config.require_configured()?;
        let auth = SupabaseAuthClient::new(&config.supabase_url, &config.supabase_anon_key, store)?
            .with_site_url(config.site_url.clone());
        let target = RemoteTarget::new(
            &config.supabase_url,
            config.supabase_anon_key.clone(),
            auth.session_handle(),
        );
        let client = Client::builder().build()?;

        Ok(Self {
            auth,
            tables: TableClient::new(target.clone(), client.clone()),
            storage: StorageClient::new(target, client),
        })
    }

    #[must_use]
    pub const fn auth(&self) -> &SupabaseAuthClient<S> {
        &self.auth
    }

    #[must_use]
    pub const fn tables(&self) -> &TableClient {
        &self.tables
    }

    pub async fn verify_auth_settings(&self) -> Result<AuthConfigStatus> {
        Ok(self.auth.verify_configuration().await?)
    }

    /// Select a single row to prove the table is reachable.
    pub async fn probe_table(&self, table: &str) -> Result<()> {
        self.tables
            .select::<serde_json::Value>(table, &[("limit", "1".to_string())])
            .await
            .map(|_| ())
    }

    /// Refresh an expired session before a data call.
    async fn fresh_session(&self) -> Result<()> {
        match self.auth.restore_session().await? {
            Some(_) => Ok(()),
            None => Err(Error::Unauthorized(
                "You must be signed in to do that. Run `rehearse login` first.".to_string(),
            )),
        }
    }
}

impl<S: SessionPersistence> fmt::Debug for RemoteClient<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteClient")
            .field("tables", &self.tables)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<S: SessionPersistence> IdentityApi for RemoteClient<S> {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.auth.current_session().await
    }

    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        self.auth.current_identity().await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.auth.sign_in(email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<SignUpOutcome> {
        self.auth.sign_up(email, password, display_name).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.auth.sign_out().await
    }

    async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.auth.reset_password(email).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        IdentityApi::subscribe(&self.auth)
    }
}

impl<S: SessionPersistence> RecordStore for RemoteClient<S> {
    async fn insert_practice_session(&self, row: &NewPracticeSession) -> Result<PracticeSession> {
        self.fresh_session().await?;
        self.tables.insert(PRACTICE_SESSIONS_TABLE, row).await
    }

    async fn list_practice_sessions(&self, user_id: &str) -> Result<Vec<PracticeSession>> {
        self.fresh_session().await?;
        self.tables
            .select(
                PRACTICE_SESSIONS_TABLE,
                &[eq("user_id", user_id), order_desc("created_at")],
            )
            .await
    }

    async fn delete_practice_session(&self, user_id: &str, id: i64) -> Result<()> {
        self.fresh_session().await?;
        self.tables
            .delete(PRACTICE_SESSIONS_TABLE, &[eq("id", id), eq("user_id", user_id)])
            .await
    }

    async fn insert_resume_file(&self, row: &NewResumeFile) -> Result<ResumeFile> {
        self.fresh_session().await?;
        self.tables.insert(RESUME_FILES_TABLE, row).await
    }

    async fn insert_custom_question(&self, row: &NewCustomQuestion) -> Result<CustomQuestion> {
        self.fresh_session().await?;
        self.tables.insert(CUSTOM_QUESTIONS_TABLE, row).await
    }
}

impl<S: SessionPersistence> BlobStore for RemoteClient<S> {
    async fn upload(
        &self,
        bucket: &str,
        object_path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        self.fresh_session().await?;
        self.storage
            .upload(bucket, object_path, content_type, bytes)
            .await
    }

    fn public_url(&self, bucket: &str, object_path: &str) -> String {
        self.storage.public_url(bucket, object_path)
    }

    async fn remove(&self, bucket: &str, object_paths: &[String]) -> Result<()> {
        self.fresh_session().await?;
        self.storage.remove(bucket, object_paths).await
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.storage.list_buckets().await
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    message: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

/// Pass successful responses through; turn failures into [`Error::Remote`].
async fn check_response(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(remote_message(status, &body)))
}

/// The service's own message when it sent one, else a compact body.
fn remote_message(status: u16, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return message.trim().to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        compact_text(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::config::ConfigOverrides;

    #[test]
    fn remote_message_is_passed_through_verbatim() {
        let body = r#"{"code":"42501","message":"new row violates row-level security policy for table \"practice_sessions\""}"#;
        assert_eq!(
            remote_message(403, body),
            "new row violates row-level security policy for table \"practice_sessions\""
        );
        assert_eq!(
            remote_message(404, r#"{"statusCode":"404","error":"Bucket not found","message":"Bucket not found"}"#),
            "Bucket not found"
        );
        assert_eq!(remote_message(500, ""), "HTTP 500");
        assert_eq!(remote_message(502, "Bad gateway"), "Bad gateway");
    }

    #[test]
    fn connect_refuses_mock_mode() {
        let config = RuntimeConfig::resolve_with(&ConfigOverrides::default(), |_| None).unwrap();
        let error = RemoteClient::connect(&config, MemorySessionStore::default()).unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }

    #[test]
    fn connect_shares_one_session_between_surfaces() {
        let config = RuntimeConfig::resolve_with(&ConfigOverrides::default(), |key| match key {
            "SUPABASE_URL" => Some("https://demo.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon-key".to_string()),
            _ => None,
        })
        .unwrap();
        let remote = RemoteClient::connect(&config, MemorySessionStore::default()).unwrap();
        assert_eq!(
            remote.public_url("interview-recordings", "recordings/u/a.webm"),
            "https://demo.supabase.co/storage/v1/object/public/interview-recordings/recordings/u/a.webm"
        );
        assert!(remote.auth().session_handle().get().is_none());
    }

    #[tokio::test]
    async fn data_calls_without_a_session_are_unauthorized() {
        let config = RuntimeConfig::resolve_with(&ConfigOverrides::default(), |key| match key {
            "SUPABASE_URL" => Some("https://demo.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon-key".to_string()),
            _ => None,
        })
        .unwrap();
        let remote = RemoteClient::connect(&config, MemorySessionStore::default()).unwrap();
        let error = remote.list_practice_sessions("user-1").await.unwrap_err();
        assert!(matches!(error, Error::Unauthorized(_)));
    }
}
