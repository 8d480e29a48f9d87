//! Connection and setup diagnostics for the configured Supabase project.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::auth::{IdentityApi, SessionPersistence};
use crate::config::{ConfigReport, RuntimeConfig};
use crate::error::{Error, Result};
use crate::models::{PRACTICE_SESSIONS_TABLE, RECORDINGS_BUCKET, RESUMES_BUCKET};
use crate::remote::{BlobStore, RemoteClient};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Buckets the practice and tailored flows write to.
pub const REQUIRED_BUCKETS: [&str; 2] = [RECORDINGS_BUCKET, RESUMES_BUCKET];

/// Storage policies each bucket needs; they have to be applied in the dashboard.
pub const STORAGE_POLICIES: [(&str, &str); 3] = [
    (
        "Allow authenticated uploads",
        "CREATE POLICY \"Allow authenticated uploads\" ON storage.objects FOR INSERT TO authenticated \
         WITH CHECK (bucket_id = '{bucket}' AND auth.uid()::text = (storage.foldername(name))[2]);",
    ),
    (
        "Allow users to manage their own files",
        "CREATE POLICY \"Allow users to manage their own files\" ON storage.objects FOR ALL TO authenticated \
         USING (bucket_id = '{bucket}' AND auth.uid()::text = (storage.foldername(name))[2]);",
    ),
    (
        "Allow public read access",
        "CREATE POLICY \"Allow public read access\" ON storage.objects FOR SELECT TO public \
         USING (bucket_id = '{bucket}');",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: Option<String>,
}

impl CheckResult {
    fn from_outcome<T>(
        name: &'static str,
        outcome: Result<T>,
        detail: impl FnOnce(&T) -> Option<String>,
    ) -> (Self, Option<T>) {
        match outcome {
            Ok(value) => (
                Self {
                    name,
                    status: CheckStatus::Passed,
                    detail: detail(&value),
                },
                Some(value),
            ),
            Err(error) => (
                Self {
                    name,
                    status: CheckStatus::Failed(error.to_string()),
                    detail: None,
                },
                None,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub checks: Vec<CheckResult>,
    pub buckets: Vec<String>,
}

impl ConnectionReport {
    pub fn success(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.status == CheckStatus::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSetupReport {
    pub present: Vec<String>,
    pub missing: Vec<&'static str>,
}

impl StorageSetupReport {
    pub fn complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Policy statements to apply for each missing bucket.
    pub fn policy_sql(&self) -> Vec<(String, String)> {
        self.missing
            .iter()
            .flat_map(|bucket| {
                STORAGE_POLICIES
                    .iter()
                    .map(move |(name, sql)| (format!("{name} ({bucket})"), sql.replace("{bucket}", bucket)))
            })
            .collect()
    }
}

/// Probe auth, the sessions table, and storage of the configured project.
pub async fn check_connection<S: SessionPersistence>(
    config: &RuntimeConfig,
    store: S,
) -> Result<ConnectionReport> {
    if config.is_mock() {
        return Err(Error::Configuration(
            "Missing Supabase credentials in environment variables".to_string(),
        ));
    }
    let remote = RemoteClient::connect(config, store)?;
    let mut checks = Vec::with_capacity(4);

    let (check, _) = CheckResult::from_outcome(
        "auth settings",
        probe(remote.verify_auth_settings()).await,
        |status| {
            Some(format!(
                "email sign-in {}, sign-up {}",
                enabled(status.email_enabled),
                enabled(status.signup_enabled)
            ))
        },
    );
    checks.push(check);

    let (check, _) = CheckResult::from_outcome(
        "auth session",
        probe(async { Ok::<_, Error>(remote.current_session().await?) }).await,
        |session| {
            Some(if session.is_some() {
                "authenticated".to_string()
            } else {
                "not authenticated".to_string()
            })
        },
    );
    checks.push(check);

    let (check, _) = CheckResult::from_outcome(
        "database",
        probe(remote.probe_table(PRACTICE_SESSIONS_TABLE)).await,
        |_| Some(format!("{PRACTICE_SESSIONS_TABLE} reachable")),
    );
    checks.push(check);

    let (check, buckets) = CheckResult::from_outcome(
        "storage",
        probe(remote.list_buckets()).await,
        |buckets| Some(format!("{} bucket(s) visible", buckets.len())),
    );
    checks.push(check);

    let report = ConnectionReport {
        checks,
        buckets: buckets.unwrap_or_default(),
    };
    if report.success() {
        tracing::info!("Supabase connection test passed");
    } else {
        tracing::warn!("Supabase connection test failed");
    }
    Ok(report)
}

/// Report which required buckets exist.
pub async fn check_storage_setup<B: BlobStore>(blobs: &B) -> Result<StorageSetupReport> {
    let present = blobs.list_buckets().await?;
    let missing = REQUIRED_BUCKETS
        .into_iter()
        .filter(|required| !present.iter().any(|name| name == required))
        .collect();
    Ok(StorageSetupReport { present, missing })
}

/// Display-safe summary of the resolved configuration.
pub fn describe_config(config: &RuntimeConfig) -> ConfigReport {
    config.describe()
}

async fn probe<T>(operation: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(PROBE_TIMEOUT, operation).await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Remote(format!(
            "No response within {} seconds",
            PROBE_TIMEOUT.as_secs()
        ))),
    }
}

const fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
