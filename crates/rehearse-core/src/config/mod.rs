//! Runtime configuration for Rehearse clients.
//!
//! Resolves the Supabase connection parameters and the optional OpenAI key
//! once at startup. Resolution order is fixed: explicit overrides (an injected
//! `rehearse.json` document or CLI flags), then the process environment, then
//! placeholder values. Falling through to placeholders puts the client in
//! [`ConnectionMode::Mock`], which callers surface separately from a real
//! connection failure.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, mask_secret, normalize_text_option};
use crate::{Error, Result};

pub const PLACEHOLDER_SUPABASE_URL: &str = "https://example.supabase.co";
pub const PLACEHOLDER_SUPABASE_ANON_KEY: &str = "dummy-key-for-development";

const ENV_SUPABASE_URL: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const ENV_SUPABASE_ANON_KEY: [&str; 2] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];
const ENV_OPENAI_API_KEY: [&str; 2] = ["OPENAI_API_KEY", "NEXT_PUBLIC_OPENAI_API_KEY"];
const ENV_SITE_URL: [&str; 1] = ["REHEARSE_SITE_URL"];

/// Whether the client talks to a real backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Configured,
    /// Required secrets are missing; requests would hit placeholder endpoints.
    Mock,
}

/// Where a resolved value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Override,
    Environment,
    Placeholder,
    Unset,
}

/// Injected configuration document.
///
/// Mirrors the shape of the page-load config object:
/// `{ "supabase": { "url", "anonKey" }, "openai": { "apiKey" }, "siteUrl" }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default)]
    pub supabase: SupabaseOverrides,
    #[serde(default)]
    pub openai: OpenAiOverrides,
    #[serde(default)]
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SupabaseOverrides {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenAiOverrides {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ConfigOverrides {
    /// Parse an injected configuration document.
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::Configuration(format!("invalid config document: {error}")))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Configuration(format!(
                "failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }
}

/// Immutable, resolved configuration handed to every collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub openai_api_key: Option<String>,
    pub site_url: Option<String>,
    pub mode: ConnectionMode,
    pub sources: ConfigSources,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigSources {
    pub supabase_url: ConfigSource,
    pub supabase_anon_key: ConfigSource,
    pub openai_api_key: ConfigSource,
}

impl RuntimeConfig {
    /// Resolve configuration from overrides and the process environment.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let (url, url_source) = pick(overrides.supabase.url.clone(), &ENV_SUPABASE_URL, &lookup);
        let (anon_key, key_source) = pick(
            overrides.supabase.anon_key.clone(),
            &ENV_SUPABASE_ANON_KEY,
            &lookup,
        );
        let (openai_api_key, openai_source) =
            pick(overrides.openai.api_key.clone(), &ENV_OPENAI_API_KEY, &lookup);
        let (site_url, _) = pick(overrides.site_url.clone(), &ENV_SITE_URL, &lookup);

        let supabase_url = match url {
            Some(url) => normalize_http_url(&url, "Supabase URL")?,
            None => PLACEHOLDER_SUPABASE_URL.to_string(),
        };
        let site_url = site_url
            .map(|url| normalize_http_url(&url, "site URL"))
            .transpose()?;
        let supabase_anon_key =
            anon_key.unwrap_or_else(|| PLACEHOLDER_SUPABASE_ANON_KEY.to_string());

        let uses_placeholder = supabase_url == PLACEHOLDER_SUPABASE_URL
            || supabase_anon_key == PLACEHOLDER_SUPABASE_ANON_KEY;
        let mode = if uses_placeholder {
            ConnectionMode::Mock
        } else {
            ConnectionMode::Configured
        };
        let placeholder_or = |source: ConfigSource, value: &str, placeholder: &str| {
            if value == placeholder {
                ConfigSource::Placeholder
            } else {
                source
            }
        };

        let sources = ConfigSources {
            supabase_url: placeholder_or(url_source, &supabase_url, PLACEHOLDER_SUPABASE_URL),
            supabase_anon_key: placeholder_or(
                key_source,
                &supabase_anon_key,
                PLACEHOLDER_SUPABASE_ANON_KEY,
            ),
            openai_api_key: openai_source,
        };

        if mode == ConnectionMode::Mock {
            tracing::warn!("Supabase credentials are not configured; running in mock mode");
        }

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            openai_api_key,
            site_url,
            mode,
            sources,
        })
    }

    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.mode == ConnectionMode::Mock
    }

    /// Fail with a configuration error when running against placeholders.
    pub fn require_configured(&self) -> Result<()> {
        if self.is_mock() {
            return Err(Error::Configuration(
                "Supabase credentials are not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Masked, display-safe summary of the resolved values.
    #[must_use]
    pub fn describe(&self) -> ConfigReport {
        ConfigReport {
            mode: self.mode,
            supabase_url: self.supabase_url.clone(),
            supabase_url_source: self.sources.supabase_url,
            supabase_anon_key_preview: mask_secret(&self.supabase_anon_key),
            supabase_anon_key_source: self.sources.supabase_anon_key,
            openai_configured: self.openai_api_key.is_some(),
            openai_api_key_source: self.sources.openai_api_key,
            site_url: self.site_url.clone(),
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RuntimeConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("site_url", &self.site_url)
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    pub mode: ConnectionMode,
    pub supabase_url: String,
    pub supabase_url_source: ConfigSource,
    pub supabase_anon_key_preview: String,
    pub supabase_anon_key_source: ConfigSource,
    pub openai_configured: bool,
    pub openai_api_key_source: ConfigSource,
    pub site_url: Option<String>,
}

fn pick(
    explicit: Option<String>,
    env_keys: &[&str],
    lookup: &impl Fn(&str) -> Option<String>,
) -> (Option<String>, ConfigSource) {
    if let Some(value) = normalize_text_option(explicit) {
        return (Some(value), ConfigSource::Override);
    }
    env_keys
        .iter()
        .find_map(|key| normalize_text_option(lookup(key)))
        .map_or((None, ConfigSource::Unset), |value| {
            (Some(value), ConfigSource::Environment)
        })
}

fn normalize_http_url(raw: &str, label: &str) -> Result<String> {
    let value = raw.trim().trim_end_matches('/');
    if is_http_url(value) {
        Ok(value.to_string())
    } else {
        Err(Error::Configuration(format!(
            "{label} must include http:// or https://"
        )))
    }
}
