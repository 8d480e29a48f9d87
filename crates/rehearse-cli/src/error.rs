use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rehearse_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("You must be signed in to open {0}. Run `rehearse login` first.")]
    SignInRequired(String),
    #[error(
        "Supabase is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY, or run `rehearse setup` for guidance."
    )]
    NotConfigured,
    #[error("Timed out waiting for authentication. Run `rehearse setup` for guidance.")]
    AuthTimedOut,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Cancelled")]
    Cancelled,
}

impl From<rehearse_core::auth::AuthError> for CliError {
    fn from(error: rehearse_core::auth::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
