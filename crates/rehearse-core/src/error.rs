//! Error types for rehearse-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using rehearse-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rehearse-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or placeholder backend configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No signed-in identity, or the session expired
    #[error("{0}")]
    Unauthorized(String),

    /// Camera or microphone could not be opened or read
    #[error("Device error: {0}")]
    Device(String),

    /// A remote service rejected the request; carries the remote message
    #[error("{0}")]
    Remote(String),

    /// Invalid input or an unparseable payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Identity provider error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error classes used by front ends to decide how to present a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authorization,
    Device,
    Network,
    Validation,
}

impl Error {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Unauthorized(_) => ErrorCategory::Authorization,
            Self::Device(_) => ErrorCategory::Device,
            Self::InvalidInput(_) | Self::Serialization(_) => ErrorCategory::Validation,
            Self::Auth(error) => error.category(),
            Self::Remote(_) | Self::Http(_) | Self::Io(_) => ErrorCategory::Network,
        }
    }
}
