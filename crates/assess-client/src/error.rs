//! Error types for the HTTP backend client.

use assess_session::{BackendError, BackendErrorKind};

/// Errors that can occur while constructing or probing the HTTP client.
///
/// Request failures during a session are reported as [`BackendError`] so the
/// session controller can classify them; `ClientError` covers setup.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configured base URL is unusable.
    #[error("Invalid API base URL '{url}': {message}")]
    InvalidBaseUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// The underlying HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    /// A request to the backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ClientError {
    /// Creates a new `InvalidBaseUrl` error.
    #[must_use]
    pub fn invalid_base_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns the backend failure category, if this is a request failure.
    #[must_use]
    pub const fn backend_kind(&self) -> Option<BackendErrorKind> {
        match self {
            Self::Backend(e) => Some(e.kind),
            Self::InvalidBaseUrl { .. } | Self::Build(_) => None,
        }
    }
}
