//! Error types for requests issued through a session.

use thiserror::Error;

/// Errors surfaced by a [`Session`](super::Session) request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The platform rejected the session credentials.
    ///
    /// Fatal for a run: nothing can continue without re-authentication.
    #[error(
        "[AUTH] session rejected (HTTP {status}) requesting {url}\n  Suggestion: export fresh cookies from a logged-in browser session"
    )]
    AuthExpired {
        /// The URL that was rejected.
        url: String,
        /// The HTTP status code (401, 403, or 0 for a login redirect).
        status: u16,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response other than an auth rejection.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl SessionError {
    /// Creates a network error from a reqwest error, separating timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an auth rejection error.
    pub fn auth_expired(url: impl Into<String>, status: u16) -> Self {
        Self::AuthExpired {
            url: url.into(),
            status,
        }
    }

    /// Returns true when the session itself was rejected.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}
