//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur while transferring one media file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The downloader was called with unusable parameters.
    ///
    /// Raised before any network call is made.
    #[error("invalid download configuration: {reason}")]
    Configuration {
        /// What was wrong.
        reason: String,
    },

    /// The request could not be opened (after retries), or the session was rejected.
    #[error(transparent)]
    Request(#[from] SessionError),

    /// The transfer started but did not produce a complete file.
    ///
    /// The temporary file is left at `temp_path`; the destination is untouched.
    #[error(
        "incomplete transfer into {temp_path}: {bytes_written} bytes written{}: {reason}",
        .expected.map(|e| format!(" of {e}")).unwrap_or_default()
    )]
    Incomplete {
        /// Temporary file holding the partial data.
        temp_path: PathBuf,
        /// Bytes written before the failure.
        bytes_written: u64,
        /// Expected total size, when known.
        expected: Option<u64>,
        /// What interrupted the transfer.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates an incomplete-transfer error.
    pub fn incomplete(
        temp_path: impl Into<PathBuf>,
        bytes_written: u64,
        expected: Option<u64>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Incomplete {
            temp_path: temp_path.into(),
            bytes_written,
            expected,
            reason: reason.into(),
        }
    }
}
