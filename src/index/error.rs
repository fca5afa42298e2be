//! Error types for index operations.

use std::fmt;

use thiserror::Error;

use crate::model::MediaKey;

/// Structured classification for index/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure other than the record key (foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Stored row could not be decoded.
    Decode,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl StorageErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Decode => "decode",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StorageErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StorageErrorKind::BusyOrLocked;
    }

    if database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StorageErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database table is locked") {
        return StorageErrorKind::BusyOrLocked;
    }

    StorageErrorKind::Other
}

/// Errors that can occur during index operations.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// A record already exists for this key.
    ///
    /// Another pass or a concurrent writer completed the item first; callers
    /// treat this as already done.
    #[error("media {0} is already recorded in the index")]
    Duplicate(MediaKey),

    /// The underlying store failed; index integrity can no longer be assumed.
    #[error("index storage error ({kind}): {message}")]
    Storage {
        /// Typed classification used for diagnostics.
        kind: StorageErrorKind,
        /// Human-readable database error text.
        message: String,
    },
}

impl From<sqlx::Error> for IndexError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage {
            kind: StorageErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl IndexError {
    /// Maps an insert failure, turning a key collision into [`IndexError::Duplicate`].
    pub(crate) fn from_insert(err: sqlx::Error, key: &MediaKey) -> Self {
        if let sqlx::Error::Database(database_error) = &err
            && database_error.is_unique_violation()
        {
            return Self::Duplicate(key.clone());
        }
        Self::from(err)
    }

    /// Returns true for the benign duplicate-key outcome.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Returns the storage classification, when this is a storage error.
    #[must_use]
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            Self::Storage { kind, .. } => Some(*kind),
            Self::Duplicate(_) => None,
        }
    }
}
