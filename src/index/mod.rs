//! Durable index of completed downloads.
//!
//! The index is the only state that survives a run. A record is written in
//! exactly one transaction, after the downloader renamed a verified file into
//! place, so a reader either sees the complete record or nothing.
//!
//! # Example
//!
//! ```ignore
//! use lecture_backup::index::{IndexStore, NewIndexRecord};
//! use lecture_backup::Database;
//!
//! let store = IndexStore::new(Database::new(path).await?);
//! if !store.has(&key).await? {
//!     // ... download ...
//!     store.commit(&NewIndexRecord::now(&key, "l-1", &dest, size)).await?;
//! }
//! ```

mod error;
mod record;

pub use error::{IndexError, StorageErrorKind};
pub use record::IndexRecord;

use std::path::Path;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::model::{Course, Lecture, MediaKey};
use record::IndexRecordRow;

/// Fields of a record about to be committed.
#[derive(Debug, Clone)]
pub struct NewIndexRecord<'a> {
    pub key: &'a MediaKey,
    pub lecture_id: &'a str,
    pub path: &'a Path,
    pub size: u64,
    pub downloaded_at: DateTime<Utc>,
}

impl<'a> NewIndexRecord<'a> {
    /// Builds a record stamped with the current time.
    #[must_use]
    pub fn now(key: &'a MediaKey, lecture_id: &'a str, path: &'a Path, size: u64) -> Self {
        Self {
            key,
            lecture_id,
            path,
            size,
            downloaded_at: Utc::now(),
        }
    }
}

/// Index store backed by `SQLite`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    db: Database,
}

impl IndexStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns true iff a committed record exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Storage`] if the query fails.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn has(&self, key: &MediaKey) -> Result<bool, IndexError> {
        let (exists,): (bool,) = sqlx::query_as(
            r"SELECT EXISTS (
                SELECT 1 FROM media_index WHERE media_id = ? AND file_name = ?
              )",
        )
        .bind(&key.media_id)
        .bind(&key.file_name)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    /// Atomically inserts one record.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Duplicate`] if a record already exists for the key,
    /// or [`IndexError::Storage`] if the transaction fails.
    #[instrument(skip(self, record), fields(key = %record.key, size = record.size))]
    pub async fn commit(&self, record: &NewIndexRecord<'_>) -> Result<(), IndexError> {
        let size = i64::try_from(record.size).map_err(|_| IndexError::Storage {
            kind: StorageErrorKind::ConstraintViolation,
            message: format!("size {} does not fit in an INTEGER column", record.size),
        })?;

        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO media_index (media_id, file_name, lecture_id, path, size, downloaded_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.key.media_id)
        .bind(&record.key.file_name)
        .bind(record.lecture_id)
        .bind(record.path.to_string_lossy().as_ref())
        .bind(size)
        .bind(record.downloaded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| IndexError::from_insert(e, record.key))?;

        tx.commit().await?;

        debug!("index record committed");
        Ok(())
    }

    /// Streams every record, oldest download first.
    ///
    /// The stream is lazy; calling again restarts from the beginning.
    pub fn list_all(&self) -> impl Stream<Item = Result<IndexRecord, IndexError>> + Send + '_ {
        sqlx::query_as::<_, IndexRecordRow>(
            r"SELECT media_id, file_name, lecture_id, path, size, downloaded_at
              FROM media_index
              ORDER BY downloaded_at ASC, media_id ASC, file_name ASC",
        )
        .fetch(self.db.pool())
        .map(|row| row.map(IndexRecord::from).map_err(IndexError::from))
    }

    /// Number of committed records.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<u64, IndexError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_index")
            .fetch_one(self.db.pool())
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Upserts the descriptive course and lecture rows for a media item.
    ///
    /// Metadata only: dedup never consults these tables.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Storage`] if the transaction fails.
    #[instrument(skip(self, course, lecture), fields(course_id = %course.id, lecture_id = %lecture.id))]
    pub async fn record_lecture(&self, course: &Course, lecture: &Lecture) -> Result<(), IndexError> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO course (id, name, code) VALUES (?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                code = excluded.code,
                updated_at = datetime('now')",
        )
        .bind(&course.id)
        .bind(&course.name)
        .bind(&course.code)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO lecture (id, name, course_id) VALUES (?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                course_id = excluded.course_id,
                updated_at = datetime('now')",
        )
        .bind(&lecture.id)
        .bind(lecture.name.as_deref())
        .bind(&course.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
