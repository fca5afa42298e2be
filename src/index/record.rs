//! Persisted index record type.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::model::MediaKey;

/// Durable proof that a media file was fully downloaded.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IndexRecordRow {
    pub media_id: String,
    pub file_name: String,
    pub lecture_id: String,
    pub path: String,
    pub size: i64,
    pub downloaded_at: DateTime<Utc>,
}

/// An index record as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    pub media_id: String,
    pub file_name: String,
    pub lecture_id: String,
    pub path: PathBuf,
    pub size: u64,
    pub downloaded_at: DateTime<Utc>,
}

impl IndexRecord {
    /// Dedup key of the recorded file.
    #[must_use]
    pub fn key(&self) -> MediaKey {
        MediaKey::new(self.media_id.clone(), self.file_name.clone())
    }
}

impl From<IndexRecordRow> for IndexRecord {
    fn from(row: IndexRecordRow) -> Self {
        Self {
            media_id: row.media_id,
            file_name: row.file_name,
            lecture_id: row.lecture_id,
            path: PathBuf::from(row.path),
            // CHECK (size >= 0) in the schema
            size: u64::try_from(row.size).unwrap_or_default(),
            downloaded_at: row.downloaded_at,
        }
    }
}
