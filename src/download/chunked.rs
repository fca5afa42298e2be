//! Chunked transfer of one media item into a temporary file, then rename.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::DownloadError;
use crate::model::MediaItem;
use crate::session::{RetryPolicy, Session, with_retry};

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Final destination the file was renamed to.
    pub path: PathBuf,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Number of chunk writes performed.
    pub chunks: u64,
    /// True once the file was verified and renamed into place.
    pub completed: bool,
}

/// Receives progress callbacks while a transfer runs.
pub trait TransferObserver: Send + Sync {
    /// Called once the response headers arrived.
    fn on_start(&self, _item: &MediaItem, _expected: Option<u64>) {}

    /// Called after every chunk write with the running total.
    fn on_chunk(&self, _item: &MediaItem, _written: u64, _expected: Option<u64>) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Downloads media items in bounded-size chunks.
///
/// Bytes go to a uniquely named temporary file next to the destination
/// (`.<file_name>.<uuid>.part`). Only a transfer whose size matches the
/// expected size is renamed into place, so the destination never holds a
/// partial file. A failed transfer leaves its temporary file behind.
#[derive(Debug, Clone, Default)]
pub struct ChunkedDownloader {
    retry_policy: RetryPolicy,
}

impl ChunkedDownloader {
    #[must_use]
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    /// Transfers `item` to `destination` writing at most `chunk_size` bytes at a time.
    ///
    /// # Errors
    ///
    /// See [`download_observed`](Self::download_observed).
    pub async fn download(
        &self,
        session: &dyn Session,
        item: &MediaItem,
        destination: &Path,
        chunk_size: usize,
    ) -> Result<DownloadResult, DownloadError> {
        self.download_observed(session, item, destination, chunk_size, &NoopObserver)
            .await
    }

    /// Same as [`download`](Self::download), reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Configuration`] if `chunk_size` is zero or the
    ///   destination has no file name; no request is made.
    /// - [`DownloadError::Request`] if the request cannot be opened.
    /// - [`DownloadError::Incomplete`] for any failure after the request
    ///   opened, including a size mismatch.
    #[instrument(skip(self, session, item, observer), fields(key = %item.key, dest = %destination.display()))]
    pub async fn download_observed(
        &self,
        session: &dyn Session,
        item: &MediaItem,
        destination: &Path,
        chunk_size: usize,
        observer: &dyn TransferObserver,
    ) -> Result<DownloadResult, DownloadError> {
        if chunk_size == 0 {
            return Err(DownloadError::configuration(
                "chunk_size must be greater than 0",
            ));
        }
        let (Some(parent), Some(file_name)) = (destination.parent(), destination.file_name())
        else {
            return Err(DownloadError::configuration(format!(
                "destination {} has no file name",
                destination.display()
            )));
        };
        let temp_path = parent.join(format!(
            ".{}.{}.part",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let url = &item.url;
        let response = with_retry(&self.retry_policy, url.as_str(), || async move {
            session.get(url).await
        })
        .await?;

        let expected = item.expected_size.or_else(|| response.content_length());
        observer.on_start(item, expected);
        let incomplete = |written: u64, reason: String| {
            DownloadError::incomplete(&temp_path, written, expected, reason)
        };

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| incomplete(0, format!("cannot create {}: {e}", parent.display())))?;
        let mut file = File::create(&temp_path)
            .await
            .map_err(|e| incomplete(0, format!("cannot create temporary file: {e}")))?;
        debug!(temp = %temp_path.display(), ?expected, "transfer started");

        let mut written: u64 = 0;
        let mut chunks: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(next) = stream.next().await {
            let bytes = next.map_err(|e| incomplete(written, format!("stream error: {e}")))?;
            for slice in bytes.chunks(chunk_size) {
                file.write_all(slice)
                    .await
                    .map_err(|e| incomplete(written, format!("write error: {e}")))?;
                written += slice.len() as u64;
                chunks += 1;
                observer.on_chunk(item, written, expected);
            }
        }

        file.flush()
            .await
            .map_err(|e| incomplete(written, format!("flush error: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| incomplete(written, format!("sync error: {e}")))?;
        drop(file);

        if let Some(expected_bytes) = expected
            && expected_bytes != written
        {
            return Err(incomplete(
                written,
                format!("size mismatch: expected {expected_bytes} bytes, received {written}"),
            ));
        }

        tokio::fs::rename(&temp_path, destination)
            .await
            .map_err(|e| incomplete(written, format!("rename failed: {e}")))?;

        info!(bytes = written, chunks, "download complete");
        Ok(DownloadResult {
            path: destination.to_path_buf(),
            bytes_written: written,
            chunks,
            completed: true,
        })
    }
}
