//! Streaming media transfer to disk.
//!
//! # Features
//!
//! - Bounded-size chunk writes (memory use independent of file size)
//! - Temporary file per writer, renamed into place only after size verification
//! - Retry with backoff when opening the request
//! - Progress callbacks through [`TransferObserver`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use lecture_backup::download::ChunkedDownloader;
//! use lecture_backup::model::MediaItem;
//! use lecture_backup::session::Session;
//!
//! # async fn example(session: &dyn Session, item: &MediaItem) -> Result<(), Box<dyn std::error::Error>> {
//! let result = ChunkedDownloader::default()
//!     .download(session, item, Path::new("./media/hd1.mp4"), 1 << 20)
//!     .await?;
//! println!("wrote {} bytes", result.bytes_written);
//! # Ok(())
//! # }
//! ```

mod chunked;
mod error;

pub use chunked::{ChunkedDownloader, DownloadResult, NoopObserver, TransferObserver};
pub use error::DownloadError;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
