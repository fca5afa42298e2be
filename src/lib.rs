//! Lecture Backup Library
//!
//! Incremental, idempotent backup of lecture recordings published on an
//! Echo360 platform. Each run lists the media of the configured course
//! sections, downloads whatever the local index does not record yet, and
//! commits every verified file to the index.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`index`] - Durable record of completed downloads
//! - [`session`] - Authenticated session capability, cookies and retry
//! - [`locator`] - Discovery of a section's downloadable media
//! - [`download`] - Chunked transfer with temporary file and rename
//! - [`sync`] - The engine tying the above together
//! - [`config`] - TOML run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod download;
pub mod index;
pub mod locator;
pub mod model;
pub mod session;
pub mod sync;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use db::{Database, DbError};
pub use download::{ChunkedDownloader, DownloadError, DownloadResult, TransferObserver};
pub use index::{IndexError, IndexRecord, IndexStore, NewIndexRecord};
pub use locator::{EchoLocator, LocateError, MediaLocator};
pub use model::{Course, Lecture, MediaItem, MediaKey, SectionId};
pub use session::{HttpSession, HttpSessionOptions, RetryPolicy, Session, SessionError};
pub use sync::{
    ItemOutcome, SkippedSection, SyncEngine, SyncError, SyncObserver, SyncOptions, SyncState,
    SyncSummary,
};
