//! Sync engine: reconciles what the platform offers with what the index holds.
//!
//! # Overview
//!
//! For each configured section, in order, the engine asks the
//! [`MediaLocator`] for the section's media, drops every item the
//! [`IndexStore`] already records, downloads the rest with the
//! [`ChunkedDownloader`] and commits each verified file to the index.
//!
//! # Failure containment
//!
//! - A section that cannot be listed (bad response, unreachable after
//!   retries) is skipped and reported; the remaining sections still run.
//! - A failed transfer is counted and left unindexed; the next run retries it.
//! - A rejected session, an index storage failure or invalid configuration
//!   ends the run with [`SyncError`]; outstanding downloads are aborted.
//!
//! # Concurrency Model
//!
//! - Sections are processed one after another
//! - Within a section each download runs in its own Tokio task
//! - A semaphore permit bounds the number of transfers in flight
//! - The index commit is the single linearization point: a racing commit
//!   for the same key returns `Duplicate` and is counted as already present

mod state;
mod summary;

pub use state::SyncState;
pub use summary::{SkippedSection, SyncSummary};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::download::{ChunkedDownloader, DownloadError, TransferObserver};
use crate::index::{IndexError, IndexStore, NewIndexRecord};
use crate::locator::{LocateError, MediaLocator};
use crate::model::{MediaItem, SectionId};
use crate::session::{Session, SessionError};
use summary::SyncStats;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Default number of simultaneous downloads.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Errors that end a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The platform rejected the session; nothing else can succeed this run.
    #[error(transparent)]
    AuthExpired(SessionError),

    /// The index could not be read or written.
    #[error("index storage failed: {0}")]
    Storage(#[from] IndexError),

    /// The engine or downloader was given unusable parameters.
    #[error("invalid sync configuration: {0}")]
    Configuration(String),
}

/// Parameters of a sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Root directory for downloaded media.
    pub media_path: PathBuf,
    /// Maximum bytes written per chunk.
    pub chunk_size: usize,
    /// Maximum simultaneous downloads (1-16).
    pub concurrency: usize,
}

impl SyncOptions {
    /// Options with the default concurrency.
    #[must_use]
    pub fn new(media_path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            media_path: media_path.into(),
            chunk_size,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Final outcome of one media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Downloaded and recorded in the index.
    Committed { bytes: u64 },
    /// Already recorded; nothing was transferred or written.
    AlreadyPresent,
    /// The transfer failed; the item stays unindexed.
    Failed { reason: String },
}

/// Receives progress events from a running pass. All methods default to no-ops.
pub trait SyncObserver: Send + Sync {
    /// A section was listed; `missing` items will be downloaded.
    fn on_section_located(&self, _section: &SectionId, _located: usize, _missing: usize) {}

    /// A transfer opened its request.
    fn on_transfer_start(&self, _item: &MediaItem, _expected: Option<u64>) {}

    /// A chunk was written.
    fn on_transfer_progress(&self, _item: &MediaItem, _written: u64, _expected: Option<u64>) {}

    /// An item reached its final outcome for this run.
    fn on_item_finished(&self, _item: &MediaItem, _outcome: &ItemOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl SyncObserver for SilentObserver {}

/// Forwards downloader progress to a [`SyncObserver`].
struct TransferProgress<'a>(&'a dyn SyncObserver);

impl TransferObserver for TransferProgress<'_> {
    fn on_start(&self, item: &MediaItem, expected: Option<u64>) {
        self.0.on_transfer_start(item, expected);
    }

    fn on_chunk(&self, item: &MediaItem, written: u64, expected: Option<u64>) {
        self.0.on_transfer_progress(item, written, expected);
    }
}

/// State shared with download tasks.
struct Shared {
    session: Arc<dyn Session>,
    downloader: ChunkedDownloader,
    index: IndexStore,
    options: SyncOptions,
    observer: Arc<dyn SyncObserver>,
    state: Mutex<SyncState>,
}

impl Shared {
    fn set_state(&self, next: SyncState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *state, next);
        debug!(from = %previous, to = %state, "sync state transition");
    }

    /// Downloads and commits one item. Only run-ending failures are returned.
    async fn process_item(&self, item: &MediaItem, stats: &SyncStats) -> Result<(), SyncError> {
        self.set_state(SyncState::Downloading(item.key.clone()));
        let destination = self.options.media_path.join(item.relative_path());

        let download = self
            .downloader
            .download_observed(
                self.session.as_ref(),
                item,
                &destination,
                self.options.chunk_size,
                &TransferProgress(self.observer.as_ref()),
            )
            .await;

        let result = match download {
            Ok(result) => result,
            Err(DownloadError::Request(e)) if e.is_auth_expired() => {
                return Err(SyncError::AuthExpired(e));
            }
            Err(DownloadError::Configuration { reason }) => {
                return Err(SyncError::Configuration(reason));
            }
            Err(e) => {
                warn!(key = %item.key, error = %e, "download failed, will retry next run");
                stats.increment_failed();
                self.observer.on_item_finished(
                    item,
                    &ItemOutcome::Failed {
                        reason: e.to_string(),
                    },
                );
                return Ok(());
            }
        };

        self.set_state(SyncState::Committing(item.key.clone()));
        let record = NewIndexRecord::now(
            &item.key,
            &item.lecture.id,
            &result.path,
            result.bytes_written,
        );
        match self.index.commit(&record).await {
            Ok(()) => {
                info!(key = %item.key, path = %result.path.display(), bytes = result.bytes_written, "committed");
                stats.increment_committed();
                self.observer.on_item_finished(
                    item,
                    &ItemOutcome::Committed {
                        bytes: result.bytes_written,
                    },
                );
                Ok(())
            }
            Err(e) if e.is_duplicate() => {
                debug!(key = %item.key, "committed concurrently by another writer");
                stats.increment_already_present();
                self.observer
                    .on_item_finished(item, &ItemOutcome::AlreadyPresent);
                Ok(())
            }
            Err(e) => {
                warn!(key = %item.key, kind = ?e.storage_kind(), "index commit failed");
                Err(SyncError::Storage(e))
            }
        }
    }
}

/// Orchestrates one sync pass over the configured sections.
pub struct SyncEngine {
    shared: Arc<Shared>,
    locator: Arc<dyn MediaLocator>,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine in the `Idle` state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if `chunk_size` is zero or
    /// `concurrency` is outside 1-16.
    #[instrument(level = "debug", skip_all, fields(media_path = %options.media_path.display()))]
    pub fn new(
        session: Arc<dyn Session>,
        locator: Arc<dyn MediaLocator>,
        downloader: ChunkedDownloader,
        index: IndexStore,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        if options.chunk_size == 0 {
            return Err(SyncError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(SyncError::Configuration(format!(
                "concurrency {} must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}",
                options.concurrency
            )));
        }

        debug!(
            chunk_size = options.chunk_size,
            concurrency = options.concurrency,
            "creating sync engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(options.concurrency)),
            shared: Arc::new(Shared {
                session,
                downloader,
                index,
                options,
                observer: Arc::new(SilentObserver),
                state: Mutex::new(SyncState::Idle),
            }),
            locator,
        })
    }

    /// Replaces the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.observer = observer;
        }
        self
    }

    /// Current phase of the engine.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs one pass over `sections` in the given order.
    ///
    /// The engine ends in [`SyncState::Done`] on `Ok` and
    /// [`SyncState::Failed`] on `Err`. A pass can start only from `Idle` or
    /// a terminal state.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Configuration`] when a pass is already in progress;
    ///   the running pass is not affected
    /// - [`SyncError::AuthExpired`] when the platform rejected the session
    /// - [`SyncError::Storage`] when the index cannot be read or written
    /// - [`SyncError::Configuration`] when the downloader rejects its parameters
    #[instrument(skip_all, fields(sections = sections.len()))]
    pub async fn run(&self, sections: &[SectionId]) -> Result<SyncSummary, SyncError> {
        let current = self.state();
        if current != SyncState::Idle && !current.is_terminal() {
            return Err(SyncError::Configuration(format!(
                "a sync pass is already in progress ({current})"
            )));
        }

        let outcome = self.run_sections(sections).await;
        match &outcome {
            Ok(summary) => {
                info!(
                    committed = summary.committed,
                    already_present = summary.already_present,
                    failed_items = summary.failed_items,
                    sections_skipped = summary.sections_skipped(),
                    "sync complete"
                );
                self.shared.set_state(SyncState::Done);
            }
            Err(e) => {
                warn!(error = %e, "sync failed");
                self.shared.set_state(SyncState::Failed);
            }
        }
        outcome
    }

    async fn run_sections(&self, sections: &[SectionId]) -> Result<SyncSummary, SyncError> {
        self.shared.set_state(SyncState::EnumeratingSections);
        let stats = Arc::new(SyncStats::default());
        let mut skipped = Vec::new();

        for section in sections {
            self.shared
                .set_state(SyncState::LocatingMedia(section.clone()));
            let items = match self
                .locator
                .list_media(self.shared.session.as_ref(), section)
                .await
            {
                Ok(items) => items,
                Err(LocateError::Request(e)) if e.is_auth_expired() => {
                    return Err(SyncError::AuthExpired(e));
                }
                Err(e) => {
                    warn!(%section, error = %e, "skipping section");
                    skipped.push(SkippedSection {
                        section: section.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            self.shared
                .set_state(SyncState::DiffingIndex(section.clone()));
            let located = items.len();
            let missing = self.diff(items, &stats).await?;
            info!(%section, located, missing = missing.len(), "section diffed");
            self.shared
                .observer
                .on_section_located(section, located, missing.len());

            self.download_missing(missing, &stats).await?;
        }

        Ok(stats.summary(skipped))
    }

    /// Returns the items of `items` that have no index record, once per key.
    async fn diff(
        &self,
        items: Vec<MediaItem>,
        stats: &SyncStats,
    ) -> Result<Vec<MediaItem>, SyncError> {
        let index = &self.shared.index;
        let mut seen_keys = HashSet::new();
        let mut seen_lectures = HashSet::new();
        let mut missing = Vec::new();

        for item in items {
            if !seen_keys.insert(item.key.clone()) {
                debug!(key = %item.key, "duplicate key in listing");
                continue;
            }
            if seen_lectures.insert((item.course.id.clone(), item.lecture.id.clone())) {
                index.record_lecture(&item.course, &item.lecture).await?;
            }
            if index.has(&item.key).await? {
                debug!(key = %item.key, "already indexed");
                stats.increment_already_present();
                self.shared
                    .observer
                    .on_item_finished(&item, &ItemOutcome::AlreadyPresent);
                continue;
            }
            missing.push(item);
        }

        Ok(missing)
    }

    async fn download_missing(
        &self,
        missing: Vec<MediaItem>,
        stats: &Arc<SyncStats>,
    ) -> Result<(), SyncError> {
        let mut tasks = JoinSet::new();
        for item in missing {
            let shared = Arc::clone(&self.shared);
            let semaphore = Arc::clone(&self.semaphore);
            let stats = Arc::clone(stats);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::Configuration("download slots closed".to_string()))?;
                shared.process_item(&item, &stats).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(fatal)) => {
                    debug!(outstanding = tasks.len(), "aborting outstanding downloads");
                    tasks.abort_all();
                    return Err(fatal);
                }
                Err(join_error) => {
                    warn!(error = %join_error, "download task panicked");
                    stats.increment_failed();
                }
            }
        }
        Ok(())
    }
}
