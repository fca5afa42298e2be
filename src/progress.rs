//! Progress bars for sync runs.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use lecture_backup::{ItemOutcome, MediaItem, MediaKey, SectionId, SyncObserver};
use tracing::debug;

const BAR_TEMPLATE: &str =
    "{msg:40!} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:40!} {bytes} ({bytes_per_sec})";

/// Shows one bar per transfer in flight plus a line per finished item.
pub(crate) struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<MediaKey, ProgressBar>>,
}

impl ProgressReporter {
    /// Draws to stderr when `visible`, otherwise renders nothing.
    pub(crate) fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn print_line(&self, line: &str) {
        if let Err(e) = self.multi.println(line) {
            debug!(error = %e, "progress output unavailable");
        }
    }

    fn take_bar(&self, key: &MediaKey) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl SyncObserver for ProgressReporter {
    fn on_section_located(&self, section: &SectionId, located: usize, missing: usize) {
        self.print_line(&format!(
            "section {section}: {located} recordings, {missing} to download"
        ));
    }

    fn on_transfer_start(&self, item: &MediaItem, expected: Option<u64>) {
        let bar = match expected {
            Some(total) => ProgressBar::new(total).with_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            ),
            None => ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            ),
        };
        let bar = self.multi.add(bar);
        bar.set_message(item.key.to_string());
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.key.clone(), bar);
    }

    fn on_transfer_progress(&self, item: &MediaItem, written: u64, _expected: Option<u64>) {
        if let Some(bar) = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&item.key)
        {
            bar.set_position(written);
        }
    }

    fn on_item_finished(&self, item: &MediaItem, outcome: &ItemOutcome) {
        if let Some(bar) = self.take_bar(&item.key) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        let line = match outcome {
            ItemOutcome::Committed { bytes } => format!("saved  {} ({bytes} bytes)", item.key),
            ItemOutcome::AlreadyPresent => return,
            ItemOutcome::Failed { reason } => format!("failed {}: {reason}", item.key),
        };
        self.print_line(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecture_backup::{Course, Lecture};
    use url::Url;

    fn item() -> MediaItem {
        MediaItem {
            key: MediaKey::new("m-1", "hd1.mp4"),
            section_id: SectionId::new("sec-1"),
            lecture: Lecture {
                id: "L-1".to_string(),
                name: None,
            },
            course: Course {
                id: "C-1".to_string(),
                name: "Course".to_string(),
                code: "C101".to_string(),
            },
            url: Url::parse("https://echo360.org.uk/media/download/m-1/hd1.mp4").unwrap(),
            expected_size: Some(10),
        }
    }

    #[test]
    fn test_progress_bar_lifecycle_hidden() {
        let reporter = ProgressReporter::new(false);
        let item = item();

        reporter.on_transfer_start(&item, Some(10));
        reporter.on_transfer_progress(&item, 4, Some(10));
        assert_eq!(
            reporter.bars.lock().unwrap().get(&item.key).unwrap().position(),
            4
        );

        reporter.on_item_finished(&item, &ItemOutcome::Committed { bytes: 10 });
        assert!(reporter.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_progress_lines_on_hidden_target_are_silent() {
        let reporter = ProgressReporter::new(false);
        let item = item();

        reporter.on_section_located(&item.section_id, 3, 1);
        reporter.on_item_finished(&item, &ItemOutcome::AlreadyPresent);
        reporter.on_item_finished(&item, &ItemOutcome::Committed { bytes: 10 });

        assert!(reporter.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_progress_unknown_size_uses_spinner() {
        let reporter = ProgressReporter::new(false);
        let item = item();

        reporter.on_transfer_start(&item, None);
        assert_eq!(
            reporter.bars.lock().unwrap().get(&item.key).unwrap().length(),
            None
        );
        reporter.on_item_finished(
            &item,
            &ItemOutcome::Failed {
                reason: "stream error".to_string(),
            },
        );
        assert!(reporter.bars.lock().unwrap().is_empty());
    }
}
