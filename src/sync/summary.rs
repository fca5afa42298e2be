use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::model::SectionId;

/// Running counters shared by concurrent download tasks.
#[derive(Debug, Default)]
pub(crate) struct SyncStats {
    committed: AtomicUsize,
    already_present: AtomicUsize,
    failed_items: AtomicUsize,
}

impl SyncStats {
    pub(crate) fn increment_committed(&self) {
        self.committed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_already_present(&self) {
        self.already_present.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed_items.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn summary(&self, skipped_sections: Vec<SkippedSection>) -> SyncSummary {
        SyncSummary {
            committed: self.committed.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            failed_items: self.failed_items.load(Ordering::SeqCst),
            skipped_sections,
        }
    }
}

/// A section whose media could not be listed this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSection {
    pub section: SectionId,
    pub reason: String,
}

/// Counts reported at the end of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Items downloaded and recorded this run.
    pub committed: usize,
    /// Items skipped because a record already existed.
    pub already_present: usize,
    /// Items whose transfer failed; they stay unindexed until a later run.
    pub failed_items: usize,
    /// Sections that could not be listed, with the reason.
    pub skipped_sections: Vec<SkippedSection>,
}

impl SyncSummary {
    #[must_use]
    pub fn sections_skipped(&self) -> usize {
        self.skipped_sections.len()
    }

    /// True when every located item ended up indexed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_items == 0 && self.skipped_sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_summary_snapshot() {
        let stats = SyncStats::default();
        stats.increment_committed();
        stats.increment_committed();
        stats.increment_already_present();
        stats.increment_failed();

        let summary = stats.summary(vec![SkippedSection {
            section: SectionId::new("sec-2"),
            reason: "bad json".to_string(),
        }]);

        assert_eq!(summary.committed, 2);
        assert_eq!(summary.already_present, 1);
        assert_eq!(summary.failed_items, 1);
        assert_eq!(summary.sections_skipped(), 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_default_summary_is_clean() {
        assert!(SyncSummary::default().is_clean());
    }
}
