use std::fmt;

use crate::model::{MediaKey, SectionId};

/// Phase of a sync pass.
///
/// ```text
/// Idle -> EnumeratingSections -> LocatingMedia -> DiffingIndex
///      -> Downloading -> Committing -> (LocatingMedia | Done)
/// ```
///
/// `Done` and `Failed` are terminal. With more than one download in flight,
/// `Downloading`/`Committing` report the item that moved most recently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    EnumeratingSections,
    LocatingMedia(SectionId),
    DiffingIndex(SectionId),
    Downloading(MediaKey),
    Committing(MediaKey),
    Done,
    Failed,
}

impl SyncState {
    /// True for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::EnumeratingSections => f.write_str("enumerating sections"),
            Self::LocatingMedia(section) => write!(f, "locating media in {section}"),
            Self::DiffingIndex(section) => write!(f, "diffing index for {section}"),
            Self::Downloading(key) => write!(f, "downloading {key}"),
            Self::Committing(key) => write!(f, "committing {key}"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
