//! Domain types shared by the locator, downloader, index and sync engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// Operator-configured course section handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Wraps a section handle as configured.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Course metadata reported alongside each media object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// Platform course id.
    pub id: String,
    /// Human-readable course name.
    pub name: String,
    /// Course code, e.g. `COMP1001`.
    pub code: String,
}

/// A remote grouping of media recordings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lecture {
    /// Platform lesson id.
    pub id: String,
    /// Lesson title, when the platform provides one.
    pub name: Option<String>,
}

/// Dedup key of a downloadable file: a media object plus one of its files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaKey {
    /// Platform media id.
    pub media_id: String,
    /// File name within the media object.
    pub file_name: String,
}

impl MediaKey {
    #[must_use]
    pub fn new(media_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_id, self.file_name)
    }
}

/// One downloadable asset discovered by a media locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Dedup key.
    pub key: MediaKey,
    /// Section the item was discovered through.
    pub section_id: SectionId,
    /// Parent lecture.
    pub lecture: Lecture,
    /// Owning course.
    pub course: Course,
    /// Absolute download URL.
    pub url: Url,
    /// Size reported by the platform, if any.
    pub expected_size: Option<u64>,
}

impl MediaItem {
    /// Stable destination relative to the media root:
    /// `<course_id>/<lecture_id>/<media_id>/<file_name>`.
    ///
    /// Every component goes through [`sanitize_component`], so distinct
    /// remote identifiers always map to distinct paths inside the media root.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        [
            sanitize_component(&self.course.id),
            sanitize_component(&self.lecture.id),
            sanitize_component(&self.key.media_id),
            sanitize_component(&self.key.file_name),
        ]
        .iter()
        .collect()
    }
}

/// Percent-escapes characters that are invalid on common filesystems.
///
/// `%` itself is escaped, so the mapping is injective. `""`, `.`, `..` and
/// all-space names get escaped forms that no other name produces.
pub(crate) fn sanitize_component(name: &str) -> String {
    match name {
        "" => return "%".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }

    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        let reserved = matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
        if reserved || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                sanitized.push_str(&format!("%{byte:02X}"));
            }
        } else {
            sanitized.push(c);
        }
    }

    if sanitized.chars().all(|c| c == ' ') {
        return sanitized.replace(' ', "%20");
    }
    sanitized
}
