//! JSON shapes returned by the Echo360 section and media endpoints.
//!
//! Only the fields the locator reads are declared; every declared field is
//! required unless it is an `Option`.

use std::collections::HashMap;

use serde::Deserialize;

/// Status value of a successful response envelope.
pub(crate) const STATUS_OK: &str = "ok";

/// Common `{"status": .., "data": [..]}` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub status: String,
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyllabusEntry {
    pub lesson: SyllabusLesson,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyllabusLesson {
    pub lesson: LessonRef,
    #[serde(default)]
    pub medias: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaDetails {
    pub media: PublishedMedia,
    pub courses_by_id: HashMap<String, CourseEntry>,
    pub lessons_by_id: HashMap<String, LessonEntry>,
    pub details: FileDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishedMedia {
    pub published_course_ids: Vec<String>,
    #[serde(default)]
    pub published_lesson_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseEntry {
    pub name: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonEntry {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileDetails {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub is_processed_file: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_syllabus_deserialize_ignores_unknown_fields() {
        let json = serde_json::json!({
            "status": "ok",
            "message": "",
            "data": [{
                "type": "SyllabusLessonType",
                "lesson": {
                    "lesson": {"id": "L-1", "name": "Week 1", "displayName": "W1"},
                    "medias": [{"id": "M-1", "mediaType": "Video"}]
                }
            }]
        });

        let syllabus: Envelope<SyllabusEntry> = serde_json::from_value(json).unwrap();

        assert_eq!(syllabus.status, "ok");
        assert_eq!(syllabus.data[0].lesson.lesson.id, "L-1");
        assert_eq!(syllabus.data[0].lesson.medias[0].id, "M-1");
    }

    #[test]
    fn test_syllabus_lesson_without_medias() {
        let json = serde_json::json!({
            "status": "ok",
            "data": [{"lesson": {"lesson": {"id": "L-2"}}}]
        });

        let syllabus: Envelope<SyllabusEntry> = serde_json::from_value(json).unwrap();

        assert!(syllabus.data[0].lesson.medias.is_empty());
        assert!(syllabus.data[0].lesson.lesson.name.is_none());
    }

    #[test]
    fn test_media_details_deserialize_full() {
        let json = serde_json::json!({
            "media": {
                "publishedCourseIds": ["C-1"],
                "publishedSectionIds": ["S-1"],
                "publishedLessonIds": ["L-1"]
            },
            "coursesById": {"C-1": {"name": "Algorithms", "identifier": "COMP2001"}},
            "lessonsById": {"L-1": {"name": "Week 1"}},
            "details": {"files": [
                {"name": "hd1.mp4", "fileSize": 10000, "isProcessedFile": true},
                {"name": "raw.mov", "isProcessedFile": false}
            ]}
        });

        let details: MediaDetails = serde_json::from_value(json).unwrap();

        assert_eq!(details.media.published_course_ids, vec!["C-1"]);
        assert_eq!(details.courses_by_id["C-1"].identifier, "COMP2001");
        assert_eq!(details.details.files[0].file_size, Some(10000));
        assert!(!details.details.files[1].is_processed_file);
    }

    #[test]
    fn test_media_details_missing_files_is_error() {
        let json = serde_json::json!({
            "media": {"publishedCourseIds": ["C-1"]},
            "coursesById": {},
            "lessonsById": {},
            "details": {}
        });

        assert!(serde_json::from_value::<MediaDetails>(json).is_err());
    }
}
