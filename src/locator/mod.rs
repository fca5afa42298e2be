//! Discovery of the media files a course section offers.
//!
//! - [`MediaLocator`] - Async trait: section in, downloadable [`MediaItem`]s out
//! - [`EchoLocator`] - Echo360 implementation (syllabus + per-media details)
//! - [`LocateError`] - Request failures and undecodable platform responses

mod wire;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::model::{Course, Lecture, MediaItem, MediaKey, SectionId};
use crate::session::{RetryPolicy, Session, SessionError, endpoint, with_retry};

use wire::{Envelope, LessonRef, MediaDetails, STATUS_OK, SyllabusEntry};

/// Errors produced while listing a section's media.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The request failed after retries, or the session was rejected.
    #[error(transparent)]
    Request(#[from] SessionError),

    /// The platform answered, but not with the shape the locator expects.
    #[error("unexpected response from {url}: {reason}")]
    RemoteFormat {
        /// The URL whose response could not be used.
        url: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl LocateError {
    fn remote_format(url: &Url, reason: impl Into<String>) -> Self {
        Self::RemoteFormat {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Produces the media items available remotely for a section.
#[async_trait]
pub trait MediaLocator: Send + Sync {
    /// Lists every downloadable item of `section`.
    ///
    /// # Errors
    ///
    /// [`LocateError::Request`] when the platform cannot be reached or the
    /// session was rejected, [`LocateError::RemoteFormat`] when a response
    /// does not decode.
    async fn list_media(
        &self,
        session: &dyn Session,
        section: &SectionId,
    ) -> Result<Vec<MediaItem>, LocateError>;
}

/// Locator for the Echo360 platform.
///
/// Reads the section syllabus, then the details of every media object it
/// references. Each processed file of a media object becomes one item.
#[derive(Debug, Clone, Default)]
pub struct EchoLocator {
    retry_policy: RetryPolicy,
}

impl EchoLocator {
    #[must_use]
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        session: &dyn Session,
        url: &Url,
    ) -> Result<Vec<T>, LocateError> {
        let body = with_retry(&self.retry_policy, url.as_str(), || async move {
            let response = session.get(url).await?;
            response
                .bytes()
                .await
                .map_err(|e| SessionError::network(url.as_str(), e))
        })
        .await?;

        let envelope: Envelope<T> = serde_json::from_slice(&body)
            .map_err(|e| LocateError::remote_format(url, format!("invalid JSON: {e}")))?;
        if envelope.status != STATUS_OK {
            return Err(LocateError::remote_format(
                url,
                format!("status is {:?}, expected {STATUS_OK:?}", envelope.status),
            ));
        }
        Ok(envelope.data)
    }

    async fn media_files(
        &self,
        session: &dyn Session,
        section: &SectionId,
        lesson: &LessonRef,
        media_id: &str,
    ) -> Result<Vec<MediaItem>, LocateError> {
        let base = session.base_url();
        let details_url = build_url(base, &["media", media_id, "details"])?;
        let details: MediaDetails = self
            .fetch(session, &details_url)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LocateError::remote_format(&details_url, "empty data array"))?;

        let course_id = details
            .media
            .published_course_ids
            .first()
            .ok_or_else(|| LocateError::remote_format(&details_url, "media has no course"))?;
        let course_entry = details.courses_by_id.get(course_id).ok_or_else(|| {
            LocateError::remote_format(&details_url, format!("course {course_id} not listed"))
        })?;
        let course = Course {
            id: course_id.clone(),
            name: course_entry.name.clone(),
            code: course_entry.identifier.clone(),
        };
        let lecture = Lecture {
            id: lesson.id.clone(),
            name: lesson.name.clone().or_else(|| {
                details
                    .lessons_by_id
                    .get(&lesson.id)
                    .and_then(|entry| entry.name.clone())
            }),
        };

        let mut items = Vec::with_capacity(details.details.files.len());
        for file in details.details.files {
            if !file.is_processed_file {
                info!(media_id, file = %file.name, "file still processing, skipping");
                continue;
            }
            let url = build_url(base, &["media", "download", media_id, &file.name])?;
            items.push(MediaItem {
                key: MediaKey::new(media_id, file.name),
                section_id: section.clone(),
                lecture: lecture.clone(),
                course: course.clone(),
                url,
                expected_size: file.file_size,
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl MediaLocator for EchoLocator {
    #[instrument(skip(self, session), fields(section = %section))]
    async fn list_media(
        &self,
        session: &dyn Session,
        section: &SectionId,
    ) -> Result<Vec<MediaItem>, LocateError> {
        let syllabus_url = build_url(session.base_url(), &["section", section.as_str(), "syllabus"])?;
        let syllabus: Vec<SyllabusEntry> = self.fetch(session, &syllabus_url).await?;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for entry in syllabus {
            let lesson = entry.lesson;
            for media in lesson.medias {
                if !seen.insert(media.id.clone()) {
                    continue;
                }
                let files = self
                    .media_files(session, section, &lesson.lesson, &media.id)
                    .await?;
                items.extend(files);
            }
        }

        debug!(media = seen.len(), items = items.len(), "section located");
        Ok(items)
    }
}

fn build_url(base: &Url, segments: &[&str]) -> Result<Url, LocateError> {
    endpoint(base, segments)
        .ok_or_else(|| LocateError::remote_format(base, "base URL cannot carry a path"))
}
