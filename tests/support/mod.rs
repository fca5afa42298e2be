//! Shared helpers for integration tests: a mock Echo360 platform and engine wiring.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use lecture_backup::download::ChunkedDownloader;
use lecture_backup::locator::EchoLocator;
use lecture_backup::session::{HttpSession, HttpSessionOptions, RetryPolicy};
use lecture_backup::sync::{SyncEngine, SyncOptions};
use lecture_backup::{Database, IndexStore, MediaLocator};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COURSE_ID: &str = "C-1";

/// Mounts `GET /section/{section}/syllabus` listing `lessons` as `(lesson_id, media_ids)`.
pub async fn mount_syllabus(server: &MockServer, section: &str, lessons: &[(&str, &[&str])]) {
    let data: Vec<Value> = lessons
        .iter()
        .map(|(lesson_id, medias)| {
            let medias: Vec<Value> = medias.iter().map(|id| json!({ "id": id })).collect();
            json!({
                "lesson": {
                    "lesson": { "id": lesson_id, "name": format!("Lesson {lesson_id}") },
                    "medias": medias
                }
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/section/{section}/syllabus")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "data": data })),
        )
        .mount(server)
        .await;
}

/// Mounts `GET /media/{media_id}/details` with processed `files` as `(name, size)`.
pub async fn mount_media(server: &MockServer, media_id: &str, lesson_id: &str, files: &[(&str, u64)]) {
    let files: Vec<Value> = files
        .iter()
        .map(|(name, size)| json!({ "name": name, "fileSize": size, "isProcessedFile": true }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/media/{media_id}/details")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": [{
                "media": {
                    "publishedCourseIds": [COURSE_ID],
                    "publishedSectionIds": ["ignored"],
                    "publishedLessonIds": [lesson_id]
                },
                "coursesById": { COURSE_ID: { "name": "Algorithms", "identifier": "COMP2001" } },
                "lessonsById": { lesson_id: { "name": "Lesson" } },
                "details": { "files": files }
            }]
        })))
        .mount(server)
        .await;
}

/// Mounts the download endpoint for one file, expecting exactly `expected_calls` requests.
pub async fn mount_download(
    server: &MockServer,
    media_id: &str,
    file_name: &str,
    body: Vec<u8>,
    expected_calls: u64,
) {
    Mock::given(method("GET"))
        .and(path(format!("/media/download/{media_id}/{file_name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn session_for(server: &MockServer) -> Arc<HttpSession> {
    let base = Url::parse(&format!("{}/", server.uri())).expect("mock server URI parses");
    Arc::new(
        HttpSession::new(base, HttpSessionOptions::new("lecture-backup-tests/1.0"))
            .expect("session builds"),
    )
}

pub async fn open_index(media_path: &Path) -> IndexStore {
    let db = Database::new(&media_path.join("index.db"))
        .await
        .expect("index database opens");
    IndexStore::new(db)
}

/// Engine against the mock platform with the Echo360 locator and no retry delays.
pub fn engine(
    server: &MockServer,
    index: IndexStore,
    media_path: &Path,
    chunk_size: usize,
    concurrency: usize,
) -> SyncEngine {
    engine_with_locator(
        server,
        Arc::new(EchoLocator::new(RetryPolicy::immediate(2))),
        index,
        media_path,
        chunk_size,
        concurrency,
    )
}

pub fn engine_with_locator(
    server: &MockServer,
    locator: Arc<dyn MediaLocator>,
    index: IndexStore,
    media_path: &Path,
    chunk_size: usize,
    concurrency: usize,
) -> SyncEngine {
    SyncEngine::new(
        session_for(server),
        locator,
        ChunkedDownloader::new(RetryPolicy::immediate(2)),
        index,
        SyncOptions::new(media_path, chunk_size).with_concurrency(concurrency),
    )
    .expect("engine options are valid")
}

/// Deterministic file content of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}

/// Paths of leftover temporary files under `dir`, recursively.
pub fn part_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(part_files(&path));
        } else if path.extension().is_some_and(|ext| ext == "part") {
            found.push(path);
        }
    }
    found
}
