//! `reqwest`-backed session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use tracing::{debug, instrument};
use url::Url;

use super::{Session, SessionError};

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-read timeout (5 minutes).
///
/// This bounds the gap between two reads, not the whole transfer, so long
/// lecture recordings are never cut off while data keeps flowing.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// URL fragments of the institution login pages the platform redirects to
/// once a session is no longer valid.
const LOGIN_PATTERNS: &[&str] = &["/login", "/signin", "/sso", "/saml", "/oauth", "/idp/"];

/// Construction options for [`HttpSession`].
#[derive(Debug, Clone)]
pub struct HttpSessionOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl HttpSessionOptions {
    /// Options with default timeouts and no cookies.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            cookie_jar: None,
        }
    }

    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }
}

/// Session that sends every request with the configured User-Agent and the
/// cookies of an exported browser login.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    base_url: Url,
}

impl HttpSession {
    /// Builds the session's HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Client`] if the client cannot be built.
    #[instrument(level = "debug", skip(options), fields(base_url = %base_url))]
    pub fn new(base_url: Url, options: HttpSessionOptions) -> Result<Self, SessionError> {
        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .gzip(true)
            .user_agent(options.user_agent);
        if let Some(jar) = options.cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder.build().map_err(SessionError::Client)?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Session for HttpSession {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn get(&self, url: &Url) -> Result<reqwest::Response, SessionError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SessionError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if matches!(status_code, 401 | 403) {
                return Err(SessionError::auth_expired(url.as_str(), status_code));
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(SessionError::http_status_with_retry_after(
                url.as_str(),
                status_code,
                retry_after,
            ));
        }

        if is_login_redirect(url, &response) {
            debug!(final_url = %response.url(), "request landed on a login page");
            return Err(SessionError::auth_expired(url.as_str(), 0));
        }

        Ok(response)
    }
}

/// True when the platform answered with an HTML login page instead of the
/// requested resource.
fn is_login_redirect(requested: &Url, response: &reqwest::Response) -> bool {
    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"));
    if !is_html {
        return false;
    }

    let landed = response.url();
    let requested_login_page = LOGIN_PATTERNS
        .iter()
        .any(|pattern| requested.path().to_ascii_lowercase().contains(pattern));
    let landed_path = landed.path().to_ascii_lowercase();

    !requested_login_page && LOGIN_PATTERNS.iter().any(|pattern| landed_path.contains(pattern))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn session_for(server: &MockServer) -> HttpSession {
        let base = Url::parse(&server.uri()).unwrap();
        HttpSession::new(base, HttpSessionOptions::new("lecture-backup-test/1.0")).unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("user-agent", "lecture-backup-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server).await;
        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let body = session.get(&url).await.unwrap().text().await.unwrap();

        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn test_get_401_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let session = session_for(&server).await;
        let url = Url::parse(&format!("{}/section/s/syllabus", server.uri())).unwrap();
        let err = session.get(&url).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_get_503_captures_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let session = session_for(&server).await;
        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let err = session.get(&url).await.unwrap_err();

        match err {
            SessionError::HttpStatus {
                status,
                retry_after,
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(retry_after.as_deref(), Some("7"));
            }
            other => panic!("Expected HttpStatus(503), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_redirect_to_login_page_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/section/s/syllabus"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/login?next=x", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<form action=\"/login\"></form>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let session = session_for(&server).await;
        let url = Url::parse(&format!("{}/section/s/syllabus", server.uri())).unwrap();
        let err = session.get(&url).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired { status: 0, .. }));
    }

    #[tokio::test]
    async fn test_get_connection_refused_is_network_error() {
        let session = HttpSession::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            HttpSessionOptions::new("ua"),
        )
        .unwrap();
        let url = Url::parse("http://127.0.0.1:9/x").unwrap();

        let err = session.get(&url).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Network { .. } | SessionError::Timeout { .. }
        ));
    }
}
