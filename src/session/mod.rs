//! The authenticated-session capability and the network-call boundary.
//!
//! A [`Session`] is constructed once per run and passed explicitly to every
//! component that talks to the platform. There is no ambient session.
//!
//! - [`Session`] - Async trait: a GET operation with credentials already applied
//! - [`HttpSession`] - `reqwest` implementation backed by a cookie jar
//! - [`with_retry`] - Bounded exponential backoff applied around each request
//! - [`load_cookie_file`] - Netscape cookie export loader used to build the jar

mod cookies;
mod error;
mod http;
mod retry;

pub use cookies::{
    CookieError, CookieLine, ParsedCookies, SESSION_COOKIE_NAMES, load_cookie_file,
    load_cookies_into_jar, parse_netscape_cookies,
};
pub use error::SessionError;
pub use http::{CONNECT_TIMEOUT_SECS, HttpSession, HttpSessionOptions, READ_TIMEOUT_SECS};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after, with_retry,
};

use async_trait::async_trait;
use url::Url;

/// An authenticated session able to issue requests against the platform.
///
/// Implementations must report a rejected session as
/// [`SessionError::AuthExpired`] and must return only successful (2xx)
/// responses from [`get`](Session::get).
#[async_trait]
pub trait Session: Send + Sync {
    /// Root URL of the platform; endpoints are built relative to it.
    fn base_url(&self) -> &Url;

    /// Issues a GET request and returns the response once headers arrived.
    async fn get(&self, url: &Url) -> Result<reqwest::Response, SessionError>;
}

/// Builds `base/<segments...>`, percent-encoding each segment.
///
/// Returns `None` for URLs that cannot carry a path (e.g. `mailto:`).
#[must_use]
pub fn endpoint(base: &Url, segments: &[&str]) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(segments);
    url.set_query(None);
    Some(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments_to_root() {
        let base = Url::parse("https://echo360.org.uk/").unwrap();
        let url = endpoint(&base, &["section", "sec-1", "syllabus"]).unwrap();
        assert_eq!(url.as_str(), "https://echo360.org.uk/section/sec-1/syllabus");
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/echo/").unwrap();
        let url = endpoint(&base, &["media", "m-1", "details"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/echo/media/m-1/details");
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let base = Url::parse("https://echo360.org.uk").unwrap();
        let url = endpoint(&base, &["media", "download", "m-1", "a b/c.mp4"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://echo360.org.uk/media/download/m-1/a%20b%2Fc.mp4"
        );
    }

    #[test]
    fn test_endpoint_rejects_cannot_be_a_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(endpoint(&base, &["x"]).is_none());
    }
}
