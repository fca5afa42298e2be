//! Netscape cookie file loading for the platform session.
//!
//! The login handshake happens in a browser; its cookies are exported in the
//! Netscape format (7 TAB-separated fields per line) and loaded here into a
//! `reqwest::cookie::Jar`.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};

/// Cookies the platform sets after a completed institution login.
pub const SESSION_COOKIE_NAMES: [&str; 6] = [
    "ECHO_JWT",
    "PLAY_SESSION",
    "CloudFront-Key-Pair-Id",
    "CloudFront-Policy",
    "CloudFront-Signature",
    "CloudFront-Tracking2",
];

/// curl and browser exporters mark HttpOnly cookies with this line prefix.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// A single parsed cookie. The value is redacted in Debug output.
#[derive(Clone)]
pub struct CookieLine {
    pub domain: String,
    pub tailmatch: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp for expiry (0 = session cookie).
    pub expires: u64,
    pub name: String,
    value: String,
}

impl CookieLine {
    /// Returns the cookie value. Never log it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("tailmatch", &self.tailmatch)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors that can occur while loading a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A line in the cookie file has an invalid format.
    #[error("line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Parsed cookies plus warnings for skipped lines.
#[derive(Debug)]
pub struct ParsedCookies {
    pub cookies: Vec<CookieLine>,
    /// Line number and reason for each malformed line.
    pub warnings: Vec<(usize, String)>,
}

impl ParsedCookies {
    /// Returns the expected session cookie names absent from the file.
    #[must_use]
    pub fn missing_session_cookies(&self) -> Vec<&'static str> {
        let present: HashSet<&str> = self.cookies.iter().map(|c| c.name.as_str()).collect();
        SESSION_COOKIE_NAMES
            .iter()
            .copied()
            .filter(|name| !present.contains(name))
            .collect()
    }

    /// Loads the cookies into a jar for the HTTP session.
    #[must_use]
    pub fn to_jar(&self) -> Arc<Jar> {
        load_cookies_into_jar(&self.cookies)
    }
}

/// Reads and parses a Netscape-format cookie file.
///
/// # Errors
///
/// See [`parse_netscape_cookies`].
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn load_cookie_file(path: &Path) -> Result<ParsedCookies, CookieError> {
    let file = File::open(path)?;
    parse_netscape_cookies(BufReader::new(file))
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Lines starting with `#` and blank lines are skipped, except the
/// `#HttpOnly_` prefix which marks a real cookie line.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when a non-empty file yields zero valid cookies.
/// Individual malformed lines are collected as warnings.
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<ParsedCookies, CookieError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut data_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end();

        if line.is_empty() {
            continue;
        }

        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None if line.starts_with('#') => continue,
            None => (line, false),
        };

        data_lines += 1;

        match parse_cookie_line(line, line_number, http_only) {
            Ok(cookie) => {
                debug!(line = line_number, domain = %cookie.domain, name = %cookie.name, "parsed cookie");
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && data_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParsedCookies { cookies, warnings })
}

fn parse_cookie_line(
    line: &str,
    line_number: usize,
    http_only: bool,
) -> Result<CookieLine, CookieError> {
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, tailmatch, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    };

    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    let parse_bool = |value: &str, field: &str| match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(invalid(format!(
            "{field} field must be TRUE or FALSE, got '{other}'"
        ))),
    };

    Ok(CookieLine {
        domain: (*domain).to_string(),
        tailmatch: parse_bool(*tailmatch, "tailmatch")?,
        path: (*path).to_string(),
        secure: parse_bool(*secure, "secure")?,
        http_only,
        expires: expires.parse::<u64>().map_err(|_| {
            invalid(format!(
                "expires field must be a non-negative integer, got '{expires}'"
            ))
        })?,
        name: (*name).to_string(),
        value: (*value).to_string(),
    })
}

/// Loads parsed cookies into a `reqwest::cookie::Jar`.
#[must_use]
pub fn load_cookies_into_jar(cookies: &[CookieLine]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for cookie in cookies {
        match build_origin_url(cookie).parse::<url::Url>() {
            Ok(origin) => jar.add_cookie_str(&build_set_cookie_string(cookie), &origin),
            Err(_) => warn!(
                domain = %cookie.domain,
                name = %cookie.name,
                "skipping cookie with unparseable domain"
            ),
        }
    }

    jar
}

fn build_set_cookie_string(cookie: &CookieLine) -> String {
    let mut parts = vec![
        format!("{}={}", cookie.name, cookie.value()),
        format!("Domain={}", cookie.domain),
        format!("Path={}", cookie.path),
    ];

    if cookie.secure {
        parts.push("Secure".to_string());
    }
    if cookie.http_only {
        parts.push("HttpOnly".to_string());
    }
    if cookie.expires > 0
        && let Some(expires) = std::time::UNIX_EPOCH
            .checked_add(std::time::Duration::from_secs(cookie.expires))
    {
        parts.push(format!("Expires={}", httpdate::fmt_http_date(expires)));
    }

    parts.join("; ")
}

/// Uses `https://` for secure cookies and strips the leading dot from the domain.
fn build_origin_url(cookie: &CookieLine) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    format!("{scheme}://{domain}{}", cookie.path)
}
