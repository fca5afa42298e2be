//! TOML run configuration.
//!
//! ```toml
//! user_agent = "Mozilla/5.0 ..."
//! chunk_size = 1048576
//! sections = ["2f1d0f7e-...", "9a7c1b22-..."]
//! media_path = "/srv/lectures"
//!
//! # optional
//! base_url = "https://echo360.org.uk/"
//! cookie_file = "/home/me/echo360-cookies.txt"
//! concurrency = 2
//! max_retries = 3
//! connect_timeout_secs = 30
//! read_timeout_secs = 300
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::SectionId;
use crate::session::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS};
use crate::sync::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};

/// Platform root used when `base_url` is not set.
pub const DEFAULT_BASE_URL: &str = "https://echo360.org.uk/";

/// File name of the default configuration in the home directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".lecture-backup.toml";

/// File name of the index database inside `media_path`.
pub const INDEX_FILE_NAME: &str = "index.db";

/// Errors raised while loading configuration. All are fatal before any
/// network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Maximum bytes written per chunk.
    pub chunk_size: usize,
    /// Sections to back up, in processing order.
    pub sections: Vec<SectionId>,
    /// Root directory for media and the index database.
    pub media_path: PathBuf,
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Netscape cookie export holding the platform session.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_base_url() -> Url {
    // Constant and known to parse.
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("DEFAULT_BASE_URL is valid"))
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_connect_timeout_secs() -> u64 {
    CONNECT_TIMEOUT_SECS
}

fn default_read_timeout_secs() -> u64 {
    READ_TIMEOUT_SECS
}

impl Config {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or unreadable, is not
    /// valid TOML of the expected shape, or holds invalid values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        debug!(path = %path.display(), "loaded configuration file");
        Self::from_toml_str(&raw)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value constraints the TOML shape cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.as_str().trim().is_empty() {
                return Err(ConfigError::invalid("sections", "section ids must not be empty"));
            }
            if !seen.insert(section) {
                return Err(ConfigError::invalid(
                    "sections",
                    format!("duplicate section {section}"),
                ));
            }
        }

        if self.media_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("media_path", "must not be empty"));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "base_url",
                format!("{} is not an http(s) URL", self.base_url),
            ));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("{}. Expected range: 1..={MAX_CONCURRENCY}", self.concurrency),
            ));
        }
        if !(1..=10).contains(&self.max_retries) {
            return Err(ConfigError::invalid(
                "max_retries",
                format!("{}. Expected range: 1..=10", self.max_retries),
            ));
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        Ok(())
    }

    /// Location of the index database.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.media_path.join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..=3600"),
        ));
    }
    Ok(())
}

/// `~/.lecture-backup.toml`, when a home directory can be determined.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_CONFIG_FILE_NAME))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const MINIMAL: &str = r#"
user_agent = "Mozilla/5.0 (test)"
chunk_size = 4096
sections = ["sec-1", "sec-2"]
media_path = "/srv/lectures"
"#;

    fn with_line(extra: &str) -> String {
        format!("{MINIMAL}{extra}\n")
    }

    #[test]
    fn test_config_minimal_applies_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.user_agent, "Mozilla/5.0 (test)");
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(
            config.sections,
            vec![SectionId::new("sec-1"), SectionId::new("sec-2")]
        );
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.cookie_file, None);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
        assert_eq!(config.index_path(), PathBuf::from("/srv/lectures/index.db"));
    }

    #[test]
    fn test_config_optional_fields() {
        let raw = with_line(
            "base_url = \"http://127.0.0.1:8080/\"\ncookie_file = \"/tmp/c.txt\"\nconcurrency = 4\nmax_retries = 5\nread_timeout_secs = 60",
        );
        let config = Config::from_toml_str(&raw).unwrap();

        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.cookie_file, Some(PathBuf::from("/tmp/c.txt")));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.read_timeout_secs, 60);
    }

    #[test]
    fn test_config_zero_chunk_size_rejected() {
        let raw = MINIMAL.replace("chunk_size = 4096", "chunk_size = 0");
        let err = Config::from_toml_str(&raw).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "chunk_size", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_config_negative_chunk_size_is_parse_error() {
        let raw = MINIMAL.replace("chunk_size = 4096", "chunk_size = -1");
        assert!(matches!(
            Config::from_toml_str(&raw).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_config_duplicate_sections_rejected() {
        let raw = MINIMAL.replace(r#"["sec-1", "sec-2"]"#, r#"["sec-1", "sec-1"]"#);
        let err = Config::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate section sec-1"), "got {err}");
    }

    #[test]
    fn test_config_missing_required_field_is_parse_error() {
        let raw = MINIMAL.replace("media_path = \"/srv/lectures\"", "");
        let err = Config::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("media_path"), "got {err}");
    }

    #[test]
    fn test_config_unknown_field_rejected() {
        let err = Config::from_toml_str(&with_line("chunksize = 1")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_out_of_range_values_rejected() {
        for (line, field) in [
            ("concurrency = 0", "concurrency"),
            ("concurrency = 17", "concurrency"),
            ("max_retries = 11", "max_retries"),
            ("connect_timeout_secs = 0", "connect_timeout_secs"),
            ("read_timeout_secs = 3601", "read_timeout_secs"),
            ("base_url = \"ftp://example.com/\"", "base_url"),
        ] {
            let err = Config::from_toml_str(&with_line(line)).unwrap_err();
            match err {
                ConfigError::Invalid { field: got, .. } => assert_eq!(got, field, "{line}"),
                other => panic!("{line}: expected Invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_config_empty_user_agent_rejected() {
        let raw = MINIMAL.replace("Mozilla/5.0 (test)", "  ");
        assert!(matches!(
            Config::from_toml_str(&raw).unwrap_err(),
            ConfigError::Invalid {
                field: "user_agent",
                ..
            }
        ));
    }

    #[test]
    fn test_config_from_file_roundtrip_and_missing() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.chunk_size, 4096);

        let missing = file.path().with_extension("absent");
        assert!(matches!(
            Config::from_file(&missing).unwrap_err(),
            ConfigError::NotFound { .. }
        ));
    }

    #[test]
    fn test_default_config_path_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(DEFAULT_CONFIG_FILE_NAME));
        }
    }
}
