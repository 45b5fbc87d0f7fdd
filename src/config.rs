//! Mirror configuration
//!
//! Where the local mirror lives and which remote store (if any) it mirrors.
//! Values come from the builder or from the environment (`.env` is honored).
//!
//! | Variable | Meaning |
//! |---|---|
//! | `VAYMN_DATABASE_PATH` | SQLite file for the local mirror |
//! | `VAYMN_REMOTE_URL` | base URL of the remote REST store |
//! | `VAYMN_REMOTE_ANON_KEY` | API key sent with every remote request |
//! | `VAYMN_REMOTE_TIMEOUT_SECS` | optional per-request timeout |

use crate::error::{Result, VaymnError};
use crate::storage::Database;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Placeholder URL shipped in templates; never treated as a real store
const PLACEHOLDER_URL: &str = "YOUR_SUPABASE_URL";

/// Keys this short are placeholders too
const MIN_ANON_KEY_LEN: usize = 21;

/// Connection details for the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: Url,
    pub anon_key: String,
}

impl RemoteConfig {
    /// Validate a URL/key pair
    ///
    /// # Errors
    /// `InvalidConfiguration` for empty or placeholder URLs and short keys,
    /// `UrlError` if the URL does not parse.
    pub fn parse(url: &str, anon_key: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() || url == PLACEHOLDER_URL {
            return Err(VaymnError::InvalidConfiguration(
                "remote URL is not set".to_string(),
            ));
        }
        if anon_key.len() < MIN_ANON_KEY_LEN {
            return Err(VaymnError::InvalidConfiguration(
                "remote API key is missing or a placeholder".to_string(),
            ));
        }

        Ok(Self {
            url: Url::parse(url)?,
            anon_key: anon_key.to_string(),
        })
    }

    /// Like [`RemoteConfig::parse`], but an unusable pair just means "no remote"
    pub fn from_parts(url: &str, anon_key: &str) -> Option<Self> {
        match Self::parse(url, anon_key) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::info!(error = %e, "remote store disabled, running local-only");
                None
            }
        }
    }
}

/// Configuration for a [`crate::mirror::Mirror`]
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub database_path: PathBuf,
    pub remote: Option<RemoteConfig>,
    /// Unset means remote requests wait as long as the server takes
    pub request_timeout: Option<Duration>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            database_path: Database::get_default_path(),
            remote: None,
            request_timeout: None,
        }
    }
}

impl MirrorConfig {
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::new()
    }

    /// Load configuration from the process environment
    ///
    /// # Errors
    /// `InvalidConfiguration` if `VAYMN_REMOTE_TIMEOUT_SECS` is not a number.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_path = env::var("VAYMN_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Database::get_default_path());

        let remote = match (env::var("VAYMN_REMOTE_URL"), env::var("VAYMN_REMOTE_ANON_KEY")) {
            (Ok(url), Ok(key)) => RemoteConfig::from_parts(&url, &key),
            _ => None,
        };

        let request_timeout = match env::var("VAYMN_REMOTE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    VaymnError::InvalidConfiguration(format!(
                        "VAYMN_REMOTE_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            database_path,
            remote,
            request_timeout,
        })
    }
}

/// Builder for MirrorConfig
#[derive(Debug)]
pub struct MirrorConfigBuilder {
    config: MirrorConfig,
}

impl MirrorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MirrorConfig::default(),
        }
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database_path = path.into();
        self
    }

    pub fn remote(mut self, remote: Option<RemoteConfig>) -> Self {
        self.config.remote = remote;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> MirrorConfig {
        self.config
    }
}

impl Default for MirrorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
