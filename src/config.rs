//! Configuration types for artifact-fetcher
//!
//! Configuration is loaded once at startup from a TOML file (with
//! `ARTIFACT_FETCHER_`-prefixed environment overrides) and validated before
//! the process starts serving. Validation failures are fatal.

use crate::error::{Error, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

fn default_addr() -> SocketAddr {
    // Matches the historical default port of the service
    SocketAddr::from(([127, 0, 0, 1], 9895))
}

fn default_endpoint() -> String {
    "/receive".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Event-matching criteria for one artifact target
///
/// An unset field matches every inbound event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Event name to match (e.g. "push"); `None` matches any event
    #[serde(default)]
    pub event: Option<String>,

    /// Workflow name to match; `None` matches any workflow
    #[serde(default)]
    pub workflow: Option<String>,
}

/// One artifact target: where to fetch from, where to unpack, what to run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Criteria an inbound event must satisfy for this target
    #[serde(default)]
    pub filter: Filter,

    /// Source repository as "owner/name"
    pub repo: String,

    /// Display name used in log fields
    #[serde(default)]
    pub name: String,

    /// Destination directory for extracted artifacts.
    /// Must exist and be a directory; resolved to an absolute path at load.
    #[serde(default)]
    pub path: PathBuf,

    /// Shell commands run before each artifact is downloaded
    #[serde(default)]
    pub before: Vec<String>,

    /// Shell commands run after each artifact is extracted
    #[serde(default)]
    pub after: Vec<String>,

    /// API access token for this target (mandatory)
    #[serde(default)]
    pub github_token: String,
}

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Bind address for the HTTP listener (default: 127.0.0.1:9895)
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,

    /// Path of the event-notification endpoint (default: "/receive")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Log verbosity used when `RUST_LOG` is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Configured artifact targets
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            endpoint: default_endpoint(),
            log_level: default_log_level(),
            artifacts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables prefixed with `ARTIFACT_FETCHER_` override
    /// top-level keys (e.g. `ARTIFACT_FETCHER_LOG_LEVEL=debug`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, unparseable, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config {
                message: format!("config file not found: {}", path.display()),
                key: None,
            });
        }

        let mut config: Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARTIFACT_FETCHER_"))
            .extract()
            .map_err(|e| Error::Config {
                message: e.to_string(),
                key: None,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on parse or validation failure.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(toml_str).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the endpoint and artifact targets, normalizing destination paths
    ///
    /// The endpoint must be a rooted path — the router would otherwise panic
    /// at startup instead of failing through the fatal-config path. Every
    /// target needs a token and an existing destination directory.
    /// Destination paths are canonicalized here, once — the pipeline does not
    /// re-check them per fetch.
    fn validate(&mut self) -> Result<()> {
        if !self.endpoint.starts_with('/') {
            return Err(Error::Config {
                message: format!("endpoint {:?} must start with '/'", self.endpoint),
                key: Some("endpoint".to_string()),
            });
        }

        for target in &mut self.artifacts {
            if target.github_token.is_empty() {
                return Err(Error::Config {
                    message: format!("artifact target {:?} requires a github_token", target.repo),
                    key: Some("artifacts.github_token".to_string()),
                });
            }

            if target.path.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: format!("artifact target {:?} requires a path", target.repo),
                    key: Some("artifacts.path".to_string()),
                });
            }

            let absolute = target.path.canonicalize().map_err(|e| Error::Config {
                message: format!("invalid path {}: {}", target.path.display(), e),
                key: Some("artifacts.path".to_string()),
            })?;

            if !absolute.is_dir() {
                return Err(Error::Config {
                    message: format!("{} must be a directory", absolute.display()),
                    key: Some("artifacts.path".to_string()),
                });
            }

            target.path = absolute;
        }

        Ok(())
    }
}
