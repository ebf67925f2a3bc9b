//! Configuration for the gatewatch pipeline.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. In CI the host usually drops a
//! `gatewatch.toml` next to the sources; the XDG location is the fallback
//! for local runs.

use crate::error::{GatewatchError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "gatewatch.toml";

/// Top-level pipeline configuration.
///
/// Every section has defaults so a partial file (or no file at all) is
/// valid; required values are validated by the phase that needs them, not
/// at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Analysis server connection settings
    pub server: ServerConfig,
    /// Scanner selection and per-mode parameters
    pub scanner: ScannerConfig,
    /// Publish-phase polling and report lookup settings
    pub publish: PublishConfig,
    /// Path of the persisted cross-phase state file
    pub state_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load configuration, preferring `gatewatch.toml` in the current
    /// directory, then the XDG config path, then defaults.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from(&local);
        }

        let xdg = Self::config_path()?;
        if xdg.exists() {
            return Self::load_from(&xdg);
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)
            .map_err(|e| GatewatchError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supported overrides:
    /// - `GATEWATCH_SERVER_URL`: analysis server base URL
    /// - `GATEWATCH_TOKEN`: authentication token
    /// - `GATEWATCH_STATE_FILE`: state file path
    /// - `GATEWATCH_POLL_MAX_ATTEMPTS`: completion-poll attempt budget
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };

        if let Ok(val) = std::env::var("GATEWATCH_SERVER_URL") {
            if !val.is_empty() {
                config.server.url = val;
                tracing::debug!("override server.url from env");
            }
        }

        if let Ok(val) = std::env::var("GATEWATCH_TOKEN") {
            if !val.is_empty() {
                config.server.token = Some(val);
                tracing::debug!("override server.token from env");
            }
        }

        if let Ok(val) = std::env::var("GATEWATCH_STATE_FILE") {
            if !val.is_empty() {
                config.state_file = Some(PathBuf::from(val));
                tracing::debug!("override state_file from env");
            }
        }

        if let Ok(val) = std::env::var("GATEWATCH_POLL_MAX_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                config.publish.poll_max_attempts = attempts;
                tracing::debug!("override publish.poll_max_attempts from env: {}", attempts);
            }
        }

        Ok(config)
    }

    /// Resolved state-file path: configured value or
    /// `<work dir>/.gatewatch/state.json`.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| {
            PathBuf::from(&self.scanner.work_dir)
                .join(".gatewatch")
                .join("state.json")
        })
    }

    /// Get the XDG path to the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "gatewatch", "gatewatch").ok_or_else(|| {
            GatewatchError::Config("could not determine config directory".to_string())
        })?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

/// Analysis server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the analysis server
    pub url: String,
    /// Endpoint kind: `server` or `cloud`
    pub kind: String,
    /// Authentication token (wins over username/password when both are set)
    pub token: Option<String>,
    /// Username for basic authentication
    pub username: Option<String>,
    /// Password for basic authentication
    pub password: Option<String>,
    /// Organization key, required by cloud endpoints
    pub organization: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            kind: "server".to_string(),
            token: None,
            username: None,
            password: None,
            organization: None,
        }
    }
}

/// Scanner selection and per-mode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Scanner mode: `cli`, `build` or `other`
    pub mode: String,
    /// Project key handed to the scanner (cli mode)
    pub project_key: Option<String>,
    /// Project display name (cli mode)
    pub project_name: Option<String>,
    /// Project version (cli mode)
    pub project_version: Option<String>,
    /// Settings file consumed by a build-integrated scanner (build mode)
    pub settings_path: Option<PathBuf>,
    /// Branch under analysis, honored only when the server supports it
    pub branch: Option<String>,
    /// Pull request key under analysis, honored only when the server
    /// supports it
    pub pull_request: Option<String>,
    /// Explicit scanner binary path, skipping resolution
    pub binary_path: Option<PathBuf>,
    /// URL to download the scanner binary from when none is found locally
    pub download_url: Option<String>,
    /// Directory the scanner runs in and drops its report under
    pub work_dir: String,
    /// Requested secondary JDK home, dropped when the server ignores it
    pub jdk_home: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: "cli".to_string(),
            project_key: None,
            project_name: None,
            project_version: None,
            settings_path: None,
            branch: None,
            pull_request: None,
            binary_path: None,
            download_url: None,
            work_dir: ".".to_string(),
            jdk_home: None,
        }
    }
}

/// Publish-phase polling and report lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Completion-poll attempt budget (outer loop)
    pub poll_max_attempts: u32,
    /// Fixed delay between completion polls, in milliseconds
    pub poll_delay_ms: u64,
    /// Directory searched for task report files, overriding the default
    pub report_dir: Option<PathBuf>,
    /// Upper bound on analyses processed concurrently
    pub max_concurrent_analyses: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_max_attempts: 60,
            poll_delay_ms: 5000,
            report_dir: None,
            max_concurrent_analyses: 4,
        }
    }
}
