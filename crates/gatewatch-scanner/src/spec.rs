//! Scanner mode dispatch.
//!
//! [`ScannerSpec`] is the closed set of supported analyzer modes. Only the
//! mode name crosses the process boundary; the analyze phase reconstructs
//! the same variant from the persisted name plus configuration, and an
//! unrecognized name is a fatal configuration error.

use crate::error::{Result, ScannerError};
use crate::invoke::{self, AnalyzeOutcome};
use crate::resolve;
use gatewatch_core::{state_keys, ScannerConfig, StateStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Property keys contributed by the scanner modes.
pub mod properties {
    /// Project key (cli mode)
    pub const PROJECT_KEY: &str = "analysis.projectKey";
    /// Project display name (cli mode)
    pub const PROJECT_NAME: &str = "analysis.projectName";
    /// Project version (cli mode)
    pub const PROJECT_VERSION: &str = "analysis.projectVersion";
    /// Settings file consumed by a build-integrated scanner (build mode)
    pub const SETTINGS_PATH: &str = "analysis.settings.path";
    /// Secondary JDK home requested for the scanner
    pub const JDK_HOME: &str = "analysis.scanner.jdkHome";
    /// Branch under analysis
    pub const BRANCH: &str = "analysis.branch.name";
    /// Pull request key under analysis
    pub const PULL_REQUEST: &str = "analysis.pullRequest.key";
}

/// Mode names as persisted in cross-phase state.
mod mode_names {
    pub const CLI: &str = "cli";
    pub const BUILD: &str = "build";
    pub const OTHER: &str = "other";
}

/// One of the supported analyzer modes, with its mode-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScannerSpec {
    /// Standalone command-line scanner driven entirely by properties
    Cli {
        /// Project key handed to the scanner
        project_key: String,
        /// Optional display name
        project_name: Option<String>,
        /// Optional version string
        project_version: Option<String>,
    },
    /// Scanner embedded in the user's build, configured by a settings file
    BuildIntegration {
        /// Settings file the build-side scanner reads
        settings_path: PathBuf,
    },
    /// No scanner invocation here; scanning happens in a separate,
    /// user-owned build step. Deliberate null-object variant.
    Other,
}

impl ScannerSpec {
    /// The stable mode name persisted across the process boundary.
    #[must_use]
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Cli { .. } => mode_names::CLI,
            Self::BuildIntegration { .. } => mode_names::BUILD,
            Self::Other => mode_names::OTHER,
        }
    }

    /// Build the variant selected by the configuration's `mode` field.
    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        Self::from_mode(&config.mode, config)
    }

    /// Reconstruct a spec from a persisted mode name plus configuration.
    ///
    /// An unrecognized mode name is a fatal configuration error.
    pub fn from_mode(mode: &str, config: &ScannerConfig) -> Result<Self> {
        match mode {
            mode_names::CLI => {
                let project_key =
                    config
                        .project_key
                        .clone()
                        .ok_or(ScannerError::MissingInput {
                            mode: mode_names::CLI,
                            field: "a project key",
                        })?;
                Ok(Self::Cli {
                    project_key,
                    project_name: config.project_name.clone(),
                    project_version: config.project_version.clone(),
                })
            }
            mode_names::BUILD => {
                let settings_path =
                    config
                        .settings_path
                        .clone()
                        .ok_or(ScannerError::MissingInput {
                            mode: mode_names::BUILD,
                            field: "a settings file path",
                        })?;
                Ok(Self::BuildIntegration { settings_path })
            }
            mode_names::OTHER => Ok(Self::Other),
            unknown => Err(ScannerError::UnknownMode(unknown.to_string())),
        }
    }

    /// Mode-specific contribution to the analysis property map.
    #[must_use]
    pub fn to_properties(&self) -> BTreeMap<String, Option<String>> {
        let mut map = BTreeMap::new();
        match self {
            Self::Cli {
                project_key,
                project_name,
                project_version,
            } => {
                map.insert(
                    properties::PROJECT_KEY.to_string(),
                    Some(project_key.clone()),
                );
                if let Some(name) = project_name {
                    map.insert(properties::PROJECT_NAME.to_string(), Some(name.clone()));
                }
                if let Some(version) = project_version {
                    map.insert(
                        properties::PROJECT_VERSION.to_string(),
                        Some(version.clone()),
                    );
                }
            }
            Self::BuildIntegration { settings_path } => {
                map.insert(
                    properties::SETTINGS_PATH.to_string(),
                    Some(settings_path.display().to_string()),
                );
            }
            Self::Other => {}
        }
        map
    }

    /// Prepare-phase work: stage whatever `analyze()` will need in the
    /// next process and persist it.
    pub async fn prepare(&self, config: &ScannerConfig, state: &StateStore) -> Result<()> {
        match self {
            Self::Cli { .. } | Self::BuildIntegration { .. } => {
                if let Self::BuildIntegration { settings_path } = self {
                    if !settings_path.exists() {
                        return Err(ScannerError::MissingInput {
                            mode: mode_names::BUILD,
                            field: "an existing settings file",
                        });
                    }
                }

                let binary = resolve::resolve_scanner_binary(config).await?;
                state
                    .set_string(state_keys::SCANNER_BINARY, &binary.display().to_string())
                    .map_err(|e| ScannerError::State(e.to_string()))?;
                tracing::info!(binary = %binary.display(), "scanner binary resolved");
                Ok(())
            }
            Self::Other => {
                tracing::debug!("scanner mode 'other': nothing to prepare");
                Ok(())
            }
        }
    }

    /// Analyze-phase work: invoke the scanner and surface its error lines.
    ///
    /// The resolved binary path persisted by `prepare()` may be absent
    /// (state lost between processes); the embedded default location is
    /// used then.
    pub async fn analyze(
        &self,
        config: &ScannerConfig,
        state: &StateStore,
        scanner_properties: &BTreeMap<String, Option<String>>,
    ) -> Result<AnalyzeOutcome> {
        match self {
            Self::Cli { .. } => {
                let binary = restored_binary(config, state);
                let args = invoke::property_args(scanner_properties);
                invoke::run_scanner(&binary, &args, &config.work_dir).await
            }
            Self::BuildIntegration { settings_path } => {
                let binary = restored_binary(config, state);
                let args = vec![
                    "--settings".to_string(),
                    settings_path.display().to_string(),
                ];
                invoke::run_scanner(&binary, &args, &config.work_dir).await
            }
            Self::Other => {
                let warning = "scanner mode 'other': no scanner invoked here, scanning \
                               is expected to be embedded in a separate build step"
                    .to_string();
                tracing::warn!("{warning}");
                Ok(AnalyzeOutcome {
                    error_lines: vec![],
                    warnings: vec![warning],
                })
            }
        }
    }
}

/// Binary path persisted by `prepare()`, or the embedded default when the
/// state did not survive the process boundary.
fn restored_binary(config: &ScannerConfig, state: &StateStore) -> PathBuf {
    match state.get_string(state_keys::SCANNER_BINARY) {
        Ok(Some(path)) => PathBuf::from(path),
        Ok(None) | Err(_) => {
            let fallback = resolve::default_binary_path(&config.work_dir);
            tracing::warn!(
                fallback = %fallback.display(),
                "no scanner binary persisted by prepare, using embedded default"
            );
            fallback
        }
    }
}
