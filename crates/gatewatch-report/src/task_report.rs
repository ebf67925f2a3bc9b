//! Task report file parsing and location.
//!
//! The external scanner hands off to the publish phase through a small
//! flat text file of `key=value` lines. One file per analysis; a
//! multi-module build drops one per module, each polled and reported
//! independently.

use gatewatch_core::{CapabilitySet, GatewatchError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name the scanner writes its handoff under.
pub const REPORT_FILE_NAME: &str = "report-task.txt";

/// Work-dir subdirectory used by current scanners.
pub const NEW_DEFAULT_DIR: &str = ".scanwork";

/// Work-dir subdirectory used by scanners predating the new location.
pub const LEGACY_DEFAULT_DIR: &str = ".analysis";

/// Errors reading a task report file.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required key is absent
    #[error("invalid task report {path}: missing required key '{key}'")]
    MissingKey {
        /// Offending file
        path: PathBuf,
        /// The absent key
        key: &'static str,
    },

    /// The file could not be read at all
    #[error("could not read task report {path}: {source}")]
    Unreadable {
        /// Offending file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl From<ReportError> for GatewatchError {
    fn from(err: ReportError) -> Self {
        let (path, reason) = match &err {
            ReportError::MissingKey { path, key } => {
                (path.clone(), format!("missing required key '{key}'"))
            }
            ReportError::Unreadable { path, source } => (path.clone(), source.to_string()),
        };
        GatewatchError::Report {
            path: path.display().to_string(),
            reason,
        }
    }
}

/// Parsed scanner handoff for one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReportRecord {
    /// Compute Engine task to poll
    pub ce_task_id: String,
    /// Server the analysis was submitted to
    pub server_url: String,
    /// Analyzed project key
    pub project_key: String,
    /// Dashboard URL for the rendered summary link
    pub dashboard_url: Option<String>,
    /// Direct task URL
    pub ce_task_url: Option<String>,
}

impl TaskReportRecord {
    /// Read and parse a task report file.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ReportError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&contents, path)
    }

    /// Parse report contents.
    ///
    /// Lines are `key=value` with `\n` or `\r\n` endings; a value may
    /// itself contain `=`, so splitting happens on the first occurrence
    /// only. Lines without a separator are skipped with a warning.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ReportError> {
        let mut ce_task_id = None;
        let mut server_url = None;
        let mut project_key = None;
        let mut dashboard_url = None;
        let mut ce_task_url = None;

        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(
                    path = %path.display(),
                    line,
                    "skipping task report line without '='"
                );
                continue;
            };

            match key {
                "ceTaskId" => ce_task_id = Some(value.to_string()),
                "serverUrl" => server_url = Some(value.to_string()),
                "projectKey" => project_key = Some(value.to_string()),
                "dashboardUrl" => dashboard_url = Some(value.to_string()),
                "ceTaskUrl" => ce_task_url = Some(value.to_string()),
                other => {
                    tracing::debug!(path = %path.display(), key = other, "ignoring unknown task report key");
                }
            }
        }

        let require = |value: Option<String>, key: &'static str| {
            value.ok_or(ReportError::MissingKey {
                path: path.to_path_buf(),
                key,
            })
        };

        Ok(Self {
            ce_task_id: require(ce_task_id, "ceTaskId")?,
            server_url: require(server_url, "serverUrl")?,
            project_key: require(project_key, "projectKey")?,
            dashboard_url,
            ce_task_url,
        })
    }
}

/// Locate task report files under the work dir.
///
/// The default subdirectory is capability-gated (current scanners write
/// under the new location, older ones under the legacy one). One level of
/// module subdirectories is searched to cover multi-module builds. The
/// result is sorted for a deterministic processing order.
#[must_use]
pub fn find_report_files(
    work_dir: &Path,
    caps: &CapabilitySet,
    override_dir: Option<&Path>,
) -> Vec<PathBuf> {
    let mut found = Vec::new();

    if let Some(dir) = override_dir {
        collect_reports_under(dir, &mut found);
    } else {
        let default_dir = if caps.report_at_new_default_location {
            NEW_DEFAULT_DIR
        } else {
            LEGACY_DEFAULT_DIR
        };

        let candidate = work_dir.join(default_dir).join(REPORT_FILE_NAME);
        if candidate.is_file() {
            found.push(candidate);
        }

        // Multi-module builds drop one report per module subdirectory.
        if let Ok(entries) = std::fs::read_dir(work_dir) {
            for entry in entries.flatten() {
                let module_report = entry.path().join(default_dir).join(REPORT_FILE_NAME);
                if module_report.is_file() {
                    found.push(module_report);
                }
            }
        }
    }

    found.sort();
    found.dedup();
    tracing::debug!(count = found.len(), "located task report files");
    found
}

fn collect_reports_under(dir: &Path, found: &mut Vec<PathBuf>) {
    let direct = dir.join(REPORT_FILE_NAME);
    if direct.is_file() {
        found.push(direct);
    }
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let nested = entry.path().join(REPORT_FILE_NAME);
            if nested.is_file() {
                found.push(nested);
            }
        }
    }
}
