//! Build-visible side effects.
//!
//! The pipeline host's attachment/variable APIs are thin wrappers around
//! the filesystem and the process exit code; this module is the single
//! place that touches them.

use gatewatch_core::Result;
use std::path::{Path, PathBuf};

/// File the build summary attachment is written to, under the work dir.
pub const SUMMARY_FILE: &str = "summary.html";

/// Write the per-build summary attachment and return its path.
pub fn write_summary(work_dir: &str, html: &str) -> Result<PathBuf> {
    let path = Path::new(work_dir).join(".gatewatch").join(SUMMARY_FILE);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, html)?;
    tracing::info!(path = %path.display(), "build summary written");
    Ok(path)
}

/// Surface a scanner-reported issue on the build log.
pub fn build_issue(line: &str) {
    tracing::error!(target: "build", "{line}");
}

/// Surface a pipeline warning on the build log.
pub fn build_warning(message: &str) {
    tracing::warn!(target: "build", "{message}");
}
