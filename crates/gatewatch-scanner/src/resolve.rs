//! Scanner binary resolution.
//!
//! Resolution order: explicit configured path, then the
//! `GATEWATCH_SCANNER_HOME` environment override, then a one-shot download
//! when a URL is configured, then the embedded default location. The
//! resolved path is persisted by the prepare phase; the analyze phase
//! falls back to the embedded default when that state is gone.

use crate::error::{Result, ScannerError};
use gatewatch_core::ScannerConfig;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an unpacked scanner home.
pub const SCANNER_HOME_ENV: &str = "GATEWATCH_SCANNER_HOME";

/// Embedded default location of the scanner binary under the work dir.
#[must_use]
pub fn default_binary_path(work_dir: &str) -> PathBuf {
    Path::new(work_dir)
        .join(".gatewatch")
        .join("scanner")
        .join("bin")
        .join("scanner")
}

/// Resolve the scanner binary for the prepare phase.
pub async fn resolve_scanner_binary(config: &ScannerConfig) -> Result<PathBuf> {
    // 1. Explicit path from configuration wins, but must exist.
    if let Some(path) = &config.binary_path {
        if !path.exists() {
            return Err(ScannerError::BinaryNotFound { path: path.clone() });
        }
        tracing::debug!(path = %path.display(), "using configured scanner binary");
        return Ok(path.clone());
    }

    // 2. Environment override pointing at an unpacked scanner home.
    if let Ok(home) = std::env::var(SCANNER_HOME_ENV) {
        if !home.trim().is_empty() {
            let candidate = Path::new(&home).join("bin").join("scanner");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "using scanner from {SCANNER_HOME_ENV}");
                return Ok(candidate);
            }
            tracing::warn!(
                home = %home,
                "{SCANNER_HOME_ENV} is set but contains no bin/scanner, ignoring"
            );
        }
    }

    // 3. One-shot download when a URL is configured.
    if let Some(url) = &config.download_url {
        return download_scanner(url, &config.work_dir).await;
    }

    // 4. Embedded default; analyze reports a launch error if it is absent
    // at invocation time.
    let fallback = default_binary_path(&config.work_dir);
    tracing::debug!(path = %fallback.display(), "using embedded default scanner location");
    Ok(fallback)
}

/// Download the scanner binary into the embedded default location.
async fn download_scanner(url: &str, work_dir: &str) -> Result<PathBuf> {
    let target = default_binary_path(work_dir);

    if target.exists() {
        tracing::debug!(path = %target.display(), "scanner already downloaded");
        return Ok(target);
    }

    tracing::info!(url, "downloading scanner binary");
    let response = reqwest::get(url).await.map_err(|e| ScannerError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScannerError::Download {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }

    let bytes = response.bytes().await.map_err(|e| ScannerError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&target).await?.permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    tracing::info!(path = %target.display(), bytes = bytes.len(), "scanner downloaded");
    Ok(target)
}
