//! Scanner process invocation and stderr triage.
//!
//! The scanner's stderr is the only channel its wrapper sees; everything
//! on it that is not a known-benign warning is surfaced as a
//! build-visible issue.

use crate::error::{Result, ScannerError};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;

/// Result of one scanner invocation.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOutcome {
    /// Stderr lines that represent real problems, surfaced to the build
    pub error_lines: Vec<String>,
    /// Advisory warnings produced by the pipeline itself
    pub warnings: Vec<String>,
}

/// Stderr noise every scanner toolchain emits on healthy runs.
fn benign_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\s*WARN(ING)?\b",
            r"^Picked up JAVA_TOOL_OPTIONS",
            r"^Picked up _JAVA_OPTIONS",
            r"^SLF4J: ",
            r"^OpenJDK .* warning",
            r"^\s*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid benign pattern"))
        .collect()
    })
}

/// True for stderr lines that are known toolchain noise.
#[must_use]
pub fn is_benign_warning(line: &str) -> bool {
    benign_patterns().iter().any(|p| p.is_match(line))
}

/// Render the property map as `-Dkey=value` scanner arguments.
///
/// A `None` value becomes `-Dkey=` (defined but empty), which tells the
/// scanner the field is settled and must not be prompted for.
#[must_use]
pub fn property_args(properties: &BTreeMap<String, Option<String>>) -> Vec<String> {
    properties
        .iter()
        .map(|(key, value)| match value {
            Some(v) => format!("-D{key}={v}"),
            None => format!("-D{key}="),
        })
        .collect()
}

/// Run the scanner binary and triage its stderr.
///
/// Non-benign stderr lines are collected into the outcome whether or not
/// the process succeeds; a non-zero exit is an error carrying their
/// count.
pub async fn run_scanner(
    binary: &Path,
    args: &[String],
    work_dir: &str,
) -> Result<AnalyzeOutcome> {
    tracing::info!(binary = %binary.display(), args = args.len(), "invoking scanner");

    let output = Command::new(binary)
        .args(args)
        .current_dir(work_dir)
        .output()
        .await
        .map_err(|source| ScannerError::Launch {
            binary: binary.to_path_buf(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let error_lines: Vec<String> = stderr
        .lines()
        .filter(|line| !is_benign_warning(line))
        .map(str::to_string)
        .collect();

    for line in &error_lines {
        tracing::error!(target: "scanner", "{line}");
    }

    if !output.status.success() {
        let code_display = match output.status.code() {
            Some(code) => format!("code {code}"),
            None => "a signal".to_string(),
        };
        return Err(ScannerError::ExecutionFailed {
            code_display,
            issue_count: error_lines.len(),
        });
    }

    tracing::info!(issues = error_lines.len(), "scanner finished");
    Ok(AnalyzeOutcome {
        error_lines,
        warnings: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_patterns() {
        assert!(is_benign_warning("WARN: Project baseDir is deprecated"));
        assert!(is_benign_warning("WARNING: An illegal reflective access"));
        assert!(is_benign_warning(
            "Picked up JAVA_TOOL_OPTIONS: -Xmx512m"
        ));
        assert!(is_benign_warning("SLF4J: Class path contains multiple bindings"));
        assert!(is_benign_warning("   "));
    }

    #[test]
    fn test_real_errors_are_not_benign() {
        assert!(!is_benign_warning("ERROR: Project not found"));
        assert!(!is_benign_warning(
            "java.lang.OutOfMemoryError: Java heap space"
        ));
        assert!(!is_benign_warning("Could not authenticate to server"));
    }

    #[test]
    fn test_property_args() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "analysis.host.url".to_string(),
            Some("https://analysis.example.com".to_string()),
        );
        properties.insert("analysis.password".to_string(), None);

        let args = property_args(&properties);
        assert_eq!(
            args,
            vec![
                "-Danalysis.host.url=https://analysis.example.com".to_string(),
                // Defined but empty: the scanner must not prompt for it.
                "-Danalysis.password=".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_scanner_collects_error_lines() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let script = tmp.path().join("scanner");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'WARN: deprecated option' 1>&2\necho 'ERROR: boom' 1>&2\nexit 0\n",
        )
        .expect("write stub scanner");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("make executable");
        }

        let outcome = run_scanner(&script, &[], &tmp.path().display().to_string())
            .await
            .expect("run stub scanner");

        assert_eq!(outcome.error_lines, vec!["ERROR: boom".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_scanner_nonzero_exit_fails() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let script = tmp.path().join("scanner");
        std::fs::write(&script, "#!/bin/sh\necho 'ERROR: bad' 1>&2\nexit 2\n")
            .expect("write stub scanner");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("make executable");
        }

        let err = run_scanner(&script, &[], &tmp.path().display().to_string())
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            ScannerError::ExecutionFailed { issue_count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let err = run_scanner(Path::new("/definitely/not/here/scanner"), &[], ".")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ScannerError::Launch { .. }));
    }
}
