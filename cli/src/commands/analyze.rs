//! Analyze phase: reconstruct the scanner from persisted state, invoke
//! it, and re-persist the property map with secrets sanitized.

use crate::host;
use gatewatch_core::{state_keys, PipelineConfig, Result, StateStore};
use gatewatch_scanner::ScannerSpec;
use gatewatch_server::endpoint::properties as endpoint_properties;
use std::collections::BTreeMap;

/// Placeholder written over secret property values after the scanner ran.
const SECRET_MASK: &str = "***";

/// Run the analyze phase.
pub async fn execute(config: &PipelineConfig, state: &StateStore) -> Result<()> {
    let mode = state.require_string(state_keys::SCANNER_MODE)?;
    let spec = ScannerSpec::from_mode(&mode, &config.scanner)?;

    let properties = state.get_properties()?.unwrap_or_else(|| {
        tracing::warn!("no property map persisted by prepare, running with an empty one");
        BTreeMap::new()
    });

    let outcome = spec.analyze(&config.scanner, state, &properties).await?;

    for line in &outcome.error_lines {
        host::build_issue(line);
    }
    for warning in &outcome.warnings {
        host::build_warning(warning);
    }

    // The property map outlives this process in shared build state;
    // credentials must not.
    state.set_properties(&sanitize_properties(&properties))?;

    tracing::info!(mode = spec.mode_name(), "analyze phase complete");
    Ok(())
}

/// Mask secret-bearing values, leaving explicit nulls and non-secret
/// entries untouched.
fn sanitize_properties(
    properties: &BTreeMap<String, Option<String>>,
) -> BTreeMap<String, Option<String>> {
    properties
        .iter()
        .map(|(key, value)| {
            let is_secret = key == endpoint_properties::TOKEN
                || key == endpoint_properties::PASSWORD;
            let sanitized = match value {
                Some(_) if is_secret => Some(SECRET_MASK.to_string()),
                other => other.clone(),
            };
            (key.clone(), sanitized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_masks_token_and_password() {
        let mut properties = BTreeMap::new();
        properties.insert(
            endpoint_properties::TOKEN.to_string(),
            Some("squ_abc".to_string()),
        );
        properties.insert(
            endpoint_properties::PASSWORD.to_string(),
            Some("hunter2".to_string()),
        );
        properties.insert(
            endpoint_properties::HOST_URL.to_string(),
            Some("https://analysis.example.com".to_string()),
        );

        let sanitized = sanitize_properties(&properties);
        assert_eq!(
            sanitized[endpoint_properties::TOKEN],
            Some(SECRET_MASK.to_string())
        );
        assert_eq!(
            sanitized[endpoint_properties::PASSWORD],
            Some(SECRET_MASK.to_string())
        );
        assert_eq!(
            sanitized[endpoint_properties::HOST_URL],
            Some("https://analysis.example.com".to_string())
        );
    }

    #[test]
    fn test_sanitize_keeps_explicit_nulls() {
        let mut properties = BTreeMap::new();
        properties.insert(endpoint_properties::PASSWORD.to_string(), None);

        let sanitized = sanitize_properties(&properties);
        // A null password stays null: "absent" must remain distinguishable
        // from "masked".
        assert_eq!(sanitized[endpoint_properties::PASSWORD], None);
    }
}
