//! Prepare phase: resolve endpoint, negotiate capabilities, stage the
//! scanner, and persist everything the later phases need.

use gatewatch_core::{
    capabilities, state_keys, CapabilitySet, EndpointKind, GatewatchError, PipelineConfig, Result,
    ServerVersion, StateStore,
};
use gatewatch_scanner::{properties as scanner_properties, ScannerSpec};
use gatewatch_server::{Credential, Endpoint, ServerClient};
use std::collections::BTreeMap;

/// Run the prepare phase.
pub async fn execute(config: &PipelineConfig, state: &StateStore) -> Result<()> {
    let endpoint = endpoint_from_config(config)?;
    let kind = endpoint.kind;

    // The server version gates everything downstream, so it is fetched
    // eagerly and persisted as the raw string it derives from.
    let client = ServerClient::new(endpoint.clone())?;
    let raw_version = client.fetch_server_version().await?;
    let version = ServerVersion::parse(&raw_version);
    if version.is_none() {
        tracing::warn!(version = %raw_version, "server reported an unparseable version");
    }
    let caps = capabilities(kind, version.as_ref());
    tracing::info!(version = %raw_version, ?caps, "capabilities negotiated");

    let spec = ScannerSpec::from_config(&config.scanner)?;
    spec.prepare(&config.scanner, state).await?;

    let properties = assemble_properties(&endpoint, &spec, config, &caps);

    state.set_string(state_keys::ENDPOINT, &endpoint.to_transfer_form()?)?;
    state.set_string(state_keys::SERVER_VERSION, &raw_version)?;
    state.set_string(state_keys::SCANNER_MODE, spec.mode_name())?;
    state.set_string(state_keys::REPORT_DIR, &config.scanner.work_dir)?;
    state.set_properties(&properties)?;

    tracing::info!(
        mode = spec.mode_name(),
        properties = properties.len(),
        "prepare phase complete"
    );
    Ok(())
}

/// Union of endpoint and scanner-mode properties, with capability-gated
/// extras: branch/PR parameters only where the server understands them,
/// and the secondary JDK only where the server will not ignore it.
fn assemble_properties(
    endpoint: &Endpoint,
    spec: &ScannerSpec,
    config: &PipelineConfig,
    caps: &CapabilitySet,
) -> BTreeMap<String, Option<String>> {
    let mut properties = endpoint.to_analysis_properties(caps);
    properties.extend(spec.to_properties());

    let branch_inputs = [
        (scanner_properties::BRANCH, &config.scanner.branch),
        (scanner_properties::PULL_REQUEST, &config.scanner.pull_request),
    ];
    for (key, value) in branch_inputs {
        if let Some(value) = value {
            if caps.branch_and_pr_analysis {
                properties.insert(key.to_string(), Some(value.clone()));
            } else {
                tracing::warn!(
                    value = %value,
                    "server does not support branch and pull request analysis, ignoring {key}"
                );
            }
        }
    }

    if let Some(jdk_home) = &config.scanner.jdk_home {
        if caps.ignores_secondary_jdk {
            tracing::info!(
                jdk_home = %jdk_home.display(),
                "server ignores a requested secondary JDK, dropping it"
            );
        } else {
            properties.insert(
                scanner_properties::JDK_HOME.to_string(),
                Some(jdk_home.display().to_string()),
            );
        }
    }

    properties
}

/// Build the endpoint from configuration, including proxy pickup from the
/// environment.
fn endpoint_from_config(config: &PipelineConfig) -> Result<Endpoint> {
    let kind = match config.server.kind.as_str() {
        "cloud" => EndpointKind::Cloud,
        "server" => EndpointKind::Server,
        other => {
            return Err(GatewatchError::Config(format!(
                "unknown endpoint kind '{other}' (expected server or cloud)"
            )))
        }
    };

    if config.server.url.trim().is_empty() {
        return Err(GatewatchError::Config(
            "server.url is required".to_string(),
        ));
    }

    let credential = Credential::from_parts(
        config.server.token.clone(),
        config.server.username.clone(),
        config.server.password.clone(),
    )?;

    Ok(Endpoint::new(
        kind,
        &config.server.url,
        credential,
        config.server.organization.clone(),
    )?)
}
