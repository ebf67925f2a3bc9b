//! Capability negotiation for version- and kind-gated server features.
//!
//! All version-dependent behavior in the pipeline funnels through the single
//! [`capabilities`] function, so call sites become lookups instead of ad hoc
//! version comparisons. The rules live in one table and each can be tested
//! independently at its boundary versions.

use crate::version::ServerVersion;
use serde::{Deserialize, Serialize};

/// Kind of analysis endpoint the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Hosted cloud service; features do not depend on a server version
    Cloud,
    /// Self-hosted server; features unlock by version threshold
    Server,
}

/// Identifies one negotiable server feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapabilityId {
    BranchAndPrAnalysis,
    NewReportLocation,
    TokenAuthProperty,
    IgnoresSecondaryJdk,
}

/// One row of the negotiation table.
struct CapabilityRule {
    id: CapabilityId,
    /// Minimum version unlocking the feature on server endpoints
    min_server_version: ServerVersion,
    /// Fixed answer for cloud endpoints, regardless of version
    on_cloud: bool,
}

/// The negotiation table. Extend by adding a row and a field on
/// [`CapabilitySet`].
const RULES: &[CapabilityRule] = &[
    CapabilityRule {
        id: CapabilityId::BranchAndPrAnalysis,
        min_server_version: ServerVersion {
            major: 7,
            minor: 2,
            patch: 0,
        },
        on_cloud: true,
    },
    CapabilityRule {
        id: CapabilityId::NewReportLocation,
        min_server_version: ServerVersion {
            major: 7,
            minor: 2,
            patch: 0,
        },
        on_cloud: true,
    },
    CapabilityRule {
        id: CapabilityId::TokenAuthProperty,
        min_server_version: ServerVersion {
            major: 10,
            minor: 0,
            patch: 0,
        },
        on_cloud: true,
    },
    CapabilityRule {
        id: CapabilityId::IgnoresSecondaryJdk,
        min_server_version: ServerVersion {
            major: 10,
            minor: 4,
            patch: 0,
        },
        on_cloud: false,
    },
];

/// Features usable against a given endpoint, derived (never persisted)
/// from the endpoint kind and the server's reported version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Branch and pull-request analysis parameters are understood
    pub branch_and_pr_analysis: bool,
    /// Scanner writes its task report under the new default location
    pub report_at_new_default_location: bool,
    /// Credentials are handed over via the token property instead of the
    /// legacy login property
    pub token_auth_property: bool,
    /// A requested secondary JDK is ignored by the server
    pub ignores_secondary_jdk: bool,
}

/// Derive the capability set for an endpoint.
///
/// An unknown or unparseable server version is treated as the oldest
/// supported release; a warning is logged rather than failing negotiation.
#[must_use]
pub fn capabilities(kind: EndpointKind, version: Option<&ServerVersion>) -> CapabilitySet {
    let effective = match version {
        Some(v) => *v,
        None => {
            tracing::warn!(
                "server version unknown or unparseable, negotiating as oldest supported"
            );
            ServerVersion::new(0, 0, 0)
        }
    };

    CapabilitySet {
        branch_and_pr_analysis: enabled(CapabilityId::BranchAndPrAnalysis, kind, effective),
        report_at_new_default_location: enabled(CapabilityId::NewReportLocation, kind, effective),
        token_auth_property: enabled(CapabilityId::TokenAuthProperty, kind, effective),
        ignores_secondary_jdk: enabled(CapabilityId::IgnoresSecondaryJdk, kind, effective),
    }
}

fn enabled(id: CapabilityId, kind: EndpointKind, version: ServerVersion) -> bool {
    let rule = RULES
        .iter()
        .find(|r| r.id == id)
        .expect("every capability id has a table row");

    match kind {
        EndpointKind::Cloud => rule.on_cloud,
        EndpointKind::Server => version >= rule.min_server_version,
    }
}
