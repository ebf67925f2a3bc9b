//! Immutable connection descriptor for the analysis server.
//!
//! An [`Endpoint`] is built once in the prepare phase from host-provided
//! inputs, serialized to a string for the process boundary, and
//! reconstructed verbatim by the analyze and publish phases. It carries
//! exactly one credential form and, when the environment says so, a
//! forwarding proxy.

use crate::client::ServerError;
use gatewatch_core::{CapabilitySet, EndpointKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property keys under which the connection is handed to the scanner.
pub mod properties {
    /// Analysis server base URL
    pub const HOST_URL: &str = "analysis.host.url";
    /// Token credential (modern servers and cloud)
    pub const TOKEN: &str = "analysis.token";
    /// Login credential (legacy servers)
    pub const LOGIN: &str = "analysis.login";
    /// Password paired with a login credential
    pub const PASSWORD: &str = "analysis.password";
    /// Organization key (cloud)
    pub const ORGANIZATION: &str = "analysis.organization";
}

/// Credential attached to an endpoint. Exactly one form is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Opaque authentication token
    Token {
        /// The token value
        token: String,
    },
    /// Username with an optional password
    UserPassword {
        /// Login name
        username: String,
        /// Password; `None` when the host supplied none (or a blank one)
        password: Option<String>,
    },
}

impl Credential {
    /// Build a credential from raw host inputs.
    ///
    /// A non-empty token wins over username/password when both are given.
    /// An empty or blank password collapses to `None` so that "absent"
    /// never leaks downstream as an empty-but-present secret.
    pub fn from_parts(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ServerError> {
        let token = token.filter(|t| !t.trim().is_empty());
        let username = username.filter(|u| !u.trim().is_empty());
        let password = password.filter(|p| !p.trim().is_empty());

        if let Some(token) = token {
            return Ok(Self::Token { token });
        }
        if let Some(username) = username {
            return Ok(Self::UserPassword { username, password });
        }
        Err(ServerError::InvalidEndpoint(
            "no credential provided: set a token or a username".to_string(),
        ))
    }
}

/// Normalized authentication pair derived from a credential.
///
/// `secret` is always a real string; an absent password renders as `""`,
/// never a null, wherever it is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    /// Token or login name
    pub principal: String,
    /// Password, or empty when none applies
    pub secret: String,
}

/// Forwarding proxy resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.corp:3128`
    pub url: String,
}

/// Immutable connection descriptor: kind, URL, credential, organization
/// and proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Cloud or self-hosted server
    pub kind: EndpointKind,
    /// Base URL with any trailing slash stripped
    pub base_url: String,
    /// The single active credential
    pub credential: Credential,
    /// Organization key, required by cloud endpoints
    pub organization: Option<String>,
    /// Forwarding proxy, when one applies to this URL
    pub proxy: Option<ProxyConfig>,
}

impl Endpoint {
    /// Construct an endpoint from host inputs.
    ///
    /// Strips trailing slashes from the URL and reads proxy configuration
    /// from the environment, honoring `NO_PROXY` exclusion rules.
    pub fn new(
        kind: EndpointKind,
        base_url: impl Into<String>,
        credential: Credential,
        organization: Option<String>,
    ) -> Result<Self, ServerError> {
        let base_url: String = base_url.into();
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServerError::InvalidEndpoint(
                "server URL must not be empty".to_string(),
            ));
        }

        let proxy = proxy_from_env(&base_url);
        if let Some(p) = &proxy {
            tracing::debug!(proxy = %p.url, "using forwarding proxy from environment");
        }

        Ok(Self {
            kind,
            base_url,
            credential,
            organization: organization.filter(|o| !o.trim().is_empty()),
            proxy,
        })
    }

    /// Normalized `{principal, secret}` pair for HTTP authentication.
    #[must_use]
    pub fn auth(&self) -> Auth {
        match &self.credential {
            Credential::Token { token } => Auth {
                principal: token.clone(),
                secret: String::new(),
            },
            Credential::UserPassword { username, password } => Auth {
                principal: username.clone(),
                secret: password.clone().unwrap_or_default(),
            },
        }
    }

    /// Emit the connection as a flat property map for the scanner.
    ///
    /// The key carrying the principal is capability-gated: modern servers
    /// (and cloud) take the token key, legacy servers the login key. The
    /// password key is present with an explicit `None` when no password
    /// applies, which tells the scanner to ignore it rather than prompt.
    #[must_use]
    pub fn to_analysis_properties(
        &self,
        caps: &CapabilitySet,
    ) -> BTreeMap<String, Option<String>> {
        let mut map = BTreeMap::new();
        map.insert(
            properties::HOST_URL.to_string(),
            Some(self.base_url.clone()),
        );
        if let Some(organization) = &self.organization {
            map.insert(
                properties::ORGANIZATION.to_string(),
                Some(organization.clone()),
            );
        }

        let auth = self.auth();
        if caps.token_auth_property {
            map.insert(properties::TOKEN.to_string(), Some(auth.principal));
            map.insert(properties::PASSWORD.to_string(), None);
        } else {
            map.insert(properties::LOGIN.to_string(), Some(auth.principal));
            let password = match &self.credential {
                Credential::UserPassword {
                    password: Some(p), ..
                } => Some(p.clone()),
                _ => None,
            };
            map.insert(properties::PASSWORD.to_string(), password);
        }

        map
    }

    /// Serialize for transfer across a process boundary.
    pub fn to_transfer_form(&self) -> Result<String, ServerError> {
        serde_json::to_string(self).map_err(|e| {
            ServerError::InvalidEndpoint(format!("endpoint not serializable: {e}"))
        })
    }

    /// Reconstruct an endpoint persisted by a prior phase.
    pub fn from_transfer_form(raw: &str) -> Result<Self, ServerError> {
        serde_json::from_str(raw)
            .map_err(|e| ServerError::InvalidEndpoint(format!("bad endpoint transfer form: {e}")))
    }
}

/// Resolve a forwarding proxy for `target_url` from the environment.
///
/// `HTTPS_PROXY`/`HTTP_PROXY` (and lowercase variants) are consulted by
/// target scheme; `NO_PROXY` entries are hostname suffixes with an
/// optional exact port. Empty and `*` entries never match.
fn proxy_from_env(target_url: &str) -> Option<ProxyConfig> {
    let target = reqwest::Url::parse(target_url).ok()?;

    let proxy_url = if target.scheme() == "https" {
        env_var("HTTPS_PROXY").or_else(|| env_var("https_proxy"))
    } else {
        env_var("HTTP_PROXY").or_else(|| env_var("http_proxy"))
    }?;

    let no_proxy = env_var("NO_PROXY")
        .or_else(|| env_var("no_proxy"))
        .unwrap_or_default();
    let host = target.host_str()?;
    let port = target.port_or_known_default();

    if no_proxy_excludes(&no_proxy, host, port) {
        tracing::debug!(host, "target excluded from proxying by NO_PROXY");
        return None;
    }

    Some(ProxyConfig { url: proxy_url })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// True when one of the comma-separated `NO_PROXY` rules matches the
/// target host. Matching is by hostname suffix plus optional exact port.
fn no_proxy_excludes(no_proxy: &str, host: &str, port: Option<u16>) -> bool {
    no_proxy
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && *entry != "*")
        .any(|entry| {
            let (entry_host, entry_port) = match entry.rsplit_once(':') {
                Some((h, p)) => match p.parse::<u16>() {
                    Ok(parsed) => (h, Some(parsed)),
                    Err(_) => (entry, None),
                },
                None => (entry, None),
            };

            let entry_host = entry_host.trim_start_matches('.');
            let host_matches =
                host == entry_host || host.ends_with(&format!(".{entry_host}"));
            let port_matches = match entry_port {
                Some(p) => port == Some(p),
                None => true,
            };

            host_matches && port_matches
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::{capabilities, ServerVersion};

    fn token_endpoint() -> Endpoint {
        Endpoint::new(
            EndpointKind::Server,
            "https://analysis.example.com/",
            Credential::Token {
                token: "squ_abc123".to_string(),
            },
            None,
        )
        .expect("build endpoint")
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let endpoint = token_endpoint();
        assert_eq!(endpoint.base_url, "https://analysis.example.com");
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = Endpoint::new(
            EndpointKind::Server,
            "   ",
            Credential::Token {
                token: "t".to_string(),
            },
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_token_wins_over_user_password() {
        let credential = Credential::from_parts(
            Some("squ_abc".to_string()),
            Some("alice".to_string()),
            Some("hunter2".to_string()),
        )
        .expect("build credential");
        assert_eq!(
            credential,
            Credential::Token {
                token: "squ_abc".to_string()
            }
        );
    }

    #[test]
    fn test_blank_password_collapses_to_none() {
        let credential =
            Credential::from_parts(None, Some("alice".to_string()), Some("   ".to_string()))
                .expect("build credential");
        assert_eq!(
            credential,
            Credential::UserPassword {
                username: "alice".to_string(),
                password: None,
            }
        );
    }

    #[test]
    fn test_no_credential_rejected() {
        assert!(Credential::from_parts(None, None, Some("p".to_string())).is_err());
    }

    #[test]
    fn test_auth_never_yields_nulls() {
        let auth = token_endpoint().auth();
        assert_eq!(auth.principal, "squ_abc123");
        assert_eq!(auth.secret, "");

        let endpoint = Endpoint::new(
            EndpointKind::Server,
            "https://analysis.example.com",
            Credential::UserPassword {
                username: "alice".to_string(),
                password: None,
            },
            None,
        )
        .expect("build endpoint");
        assert_eq!(endpoint.auth().secret, "");
    }

    #[test]
    fn test_properties_modern_server_uses_token_key() {
        let caps = capabilities(
            EndpointKind::Server,
            ServerVersion::parse("10.0.0").as_ref(),
        );
        let map = token_endpoint().to_analysis_properties(&caps);

        assert_eq!(
            map.get(properties::TOKEN),
            Some(&Some("squ_abc123".to_string()))
        );
        assert!(!map.contains_key(properties::LOGIN));
        // Explicit null, not merely absent.
        assert_eq!(map.get(properties::PASSWORD), Some(&None));
    }

    #[test]
    fn test_properties_legacy_server_uses_login_key() {
        let caps = capabilities(
            EndpointKind::Server,
            ServerVersion::parse("9.9.0").as_ref(),
        );
        let map = token_endpoint().to_analysis_properties(&caps);

        assert_eq!(
            map.get(properties::LOGIN),
            Some(&Some("squ_abc123".to_string()))
        );
        assert!(!map.contains_key(properties::TOKEN));
        assert_eq!(map.get(properties::PASSWORD), Some(&None));
    }

    #[test]
    fn test_properties_legacy_password_kept() {
        let caps = capabilities(
            EndpointKind::Server,
            ServerVersion::parse("9.9.0").as_ref(),
        );
        let endpoint = Endpoint::new(
            EndpointKind::Server,
            "https://analysis.example.com",
            Credential::UserPassword {
                username: "alice".to_string(),
                password: Some("hunter2".to_string()),
            },
            None,
        )
        .expect("build endpoint");

        let map = endpoint.to_analysis_properties(&caps);
        assert_eq!(map.get(properties::LOGIN), Some(&Some("alice".to_string())));
        assert_eq!(
            map.get(properties::PASSWORD),
            Some(&Some("hunter2".to_string()))
        );
    }

    #[test]
    fn test_properties_organization_included() {
        let endpoint = Endpoint::new(
            EndpointKind::Cloud,
            "https://cloud.example.com",
            Credential::Token {
                token: "t".to_string(),
            },
            Some("my-org".to_string()),
        )
        .expect("build endpoint");
        let caps = capabilities(EndpointKind::Cloud, None);

        let map = endpoint.to_analysis_properties(&caps);
        assert_eq!(
            map.get(properties::ORGANIZATION),
            Some(&Some("my-org".to_string()))
        );
    }

    #[test]
    fn test_transfer_form_round_trip() {
        let endpoint = Endpoint::new(
            EndpointKind::Cloud,
            "https://cloud.example.com",
            Credential::UserPassword {
                username: "alice".to_string(),
                password: Some("hunter2".to_string()),
            },
            Some("my-org".to_string()),
        )
        .expect("build endpoint");

        let raw = endpoint.to_transfer_form().expect("serialize");
        let restored = Endpoint::from_transfer_form(&raw).expect("deserialize");
        assert_eq!(restored, endpoint);
    }

    #[test]
    fn test_from_transfer_form_rejects_garbage() {
        assert!(Endpoint::from_transfer_form("{not json").is_err());
    }

    #[test]
    fn test_no_proxy_suffix_matching() {
        assert!(no_proxy_excludes(
            "example.com",
            "analysis.example.com",
            Some(443)
        ));
        assert!(no_proxy_excludes(
            ".example.com",
            "analysis.example.com",
            Some(443)
        ));
        assert!(no_proxy_excludes("example.com", "example.com", Some(443)));
        // Suffix of the hostname, not substring anywhere.
        assert!(!no_proxy_excludes(
            "example.com",
            "example.com.evil.net",
            Some(443)
        ));
        assert!(!no_proxy_excludes("other.com", "analysis.example.com", None));
    }

    #[test]
    fn test_no_proxy_port_matching() {
        assert!(no_proxy_excludes(
            "example.com:9000",
            "analysis.example.com",
            Some(9000)
        ));
        assert!(!no_proxy_excludes(
            "example.com:9000",
            "analysis.example.com",
            Some(443)
        ));
    }

    #[test]
    fn test_no_proxy_empty_and_wildcard_never_match() {
        assert!(!no_proxy_excludes("", "analysis.example.com", None));
        assert!(!no_proxy_excludes("*", "analysis.example.com", None));
        assert!(!no_proxy_excludes(" , ,*", "analysis.example.com", None));
    }

    #[test]
    fn test_no_proxy_multiple_entries() {
        let rules = "localhost, .internal.net ,example.com:9000";
        assert!(no_proxy_excludes(rules, "localhost", Some(80)));
        assert!(no_proxy_excludes(rules, "ci.internal.net", Some(443)));
        assert!(no_proxy_excludes(rules, "analysis.example.com", Some(9000)));
        assert!(!no_proxy_excludes(rules, "analysis.example.com", Some(443)));
    }
}
