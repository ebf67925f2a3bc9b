//! REST client for the analysis server.
//!
//! Wraps every request in the inner transport retry policy: transient
//! failures (connection errors, 5xx, 429) are retried a fixed number of
//! times with a fixed backoff before escalating. This policy is separate
//! from the completion-poll budget in [`crate::poller`].

use crate::endpoint::{Credential, Endpoint};
use crate::models::{
    CeTask, CeTaskResponse, Measure, MeasuresResponse, Metric, MetricsPage, ProjectStatus,
    ProjectStatusResponse,
};
use gatewatch_core::{CapabilitySet, EndpointKind, GatewatchError};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Metrics page size used during catalog accumulation.
const METRICS_PAGE_SIZE: u32 = 500;

/// Hard cap on metric pages, guarding against a server that misreports
/// its total.
const METRICS_MAX_PAGES: u32 = 20;

/// Errors from the server connection layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Endpoint inputs were unusable
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport failed and stayed failed through the retry budget
    #[error("could not reach {url}: {source}")]
    Request {
        /// Requested URL
        url: String,
        /// Final transport error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response body was not what the wire model expects
    #[error("unexpected payload from {url}: {reason}")]
    Payload {
        /// Requested URL
        url: String,
        /// Parse failure description
        reason: String,
    },
}

impl From<ServerError> for GatewatchError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidEndpoint(msg) => GatewatchError::Config(msg),
            other => GatewatchError::Transport(other.to_string()),
        }
    }
}

/// Inner transport retry policy: fixed attempt count, fixed backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// True for statuses worth retrying at the transport layer.
fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Client over one endpoint, carrying auth, proxy and the transport retry.
#[derive(Debug)]
pub struct ServerClient {
    endpoint: Endpoint,
    http: reqwest::Client,
    retry: RetryPolicy,
    use_bearer: bool,
}

impl ServerClient {
    /// Build a client for an endpoint.
    ///
    /// Until capabilities are known, bearer auth is assumed only for cloud
    /// endpoints; [`Self::with_capabilities`] upgrades a server client once
    /// the version has been negotiated.
    pub fn new(endpoint: Endpoint) -> Result<Self, ServerError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = &endpoint.proxy {
            let proxy = reqwest::Proxy::all(&proxy.url).map_err(|e| {
                ServerError::InvalidEndpoint(format!("bad proxy URL {}: {e}", proxy.url))
            })?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().map_err(|e| {
            ServerError::InvalidEndpoint(format!("failed to create HTTP client: {e}"))
        })?;

        let use_bearer = endpoint.kind == EndpointKind::Cloud;
        Ok(Self {
            endpoint,
            http,
            retry: RetryPolicy::default(),
            use_bearer,
        })
    }

    /// Apply negotiated capabilities (switches token credentials from
    /// legacy token-as-username basic auth to a bearer header).
    #[must_use]
    pub fn with_capabilities(mut self, caps: &CapabilitySet) -> Self {
        self.use_bearer = caps.token_auth_property;
        self
    }

    /// Override the transport retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// `GET /api/server/version`: the plain version string.
    pub async fn fetch_server_version(&self) -> Result<String, ServerError> {
        let url = self.url("api/server/version");
        let response = self.get_with_retry(&url, &[]).await?;
        let body = response.text().await.map_err(|e| ServerError::Payload {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(body.trim().to_string())
    }

    /// `GET /api/ce/task`: one Compute Engine task with its warnings.
    pub async fn fetch_task(&self, task_id: &str) -> Result<CeTask, ServerError> {
        let url = self.url("api/ce/task");
        let response: CeTaskResponse = self
            .get_json(&url, &[("id", task_id), ("additionalFields", "warnings")])
            .await?;
        Ok(response.task)
    }

    /// `GET /api/qualitygates/project_status`: quality gate for an
    /// analysis.
    pub async fn fetch_project_status(
        &self,
        analysis_id: &str,
    ) -> Result<ProjectStatus, ServerError> {
        let url = self.url("api/qualitygates/project_status");
        let response: ProjectStatusResponse =
            self.get_json(&url, &[("analysisId", analysis_id)]).await?;
        Ok(response.project_status)
    }

    /// `GET /api/metrics/search`: the full metric catalog, accumulated
    /// across pages.
    pub async fn fetch_all_metrics(&self) -> Result<Vec<Metric>, ServerError> {
        let url = self.url("api/metrics/search");
        let page_size = METRICS_PAGE_SIZE.to_string();
        let mut metrics = Vec::new();

        for page_number in 1..=METRICS_MAX_PAGES {
            let page_param = page_number.to_string();
            let page: MetricsPage = self
                .get_json(
                    &url,
                    &[("f", "name"), ("p", &page_param), ("ps", &page_size)],
                )
                .await?;

            let fetched = page.metrics.len();
            metrics.extend(page.metrics);

            if fetched == 0 || metrics.len() as u32 >= page.total {
                break;
            }
        }

        tracing::debug!(count = metrics.len(), "fetched metric catalog");
        Ok(metrics)
    }

    /// `GET /api/measures/component`: requested measures of a component,
    /// optionally scoped to a branch or pull request.
    pub async fn fetch_measures(
        &self,
        component: &str,
        branch: Option<&str>,
        pull_request: Option<&str>,
        metric_keys: &[&str],
    ) -> Result<Vec<Measure>, ServerError> {
        let url = self.url("api/measures/component");
        let keys = metric_keys.join(",");
        let mut query: Vec<(&str, &str)> =
            vec![("component", component), ("metricKeys", &keys)];
        if let Some(branch) = branch {
            query.push(("branch", branch));
        }
        if let Some(pull_request) = pull_request {
            query.push(("pullRequest", pull_request));
        }

        let response: MeasuresResponse = self.get_json(&url, &query).await?;
        Ok(response.component.measures)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint.base_url)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let auth = self.endpoint.auth();
        let is_token = matches!(self.endpoint.credential, Credential::Token { .. });

        if is_token && self.use_bearer {
            request.bearer_auth(&auth.principal)
        } else {
            // Legacy token auth is basic auth with the token as username
            // and an empty password, same as an absent user password.
            request.basic_auth(&auth.principal, Some(&auth.secret))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServerError> {
        let response = self.get_with_retry(url, query).await?;
        response.json().await.map_err(|e| ServerError::Payload {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Perform a GET, absorbing transient failures per the retry policy.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ServerError> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            let request = self.apply_auth(self.http.get(url).query(query));

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(512)
                        .collect::<String>();
                    let error = ServerError::Http {
                        status: status.as_u16(),
                        url: url.to_string(),
                        body,
                    };

                    if !is_retryable_status(status.as_u16()) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    last_error = Some(ServerError::Request {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }

            if attempt < self.retry.max_attempts {
                tracing::warn!(
                    url,
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    "request failed, retrying after {:?}",
                    self.retry.delay
                );
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ServerError::Payload {
            url: url.to_string(),
            reason: "retry loop ended without an error".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::capabilities;

    fn endpoint(kind: EndpointKind) -> Endpoint {
        Endpoint::new(
            kind,
            "https://analysis.example.com",
            Credential::Token {
                token: "squ_abc".to_string(),
            },
            None,
        )
        .expect("build endpoint")
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_bearer_defaults_by_kind() {
        let cloud = ServerClient::new(endpoint(EndpointKind::Cloud)).expect("client");
        assert!(cloud.use_bearer);

        let server = ServerClient::new(endpoint(EndpointKind::Server)).expect("client");
        assert!(!server.use_bearer);
    }

    #[test]
    fn test_capabilities_switch_to_bearer() {
        let caps = capabilities(
            EndpointKind::Server,
            gatewatch_core::ServerVersion::parse("10.0.0").as_ref(),
        );
        let client = ServerClient::new(endpoint(EndpointKind::Server))
            .expect("client")
            .with_capabilities(&caps);
        assert!(client.use_bearer);
    }

    #[test]
    fn test_url_join() {
        let client = ServerClient::new(endpoint(EndpointKind::Server)).expect("client");
        assert_eq!(
            client.url("api/server/version"),
            "https://analysis.example.com/api/server/version"
        );
    }

    #[test]
    fn test_server_error_maps_to_taxonomy() {
        let config: GatewatchError = ServerError::InvalidEndpoint("no url".to_string()).into();
        assert!(config.is_config());

        let transport: GatewatchError = ServerError::Http {
            status: 503,
            url: "u".to_string(),
            body: String::new(),
        }
        .into();
        assert!(matches!(transport, GatewatchError::Transport(_)));
    }
}
