//! Publish phase: locate task reports, poll each analysis to completion,
//! fetch and render its quality gate, and reduce everything into one
//! build-level outcome.
//!
//! Analyses are mutually independent, so their polling and fetching runs
//! concurrently within a bounded window; the worst-status aggregate is
//! reduced serially once every outcome is collected.

use crate::host;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use gatewatch_core::{
    capabilities, state_keys, GatewatchError, PipelineConfig, Result, ServerVersion, StateStore,
};
use gatewatch_report::{
    find_report_files, render, MetricCatalog, RenderContext, TaskReportRecord,
    CHANGE_SUMMARY_METRICS,
};
use gatewatch_scanner::properties as scanner_properties;
use gatewatch_server::{
    models::{CeTask, GateStatus, Measure, Metric, ProjectStatus},
    poller::{wait_for_completion, PollError, PollPolicy, TaskSource},
    Endpoint, ServerClient, ServerError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Aggregate build property value when every known gate passed.
pub const GATE_OK: &str = "ok";
/// Aggregate build property value when any gate failed.
pub const GATE_FAILED: &str = "failed";

/// Everything the publish phase needs from the server, as a seam so the
/// per-analysis flow is testable with scripted servers.
#[async_trait]
pub trait AnalysisServer: Send + Sync {
    /// Current snapshot of a Compute Engine task.
    async fn fetch_task(&self, task_id: &str) -> std::result::Result<CeTask, ServerError>;
    /// Quality gate of a stored analysis.
    async fn fetch_project_status(
        &self,
        analysis_id: &str,
    ) -> std::result::Result<ProjectStatus, ServerError>;
    /// Requested measures of a component, optionally scoped to a branch
    /// or pull request.
    async fn fetch_measures(
        &self,
        component: &str,
        branch: Option<&str>,
        pull_request: Option<&str>,
        metric_keys: &[&str],
    ) -> std::result::Result<Vec<Measure>, ServerError>;
    /// The full metric catalog.
    async fn fetch_all_metrics(&self) -> std::result::Result<Vec<Metric>, ServerError>;
}

#[async_trait]
impl AnalysisServer for ServerClient {
    async fn fetch_task(&self, task_id: &str) -> std::result::Result<CeTask, ServerError> {
        ServerClient::fetch_task(self, task_id).await
    }

    async fn fetch_project_status(
        &self,
        analysis_id: &str,
    ) -> std::result::Result<ProjectStatus, ServerError> {
        ServerClient::fetch_project_status(self, analysis_id).await
    }

    async fn fetch_measures(
        &self,
        component: &str,
        branch: Option<&str>,
        pull_request: Option<&str>,
        metric_keys: &[&str],
    ) -> std::result::Result<Vec<Measure>, ServerError> {
        ServerClient::fetch_measures(self, component, branch, pull_request, metric_keys).await
    }

    async fn fetch_all_metrics(&self) -> std::result::Result<Vec<Metric>, ServerError> {
        ServerClient::fetch_all_metrics(self).await
    }
}

/// Adapts an [`AnalysisServer`] to the poller's narrower seam.
struct PollSource<'a, S: AnalysisServer>(&'a S);

#[async_trait]
impl<S: AnalysisServer> TaskSource for PollSource<'_, S> {
    async fn fetch_task(&self, task_id: &str) -> std::result::Result<CeTask, ServerError> {
        self.0.fetch_task(task_id).await
    }
}

/// Analysis scope restored from the persisted property map, narrowing
/// the measures fetch to the analyzed branch or pull request.
#[derive(Debug, Clone, Default)]
pub struct MeasureScope {
    /// Branch under analysis, when one was configured and supported
    pub branch: Option<String>,
    /// Pull request key under analysis
    pub pull_request: Option<String>,
}

impl MeasureScope {
    /// Extract the scope from a persisted property map.
    #[must_use]
    pub fn from_properties(
        properties: &std::collections::BTreeMap<String, Option<String>>,
    ) -> Self {
        let get = |key: &str| properties.get(key).cloned().flatten();
        Self {
            branch: get(scanner_properties::BRANCH),
            pull_request: get(scanner_properties::PULL_REQUEST),
        }
    }
}

/// Outcome of processing one task report file.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Report file this outcome belongs to
    pub report_path: PathBuf,
    /// Rendered summary section; `None` when the analysis timed out or
    /// failed before a gate was available
    pub section_html: Option<String>,
    /// True when the quality gate evaluated to a failing status
    pub gate_failed: bool,
    /// Warnings to surface on the build log (poll timeouts land here)
    pub warnings: Vec<String>,
    /// Fatal-for-this-analysis error; does not stop sibling analyses
    pub error: Option<GatewatchError>,
}

impl AnalysisOutcome {
    fn empty(report_path: PathBuf) -> Self {
        Self {
            report_path,
            section_html: None,
            gate_failed: false,
            warnings: vec![],
            error: None,
        }
    }
}

/// Run the publish phase.
pub async fn execute(config: &PipelineConfig, state: &StateStore) -> Result<()> {
    let endpoint = Endpoint::from_transfer_form(&state.require_string(state_keys::ENDPOINT)?)?;
    let version = state
        .get_string(state_keys::SERVER_VERSION)?
        .and_then(|raw| ServerVersion::parse(&raw));
    let caps = capabilities(endpoint.kind, version.as_ref());

    let client = ServerClient::new(endpoint)?.with_capabilities(&caps);

    let scope = MeasureScope::from_properties(&state.get_properties()?.unwrap_or_default());

    let work_dir = state
        .get_string(state_keys::REPORT_DIR)?
        .unwrap_or_else(|| config.scanner.work_dir.clone());
    let reports = find_report_files(
        Path::new(&work_dir),
        &caps,
        config.publish.report_dir.as_deref(),
    );
    if reports.is_empty() {
        return Err(GatewatchError::Config(format!(
            "no task report files found under {work_dir}; was the analyze phase run?"
        )));
    }

    // Fetched once, shared read-only across every analysis in the build.
    let catalog = match client.fetch_all_metrics().await {
        Ok(metrics) => MetricCatalog::new(metrics),
        Err(e) => {
            tracing::warn!("metric catalog unavailable, values render unformatted: {e}");
            MetricCatalog::default()
        }
    };

    let policy = PollPolicy {
        max_attempts: config.publish.poll_max_attempts,
        delay: Duration::from_millis(config.publish.poll_delay_ms),
    };

    let outcomes = run_analyses(
        &client,
        &reports,
        &policy,
        &catalog,
        &scope,
        config.publish.max_concurrent_analyses,
    )
    .await;

    // Serial reduction over the collected outcomes; the aggregate is
    // computed only once every per-analysis result is known.
    let aggregate = aggregate_gate(&outcomes);
    state.set_string(state_keys::QUALITY_GATE, aggregate)?;
    tracing::info!(aggregate, analyses = outcomes.len(), "quality gates aggregated");

    let mut sections = Vec::new();
    let mut first_error: Option<GatewatchError> = None;
    for outcome in outcomes {
        for warning in &outcome.warnings {
            host::build_warning(warning);
        }
        if let Some(error) = outcome.error {
            tracing::error!(report = %outcome.report_path.display(), "{error}");
            if first_error.is_none() {
                first_error = Some(error);
            }
        }
        if let Some(html) = outcome.section_html {
            sections.push(html);
        }
    }

    host::write_summary(&work_dir, &sections.join("\n"))?;

    match first_error {
        // The per-analysis failures were all surfaced above; the phase
        // itself fails with the first one.
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Process every report with a bounded concurrency window, returning
/// outcomes in deterministic (path) order.
pub async fn run_analyses<S: AnalysisServer>(
    server: &S,
    reports: &[PathBuf],
    policy: &PollPolicy,
    catalog: &MetricCatalog,
    scope: &MeasureScope,
    max_concurrent: usize,
) -> Vec<AnalysisOutcome> {
    let max_concurrent = max_concurrent.max(1);
    let mut futures = FuturesUnordered::new();
    let mut outcomes = Vec::new();

    for report in reports {
        futures.push(process_report(server, report.clone(), policy, catalog, scope));

        // Respect the concurrency window.
        while futures.len() >= max_concurrent {
            if let Some(outcome) = futures.next().await {
                outcomes.push(outcome);
            }
        }
    }

    while let Some(outcome) = futures.next().await {
        outcomes.push(outcome);
    }

    outcomes.sort_by(|a, b| a.report_path.cmp(&b.report_path));
    outcomes
}

/// Reduce collected outcomes to the build property value. Timeouts and
/// per-analysis errors do not count as a failing gate; only an evaluated
/// failing status does.
#[must_use]
pub fn aggregate_gate(outcomes: &[AnalysisOutcome]) -> &'static str {
    if outcomes.iter().any(|o| o.gate_failed) {
        GATE_FAILED
    } else {
        GATE_OK
    }
}

/// One analysis, start to finish: parse the report, poll the task, fetch
/// the gate and measures, render the section.
async fn process_report<S: AnalysisServer>(
    server: &S,
    report_path: PathBuf,
    policy: &PollPolicy,
    catalog: &MetricCatalog,
    scope: &MeasureScope,
) -> AnalysisOutcome {
    let mut outcome = AnalysisOutcome::empty(report_path);

    let record = match TaskReportRecord::load(&outcome.report_path) {
        Ok(record) => record,
        Err(e) => {
            outcome.error = Some(e.into());
            return outcome;
        }
    };

    let task = match wait_for_completion(&PollSource(server), &record.ce_task_id, policy).await {
        Ok(task) => task,
        Err(PollError::Timeout { task_id, attempts }) => {
            // Soft outcome: the section is omitted and the build goes on.
            outcome.warnings.push(format!(
                "quality gate for '{}' was not available after {attempts} polls of task {task_id}; \
                 skipping its summary",
                record.project_key
            ));
            return outcome;
        }
        Err(e) => {
            outcome.error = Some(e.into());
            return outcome;
        }
    };

    let Some(analysis_id) = task.analysis_id.clone() else {
        outcome.error = Some(GatewatchError::Transport(format!(
            "task {} completed without an analysis id",
            record.ce_task_id
        )));
        return outcome;
    };

    let status = match server.fetch_project_status(&analysis_id).await {
        Ok(status) => status,
        Err(e) => {
            outcome.error = Some(e.into());
            return outcome;
        }
    };

    let component = if task.component_key.is_empty() {
        record.project_key.clone()
    } else {
        task.component_key.clone()
    };

    // The "what changed" section is best-effort; a failed measure fetch
    // degrades to an empty section rather than failing the analysis.
    let measures = if status.status == GateStatus::Ok {
        let keys: Vec<&str> = CHANGE_SUMMARY_METRICS.iter().map(|(key, _)| *key).collect();
        match server
            .fetch_measures(
                &component,
                scope.branch.as_deref(),
                scope.pull_request.as_deref(),
                &keys,
            )
            .await
        {
            Ok(measures) => measures,
            Err(e) => {
                tracing::warn!(component = %component, "supplementary measures unavailable: {e}");
                vec![]
            }
        }
    } else {
        vec![]
    };

    let advisory = task
        .warnings
        .iter()
        .find(|warning| warning.to_lowercase().contains("deprecat"))
        .cloned();

    let project_name = if task.component_name.is_empty() {
        record.project_key.clone()
    } else {
        task.component_name.clone()
    };

    let context = RenderContext {
        project_name: Some(project_name.as_str()),
        dashboard_url: record.dashboard_url.as_deref(),
        advisory: advisory.as_deref(),
    };

    outcome.gate_failed = status.status.is_failed();
    outcome.section_html = Some(render(&status, &measures, catalog, &context));
    outcome
}
