//! Wire models for the analysis-server REST surface.
//!
//! All payloads are deserialized tolerantly: optional fields default so a
//! server omitting them (or adding new ones) never breaks the pipeline.

use serde::{Deserialize, Serialize};

/// Status of a Compute Engine task, server-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued, not picked up yet
    Pending,
    /// Being processed
    InProgress,
    /// Terminal: analysis stored, `analysis_id` available
    Success,
    /// Terminal: processing failed
    Failed,
    /// Terminal: canceled before completion
    Canceled,
}

impl TaskStatus {
    /// True for states the server will never leave.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    /// Wire spelling of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous server-side analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeTask {
    /// Task identifier
    pub id: String,
    /// Current status
    pub status: TaskStatus,
    /// Stored analysis id, present once the task succeeded
    #[serde(default)]
    pub analysis_id: Option<String>,
    /// Server-side failure message
    #[serde(default)]
    pub error_message: Option<String>,
    /// Key of the analyzed component
    #[serde(default)]
    pub component_key: String,
    /// Display name of the analyzed component
    #[serde(default)]
    pub component_name: String,
    /// Warnings attached to the task by the server
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Envelope of `GET /api/ce/task`.
#[derive(Debug, Clone, Deserialize)]
pub struct CeTaskResponse {
    /// The wrapped task
    pub task: CeTask,
}

/// Quality-gate evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    /// All conditions passed
    Ok,
    /// At least one warning-level condition fired
    Warn,
    /// At least one error-level condition fired
    Error,
    /// No gate configured for the project
    None,
}

impl GateStatus {
    /// True when the gate outcome should fail the build.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// One evaluated quality-gate condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Outcome for this condition
    pub status: GateStatus,
    /// Metric the condition evaluates
    pub metric_key: String,
    /// Comparator, e.g. `GT`
    #[serde(default)]
    pub comparator: Option<String>,
    /// Measured value
    #[serde(default)]
    pub actual_value: Option<String>,
    /// Threshold that fails the gate
    #[serde(default)]
    pub error_threshold: Option<String>,
    /// Threshold that warns
    #[serde(default)]
    pub warning_threshold: Option<String>,
}

/// Quality-gate result for one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Overall outcome
    pub status: GateStatus,
    /// Evaluated conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Envelope of `GET /api/qualitygates/project_status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusResponse {
    /// The wrapped status
    pub project_status: ProjectStatus,
}

/// Metric catalog entry with display hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Metric key, e.g. `new_coverage`
    pub key: String,
    /// Display name, e.g. `Coverage on New Code`
    #[serde(default)]
    pub name: String,
    /// Value type, e.g. `PERCENT`, `RATING`, `WORK_DUR`
    #[serde(default, rename = "type")]
    pub value_type: String,
    /// Domain grouping, e.g. `Coverage`
    #[serde(default)]
    pub domain: Option<String>,
}

/// One page of `GET /api/metrics/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsPage {
    /// Metrics on this page
    #[serde(default)]
    pub metrics: Vec<Metric>,
    /// Total number of metrics across all pages
    #[serde(default)]
    pub total: u32,
    /// Page number (1-based)
    #[serde(default)]
    pub p: u32,
    /// Page size
    #[serde(default)]
    pub ps: u32,
}

/// A measured value, either current or for the new-code period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Metric key
    pub metric: String,
    /// Current value
    #[serde(default)]
    pub value: Option<String>,
    /// New-code period value
    #[serde(default)]
    pub period: Option<PeriodValue>,
}

impl Measure {
    /// The effective value: the current one, else the period one.
    #[must_use]
    pub fn effective_value(&self) -> Option<&str> {
        self.value
            .as_deref()
            .or_else(|| self.period.as_ref().map(|p| p.value.as_str()))
    }
}

/// Value measured over the new-code period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodValue {
    /// The measured value
    pub value: String,
}

/// Component with its measures.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentMeasures {
    /// Component key
    #[serde(default)]
    pub key: String,
    /// Requested measures that the server returned
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// Envelope of `GET /api/measures/component`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasuresResponse {
    /// The wrapped component
    pub component: ComponentMeasures,
}
