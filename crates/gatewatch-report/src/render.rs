//! Quality-gate summary rendering.
//!
//! Pure and deterministic: the same `(project status, measures, context)`
//! triple always yields byte-identical HTML. The fragment is attached to
//! the build page by the publish phase.

use crate::format::format_measure;
use gatewatch_server::models::{Condition, GateStatus, Measure, Metric, ProjectStatus};
use std::collections::BTreeMap;

/// Supplementary measures shown in the "what changed" section of a
/// passing gate, in display order. Each line is emitted only when the
/// server returned the measure.
pub const CHANGE_SUMMARY_METRICS: &[(&str, &str)] = &[
    ("new_violations", "New issues"),
    ("new_accepted_issues", "Accepted issues"),
    ("fixed_issues", "Fixed issues"),
    ("new_coverage", "Coverage on new code"),
    ("new_duplicated_lines_density", "Duplication on new code"),
];

/// Read-only metric catalog, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    by_key: BTreeMap<String, Metric>,
}

impl MetricCatalog {
    /// Build a catalog from fetched metrics.
    #[must_use]
    pub fn new(metrics: Vec<Metric>) -> Self {
        let by_key = metrics.into_iter().map(|m| (m.key.clone(), m)).collect();
        Self { by_key }
    }

    /// Display name for a metric key, falling back to the key itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.by_key
            .get(key)
            .filter(|m| !m.name.is_empty())
            .map_or(key, |m| m.name.as_str())
    }

    /// Value type for a metric key, falling back to pass-through.
    #[must_use]
    pub fn value_type(&self, key: &str) -> &str {
        self.by_key.get(key).map_or("", |m| m.value_type.as_str())
    }

    /// Number of cataloged metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// True when no metrics were fetched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Per-analysis rendering inputs beyond the gate result itself.
#[derive(Debug, Clone, Default)]
pub struct RenderContext<'a> {
    /// Project display name for the header
    pub project_name: Option<&'a str>,
    /// Dashboard URL; the link is appended only when present
    pub dashboard_url: Option<&'a str>,
    /// Trailing advisory from the task's warning list, appended verbatim
    pub advisory: Option<&'a str>,
}

/// Render one analysis's quality-gate outcome as an HTML fragment.
#[must_use]
pub fn render(
    status: &ProjectStatus,
    measures: &[Measure],
    catalog: &MetricCatalog,
    context: &RenderContext<'_>,
) -> String {
    let mut html = String::new();

    html.push_str("<div class=\"quality-gate\">\n");
    html.push_str(&header(status.status, context.project_name));

    match status.status {
        GateStatus::Warn | GateStatus::Error => {
            html.push_str(&failed_conditions(&status.conditions, catalog));
        }
        GateStatus::Ok => {
            html.push_str(&change_summary(measures, catalog));
        }
        GateStatus::None => {}
    }

    if let Some(url) = context.dashboard_url {
        html.push_str(&format!(
            "<p><a href=\"{}\">View details on the analysis server</a></p>\n",
            escape_html(url)
        ));
    }

    if let Some(advisory) = context.advisory {
        html.push_str(&format!(
            "<p class=\"advisory\">{}</p>\n",
            escape_html(advisory)
        ));
    }

    html.push_str("</div>\n");
    html
}

fn header(status: GateStatus, project_name: Option<&str>) -> String {
    let (icon, label) = match status {
        GateStatus::Ok => ("&#10004;", "Quality Gate passed"),
        GateStatus::Warn => ("&#9888;", "Quality Gate warning"),
        GateStatus::Error => ("&#10008;", "Quality Gate failed"),
        GateStatus::None => ("&#8211;", "No Quality Gate"),
    };

    match project_name {
        Some(name) => format!(
            "<h2>{icon} {label} &mdash; {}</h2>\n",
            escape_html(name)
        ),
        None => format!("<h2>{icon} {label}</h2>\n"),
    }
}

fn failed_conditions(conditions: &[Condition], catalog: &MetricCatalog) -> String {
    let mut html = String::from("<ul class=\"failed-conditions\">\n");

    for condition in conditions
        .iter()
        .filter(|c| matches!(c.status, GateStatus::Warn | GateStatus::Error))
    {
        let value_type = catalog.value_type(&condition.metric_key);
        let name = catalog.display_name(&condition.metric_key);

        let actual = condition
            .actual_value
            .as_deref()
            .map_or_else(|| "&#8211;".to_string(), |v| {
                escape_html(&format_measure(v, value_type))
            });

        let threshold = condition
            .status
            .is_failed()
            .then(|| condition.error_threshold.as_deref())
            .flatten()
            .or(condition.warning_threshold.as_deref())
            .or(condition.error_threshold.as_deref());

        let requirement = threshold.map_or(String::new(), |threshold| {
            let formatted = escape_html(&format_measure(threshold, value_type));
            // A comparator reads as nonsense next to a letter grade.
            if value_type == "RATING" {
                format!(" (required {formatted})")
            } else {
                match comparator_word(condition.comparator.as_deref()) {
                    Some(word) => format!(" (required {word} {formatted})"),
                    None => format!(" (required {formatted})"),
                }
            }
        });

        html.push_str(&format!(
            "<li><b>{}</b>: {actual}{requirement}</li>\n",
            escape_html(name)
        ));
    }

    html.push_str("</ul>\n");
    html
}

/// The requirement the measured value failed, phrased from the failing
/// comparator's opposite direction.
fn comparator_word(comparator: Option<&str>) -> Option<&'static str> {
    match comparator {
        Some("GT") => Some("&le;"),
        Some("LT") => Some("&ge;"),
        _ => None,
    }
}

fn change_summary(measures: &[Measure], catalog: &MetricCatalog) -> String {
    let mut lines = Vec::new();

    for (key, label) in CHANGE_SUMMARY_METRICS {
        let Some(measure) = measures.iter().find(|m| m.metric == *key) else {
            // Silent: the server simply did not return this measure.
            continue;
        };
        let Some(value) = measure.effective_value() else {
            continue;
        };

        let formatted = format_measure(value, catalog.value_type(key));
        lines.push(format!(
            "<li>{label}: {}</li>\n",
            escape_html(&formatted)
        ));
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut html = String::from("<ul class=\"change-summary\">\n");
    for line in lines {
        html.push_str(&line);
    }
    html.push_str("</ul>\n");
    html
}

/// Minimal HTML escaping for interpolated text.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            Metric {
                key: "new_coverage".to_string(),
                name: "Coverage on New Code".to_string(),
                value_type: "PERCENT".to_string(),
                domain: None,
            },
            Metric {
                key: "new_violations".to_string(),
                name: "New Issues".to_string(),
                value_type: "INT".to_string(),
                domain: None,
            },
            Metric {
                key: "sqale_rating".to_string(),
                name: "Maintainability Rating".to_string(),
                value_type: "RATING".to_string(),
                domain: None,
            },
        ])
    }

    fn error_status() -> ProjectStatus {
        ProjectStatus {
            status: GateStatus::Error,
            conditions: vec![
                Condition {
                    status: GateStatus::Error,
                    metric_key: "new_coverage".to_string(),
                    comparator: Some("LT".to_string()),
                    actual_value: Some("42.5".to_string()),
                    error_threshold: Some("80".to_string()),
                    warning_threshold: None,
                },
                Condition {
                    status: GateStatus::Error,
                    metric_key: "sqale_rating".to_string(),
                    comparator: Some("GT".to_string()),
                    actual_value: Some("3".to_string()),
                    error_threshold: Some("2".to_string()),
                    warning_threshold: None,
                },
                Condition {
                    status: GateStatus::Ok,
                    metric_key: "new_violations".to_string(),
                    comparator: Some("GT".to_string()),
                    actual_value: Some("0".to_string()),
                    error_threshold: Some("0".to_string()),
                    warning_threshold: None,
                },
            ],
        }
    }

    fn measure(metric: &str, value: &str) -> Measure {
        Measure {
            metric: metric.to_string(),
            value: Some(value.to_string()),
            period: None,
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let status = error_status();
        let catalog = catalog();
        let context = RenderContext {
            project_name: Some("My Project"),
            dashboard_url: Some("https://analysis.example.com/dashboard?id=my-project"),
            advisory: None,
        };

        let first = render(&status, &[], &catalog, &context);
        let second = render(&status, &[], &catalog, &context);
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_failed_gate() {
        let html = render(
            &error_status(),
            &[],
            &catalog(),
            &RenderContext {
                project_name: Some("My Project"),
                ..RenderContext::default()
            },
        );

        assert!(html.contains("Quality Gate failed"));
        assert!(html.contains("My Project"));
        // Failing conditions rendered with type-formatted values.
        assert!(html.contains("<b>Coverage on New Code</b>: 42.5%"));
    }

    #[test]
    fn test_render_failed_gate_thresholds() {
        let html = render(&error_status(), &[], &catalog(), &RenderContext::default());

        assert!(html.contains("(required &ge; 80.0%)"));
        // Rating condition: comparator omitted, letter grade shown.
        assert!(html.contains("<b>Maintainability Rating</b>: C (required B)"));
        // Passing conditions are not listed.
        assert!(!html.contains("New Issues"));
    }

    #[test]
    fn test_render_ok_gate_with_change_summary() {
        let status = ProjectStatus {
            status: GateStatus::Ok,
            conditions: vec![],
        };
        let measures = vec![
            measure("new_violations", "3"),
            measure("new_coverage", "87.3"),
        ];

        let html = render(&status, &measures, &catalog(), &RenderContext::default());

        assert!(html.contains("Quality Gate passed"));
        assert!(html.contains("<li>New issues: 3</li>"));
        assert!(html.contains("<li>Coverage on new code: 87.3%</li>"));
        // Measures the server did not return stay silent.
        assert!(!html.contains("Accepted issues"));
        assert!(!html.contains("Duplication"));
    }

    #[test]
    fn test_render_dashboard_link_only_when_supplied() {
        let status = ProjectStatus {
            status: GateStatus::Ok,
            conditions: vec![],
        };

        let without = render(&status, &[], &catalog(), &RenderContext::default());
        assert!(!without.contains("<a href"));

        let with = render(
            &status,
            &[],
            &catalog(),
            &RenderContext {
                dashboard_url: Some("https://analysis.example.com/dashboard?id=p"),
                ..RenderContext::default()
            },
        );
        assert!(with.contains("<a href=\"https://analysis.example.com/dashboard?id=p\">"));
    }

    #[test]
    fn test_render_advisory_appended() {
        let status = ProjectStatus {
            status: GateStatus::Ok,
            conditions: vec![],
        };
        let html = render(
            &status,
            &[],
            &catalog(),
            &RenderContext {
                advisory: Some("Scanner 4.x is deprecated, upgrade to 5.x"),
                ..RenderContext::default()
            },
        );

        assert!(html.contains("class=\"advisory\""));
        assert!(html.contains("Scanner 4.x is deprecated, upgrade to 5.x"));
    }

    #[test]
    fn test_render_escapes_html() {
        let status = ProjectStatus {
            status: GateStatus::Ok,
            conditions: vec![],
        };
        let html = render(
            &status,
            &[],
            &catalog(),
            &RenderContext {
                project_name: Some("<script>alert(1)</script>"),
                ..RenderContext::default()
            },
        );

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_render_none_status_has_no_sections() {
        let status = ProjectStatus {
            status: GateStatus::None,
            conditions: vec![],
        };
        let html = render(&status, &[], &catalog(), &RenderContext::default());

        assert!(html.contains("No Quality Gate"));
        assert!(!html.contains("failed-conditions"));
        assert!(!html.contains("change-summary"));
    }
}
