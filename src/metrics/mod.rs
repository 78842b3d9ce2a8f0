use std::sync::Arc;

use crate::analytics::{AnalyticsQuery, TimeWindow, CPU_TIME_QUERY, REQUEST_COUNT_QUERY};

pub mod exposition;
pub mod translate;

/// Prefix of every exported metric
pub const NAMESPACE: &str = "cloudflare_worker";

/// Labels of the per-worker request counters
pub const WORKER_LABELS: &[&str] = &["worker", "status"];
/// Labels of the per-worker CPU time gauge
pub const PERCENTILE_LABELS: &[&str] = &["worker", "status", "percentile"];

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Immutable description of an exported metric
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDesc {
    /// Fully qualified name
    pub name: String,
    /// Help text
    pub help: String,
    /// Metric type
    pub kind: MetricKind,
    /// Names of the variable labels, in order
    pub label_names: &'static [&'static str],
}

impl MetricDesc {
    fn new(
        namespace: &str,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &'static [&'static str],
    ) -> Arc<Self> {
        let name = if namespace.is_empty() {
            name.to_owned()
        } else {
            format!("{namespace}_{name}")
        };
        Arc::new(Self {
            name,
            help: help.to_owned(),
            kind,
            label_names,
        })
    }
}

/// Set of descriptors of all the exported metrics
///
/// Built once at startup and shared by every scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptors {
    pub requests_up: Arc<MetricDesc>,
    pub requests_received: Arc<MetricDesc>,
    pub errors: Arc<MetricDesc>,
    pub subrequests: Arc<MetricDesc>,
    pub cpu_time_up: Arc<MetricDesc>,
    pub cpu_time_percentile: Arc<MetricDesc>,
}

impl Descriptors {
    /// Build the descriptors with all names prefixed by `namespace`
    pub fn new(namespace: &str) -> Self {
        Self {
            requests_up: MetricDesc::new(
                namespace,
                "requests_up",
                "Was the last Cloudflare Workers analytics requests request successful.",
                MetricKind::Gauge,
                &[],
            ),
            requests_received: MetricDesc::new(
                namespace,
                "requests_received_total",
                "How many requests have been received (per worker script).",
                MetricKind::Counter,
                WORKER_LABELS,
            ),
            errors: MetricDesc::new(
                namespace,
                "errors_total",
                "How many errors have been returned (per worker script).",
                MetricKind::Counter,
                WORKER_LABELS,
            ),
            subrequests: MetricDesc::new(
                namespace,
                "subrequests_total",
                "How many subrequests have been initiated (per worker script).",
                MetricKind::Counter,
                WORKER_LABELS,
            ),
            cpu_time_up: MetricDesc::new(
                namespace,
                "cpu_time_up",
                "Was the last Cloudflare Workers analytics cpu time request successful.",
                MetricKind::Gauge,
                &[],
            ),
            cpu_time_percentile: MetricDesc::new(
                namespace,
                "cpu_time_percentile",
                "Cloudflare Workers CPU time per percentile (per worker script).",
                MetricKind::Gauge,
                PERCENTILE_LABELS,
            ),
        }
    }

    /// All descriptors, grouped by family
    pub fn all(&self) -> [&Arc<MetricDesc>; 6] {
        [
            &self.requests_up,
            &self.requests_received,
            &self.errors,
            &self.subrequests,
            &self.cpu_time_up,
            &self.cpu_time_percentile,
        ]
    }

    /// Liveness gauge of `family`
    pub fn liveness(&self, family: Family) -> &Arc<MetricDesc> {
        match family {
            Family::Requests => &self.requests_up,
            Family::CpuTime => &self.cpu_time_up,
        }
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new(NAMESPACE)
    }
}

/// Independent group of metrics with its own query and liveness gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Request, error and subrequest counters since the start of the week
    Requests,
    /// CPU time percentiles over the last minute
    CpuTime,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::Requests, Family::CpuTime];

    /// Query fetching the analytics of the family
    pub fn query(self) -> &'static AnalyticsQuery {
        match self {
            Family::Requests => &REQUEST_COUNT_QUERY,
            Family::CpuTime => &CPU_TIME_QUERY,
        }
    }

    /// Window covered by the family when collected at `now`
    pub fn window(self, now: chrono::DateTime<chrono::Utc>) -> TimeWindow {
        match self {
            Family::Requests => TimeWindow::week_to_date(now),
            Family::CpuTime => TimeWindow::trailing(now, chrono::Duration::seconds(60)),
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query().name)
    }
}

/// Single labeled value of a metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Descriptor of the metric
    pub desc: Arc<MetricDesc>,
    /// Label values, in the order of the descriptor label names
    pub label_values: Vec<String>,
    /// Value of the sample
    pub value: f64,
}

impl MetricSample {
    pub fn new(desc: &Arc<MetricDesc>, label_values: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(desc.label_names.len(), label_values.len());
        Self {
            desc: desc.clone(),
            label_values,
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn kind(&self) -> MetricKind {
        self.desc.kind
    }

    /// Value of the label `name`, if the metric has such a label
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|label| *label == name)
            .and_then(|index| self.label_values.get(index))
            .map(String::as_str)
    }
}
