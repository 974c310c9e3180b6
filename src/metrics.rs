use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AuthLabels {
    pub outcome: AuthOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum AuthOutcome {
    Verified,
    Missing,
    Malformed,
    Invalid,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReadLabels {
    pub result: ReadResult,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReadResult {
    Ok,
    NotFound,
    IoFailure,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the server.
pub struct Metrics {
    pub auth_outcomes: Family<AuthLabels, Counter>,
    pub policy_reads: Family<ReadLabels, Counter>,
    pub policy_read_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let auth_outcomes = Family::<AuthLabels, Counter>::default();
        registry.register(
            "policyserver_auth_outcomes",
            "Authentication decisions by outcome",
            auth_outcomes.clone(),
        );

        let policy_reads = Family::<ReadLabels, Counter>::default();
        registry.register(
            "policyserver_policy_reads",
            "Policy resource reads by result",
            policy_reads.clone(),
        );

        let policy_read_duration_seconds = Histogram::new(exponential_buckets(0.0005, 2.0, 14));
        registry.register(
            "policyserver_policy_read_duration_seconds",
            "Policy resource read latency in seconds",
            policy_read_duration_seconds.clone(),
        );

        Self {
            auth_outcomes,
            policy_reads,
            policy_read_duration_seconds,
        }
    }

    pub fn record_auth(&self, outcome: AuthOutcome) {
        self.auth_outcomes
            .get_or_create(&AuthLabels { outcome })
            .inc();
    }

    pub fn record_read(&self, result: ReadResult, seconds: f64) {
        self.policy_reads.get_or_create(&ReadLabels { result }).inc();
        self.policy_read_duration_seconds.observe(seconds);
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`crate::AppState`].
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
