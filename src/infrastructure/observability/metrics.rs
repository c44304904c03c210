//! Prometheus metrics definitions for fraudlens
//!
//! All metrics use the `fraudlens_` prefix and are read-only.

use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics for the dashboard core
#[derive(Clone)]
pub struct DashboardMetrics {
    registry: Arc<Registry>,
    /// Debounced evaluations sent to the scorer
    pub evaluations_dispatched_total: IntCounter,
    /// Evaluations that came back with an error
    pub evaluation_failures_total: IntCounter,
    /// Responses dropped because a newer request superseded them
    pub stale_responses_total: CounterVec,
    /// Explanation fetches by outcome
    pub explanation_fetches_total: CounterVec,
    /// Scoring service latency in seconds
    pub scoring_latency_seconds: HistogramVec,
}

impl DashboardMetrics {
    /// Create a new metrics instance with all counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let evaluations_dispatched_total = IntCounter::with_opts(Opts::new(
            "fraudlens_evaluations_dispatched_total",
            "Threshold evaluations dispatched after debounce",
        ))?;
        registry.register(Box::new(evaluations_dispatched_total.clone()))?;

        let evaluation_failures_total = IntCounter::with_opts(Opts::new(
            "fraudlens_evaluation_failures_total",
            "Threshold evaluations that failed",
        ))?;
        registry.register(Box::new(evaluation_failures_total.clone()))?;

        let stale_responses_total = CounterVec::new(
            Opts::new(
                "fraudlens_stale_responses_total",
                "Superseded responses discarded on arrival",
            ),
            &["source"],
        )?;
        registry.register(Box::new(stale_responses_total.clone()))?;

        let explanation_fetches_total = CounterVec::new(
            Opts::new(
                "fraudlens_explanation_fetches_total",
                "Explanation fetches by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(explanation_fetches_total.clone()))?;

        let scoring_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fraudlens_scoring_latency_seconds",
                "Scoring service request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(scoring_latency_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            evaluations_dispatched_total,
            evaluation_failures_total,
            stale_responses_total,
            explanation_fetches_total,
            scoring_latency_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_stale(&self, source: &str) {
        self.stale_responses_total.with_label_values(&[source]).inc();
    }

    pub fn inc_explanation(&self, outcome: &str) {
        self.explanation_fetches_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_latency(&self, endpoint: &str, seconds: f64) {
        self.scoring_latency_seconds
            .with_label_values(&[endpoint])
            .observe(seconds);
    }

    pub fn stale_count(&self, source: &str) -> f64 {
        self.stale_responses_total.with_label_values(&[source]).get()
    }
}
