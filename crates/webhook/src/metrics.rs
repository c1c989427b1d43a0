use std::collections::BTreeMap;

use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

/// Prometheus metrics of the webhook pipeline.
pub struct GatewayMetrics {
    pub registry: Registry,
    pub requests_total: IntCounterVec,
    pub action_duration: HistogramVec,
    pub slots_in_use: IntGauge,
}

impl GatewayMetrics {
    /// Create the gateway metrics, registered against a fresh Prometheus
    /// registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("hookgate_webhook_requests_total", "Webhook requests by response status"),
            &["status"],
        )
        .expect("failed to create requests_total counter");

        let action_duration = HistogramVec::new(
            HistogramOpts::new(
                "hookgate_action_duration_seconds",
                "Action execution duration in seconds",
            )
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )
        .expect("failed to create action_duration histogram");

        let slots_in_use = IntGauge::with_opts(Opts::new(
            "hookgate_action_slots_in_use",
            "Concurrency slots currently held by running actions",
        ))
        .expect("failed to create slots_in_use gauge");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("failed to register requests_total");
        registry
            .register(Box::new(action_duration.clone()))
            .expect("failed to register action_duration");
        registry
            .register(Box::new(slots_in_use.clone()))
            .expect("failed to register slots_in_use");

        Self {
            registry,
            requests_total,
            action_duration,
            slots_in_use,
        }
    }

    pub fn record_status(&self, status: u16) {
        self.requests_total.with_label_values(&[&status.to_string()]).inc();
    }

    /// Sum of requests answered with `status`.
    pub fn count(&self, status: u16) -> u64 {
        self.requests_total.with_label_values(&[&status.to_string()]).get()
    }

    /// Request counts keyed by response status.
    pub fn status_counts(&self) -> BTreeMap<u16, u64> {
        let mut counts = BTreeMap::new();
        for family in self.requests_total.collect() {
            for metric in family.get_metric() {
                let status = metric
                    .get_label()
                    .iter()
                    .find(|label| label.get_name() == "status")
                    .and_then(|label| label.get_value().parse::<u16>().ok());
                if let Some(status) = status {
                    *counts.entry(status).or_insert(0) += metric.get_counter().get_value() as u64;
                }
            }
        }
        counts
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_status() {
        let metrics = GatewayMetrics::new();
        metrics.record_status(200);
        metrics.record_status(200);
        metrics.record_status(401);

        assert_eq!(metrics.count(200), 2);
        assert_eq!(metrics.count(401), 1);
        assert_eq!(metrics.count(500), 0);

        let counts = metrics.status_counts();
        assert_eq!(counts.get(&200), Some(&2));
        assert_eq!(counts.get(&401), Some(&1));
        assert!(!metrics.registry.gather().is_empty());
    }
}
