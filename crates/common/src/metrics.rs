//! Metrics collection for Rendezvous
//!
//! This module provides Prometheus metrics for observability.
//! Metrics are updated outside the registry lock wherever possible.

use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for Rendezvous
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub dispatcher: DispatcherMetrics,
    pub worker: WorkerMetrics,
}

/// Dispatcher-specific metrics
#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    /// Workers currently in the registry
    pub registered_workers: IntGauge,

    /// Successful registrations
    pub joins_total: IntCounter,

    /// Registrations dropped as malformed
    pub joins_rejected_total: IntCounter,

    /// Client requests received
    pub requests_total: IntCounter,

    /// Client requests answered with a port
    pub requests_dispatched_total: IntCounter,

    /// Client requests answered with NO_SERVER
    pub no_server_total: IntCounter,

    /// Workers that left with GOODBYE
    pub goodbyes_total: IntCounter,

    /// Workers removed after losing their control connection
    pub connections_lost_total: IntCounter,
}

/// Worker-specific metrics
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// Jobs served
    pub jobs_total: IntCounter,

    /// Jobs that could not be read or answered
    pub jobs_failed_total: IntCounter,

    /// Job duration histogram
    pub job_duration: Histogram,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    registry
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("valid gauge definition");
    registry
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let dispatcher = DispatcherMetrics {
            registered_workers: gauge(
                &registry,
                "dispatcher_registered_workers",
                "Current number of registered workers",
            ),
            joins_total: counter(
                &registry,
                "dispatcher_joins_total",
                "Total number of accepted worker registrations",
            ),
            joins_rejected_total: counter(
                &registry,
                "dispatcher_joins_rejected_total",
                "Total number of malformed worker registrations",
            ),
            requests_total: counter(
                &registry,
                "dispatcher_requests_total",
                "Total number of client requests",
            ),
            requests_dispatched_total: counter(
                &registry,
                "dispatcher_requests_dispatched_total",
                "Total number of client requests handed a worker",
            ),
            no_server_total: counter(
                &registry,
                "dispatcher_no_server_total",
                "Total client requests answered with NO_SERVER",
            ),
            goodbyes_total: counter(
                &registry,
                "dispatcher_goodbyes_total",
                "Total workers deregistered with GOODBYE",
            ),
            connections_lost_total: counter(
                &registry,
                "dispatcher_connections_lost_total",
                "Total workers removed after control connection loss",
            ),
        };

        let job_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new("worker_job_duration_seconds", "Worker job duration in seconds")
                .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .expect("valid histogram definition");
        registry
            .register(Box::new(job_duration.clone()))
            .expect("histogram registered once");

        let worker = WorkerMetrics {
            jobs_total: counter(&registry, "worker_jobs_total", "Total number of jobs served"),
            jobs_failed_total: counter(
                &registry,
                "worker_jobs_failed_total",
                "Total number of jobs that failed on the connection",
            ),
            job_duration,
        };

        MetricsRegistry {
            registry,
            dispatcher,
            worker,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry() {
        let metrics = MetricsRegistry::new();

        metrics.dispatcher.requests_total.inc();
        metrics.dispatcher.registered_workers.set(3);
        metrics.worker.job_duration.observe(0.2);

        let output = metrics.gather();
        assert!(output.contains("dispatcher_requests_total 1"));
        assert!(output.contains("dispatcher_registered_workers 3"));
        assert!(output.contains("worker_job_duration_seconds"));
    }
}
