//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Prometheus self-metrics (scrape duration, scrape count, cycle failures)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for scrape duration (in seconds)
const SCRAPE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ExporterMetricsInner {
    scrape_duration_seconds: Histogram,
    scrapes: IntCounter,
    cycle_failures: IntCounterVec,
    alarm_fetch_errors: IntCounter,
    probe_errors: IntCounter,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram!(
                "cmon_exporter_scrape_duration_seconds",
                "Time spent running one collection cycle",
                SCRAPE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            scrapes: register_int_counter!(
                "cmon_exporter_scrapes_total",
                "Total number of collection cycles run"
            )
            .expect("Failed to register scrapes_total"),

            cycle_failures: register_int_counter_vec!(
                "cmon_exporter_cycle_failures_total",
                "Collection cycles that ended without a complete inventory",
                &["reason"]
            )
            .expect("Failed to register cycle_failures_total"),

            alarm_fetch_errors: register_int_counter!(
                "cmon_exporter_alarm_fetch_errors_total",
                "Per-cluster alarm queries that failed"
            )
            .expect("Failed to register alarm_fetch_errors_total"),

            probe_errors: register_int_counter!(
                "cmon_exporter_coredump_probe_errors_total",
                "Coredump directory scans that failed"
            )
            .expect("Failed to register coredump_probe_errors_total"),
        }
    }
}

/// Exporter self-metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a finished cycle
    pub fn observe_scrape(&self, duration_secs: f64) {
        self.inner().scrapes.inc();
        self.inner().scrape_duration_seconds.observe(duration_secs);
    }

    /// Count a cycle that ended early
    pub fn inc_cycle_failure(&self, reason: &str) {
        self.inner()
            .cycle_failures
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_alarm_fetch_errors(&self, count: u64) {
        self.inner().alarm_fetch_errors.inc_by(count);
    }

    pub fn inc_probe_errors(&self) {
        self.inner().probe_errors.inc();
    }
}

/// Structured logger for exporter events
///
/// Every event carries the controller endpoint so logs from several
/// exporters can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    endpoint: String,
}

impl StructuredLogger {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, listen_address: &str, metrics_path: &str) {
        info!(
            event = "exporter_started",
            endpoint = %self.endpoint,
            exporter_version = %version,
            listen_address = %listen_address,
            metrics_path = %metrics_path,
            "CMON exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            endpoint = %self.endpoint,
            reason = %reason,
            "CMON exporter shutting down"
        );
    }

    /// Log a failed authentication together with the ping diagnostic
    pub fn log_auth_failure(&self, error: &str, ping: &str) {
        warn!(
            event = "auth_failed",
            endpoint = %self.endpoint,
            error = %error,
            ping = %ping,
            "Authentication against controller failed"
        );
    }

    /// Log a failed inventory query
    pub fn log_inventory_failure(&self, controller_id: &str, error: &str) {
        warn!(
            event = "inventory_failed",
            endpoint = %self.endpoint,
            controller_id = %controller_id,
            error = %error,
            "Failed to fetch cluster inventory"
        );
    }

    /// Log a failed per-cluster alarm query
    pub fn log_alarm_failure(&self, cluster_id: u64, cluster_name: &str, error: &str) {
        warn!(
            event = "alarm_fetch_failed",
            endpoint = %self.endpoint,
            cluster_id = cluster_id,
            cluster_name = %cluster_name,
            error = %error,
            "Failed to fetch alarms, cluster reports zero alarms this cycle"
        );
    }

    /// Log a cycle that ran out of budget
    pub fn log_timeout(&self, budget_secs: f64, phase: &str) {
        warn!(
            event = "cycle_timed_out",
            endpoint = %self.endpoint,
            budget_secs = budget_secs,
            phase = %phase,
            "Collection cycle exceeded its time budget"
        );
    }

    /// Log a failed coredump scan
    pub fn log_probe_failure(&self, directory: &str, error: &str) {
        warn!(
            event = "coredump_probe_failed",
            endpoint = %self.endpoint,
            directory = %directory,
            error = %error,
            "Coredump scan failed"
        );
    }

    /// Log the result of a cycle
    pub fn log_cycle(
        &self,
        outcome: &str,
        clusters: usize,
        alarm_failures: usize,
        coredumps: u64,
        elapsed_ms: u128,
    ) {
        info!(
            event = "cycle_complete",
            endpoint = %self.endpoint,
            outcome = %outcome,
            clusters = clusters,
            alarm_failures = alarm_failures,
            coredumps = coredumps,
            elapsed_ms = elapsed_ms,
            "Collection cycle finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metrics_creation() {
        // Handles share one globally registered instance
        let metrics = ExporterMetrics::new();
        let other = ExporterMetrics::new();

        metrics.observe_scrape(0.25);
        metrics.inc_cycle_failure("auth_failed");
        other.inc_alarm_fetch_errors(2);
        other.inc_probe_errors();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "cmon_exporter_scrapes_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("https://127.0.0.1:9501");
        assert_eq!(logger.endpoint, "https://127.0.0.1:9501");
    }
}
