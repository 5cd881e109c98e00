// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("jobs_total", "Job runs by job name and outcome.");
        describe_counter!(
            "capability_rate_limited_total",
            "Rate-limit signals received from capability calls."
        );
        describe_counter!(
            "capability_retry_exhausted_total",
            "Capability calls that stayed rate limited after every attempt."
        );
        describe_counter!(
            "dedup_skipped_total",
            "Scraped headlines dropped because they were already used."
        );
        describe_histogram!("job_duration_ms", "Job wall time in milliseconds.");
        describe_gauge!(
            "scheduler_last_run_ts",
            "Unix ts when the scheduler last fired a job."
        );
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder once per process. Later calls
    /// (tests building several apps) get the same handle back.
    pub fn init() -> Self {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(error = %e, "prometheus recorder already installed; using a detached one");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            })
            .clone();
        ensure_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
