// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const RECOVERED_RECORDS: &str = "crashlog_recovered_records_total";
pub const RECOVERED_BYTES: &str = "crashlog_recovered_bytes_total";
pub const RECOVERY_DURATION: &str = "crashlog_recovery_duration_seconds";
pub const STORE_PENDING: &str = "crashlog_store_pending_records";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "crashlog_host=info,crashlog_tsdb=info,crashlog=info".into()),
    );
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("metrics recorder not installed: {}", e),
    }

    metrics::describe_counter!(RECOVERED_RECORDS, "Records replayed into the recovery file");
    metrics::describe_counter!(RECOVERED_BYTES, "Bytes replayed into the recovery file");
    metrics::describe_histogram!(RECOVERY_DURATION, "Time taken by boot recovery");
    metrics::describe_gauge!(STORE_PENDING, "Records held by the log store at boot");
}

/// Renders the current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
