//! Pipeline metrics.
//!
//! Recording goes through the `metrics` facade and is a no-op until a recorder
//! is installed; [`init_metrics`] installs the Prometheus exporter.

use std::net::SocketAddr;
use tracing::{info, warn};

use crate::pipeline::processing::RejectReason;

pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}

pub struct ExtractionMetrics;

impl ExtractionMetrics {
    pub fn record_page(records: usize, duration_secs: f64) {
        ::metrics::counter!("meteorite_extract_pages_total").increment(1);
        ::metrics::counter!("meteorite_extract_records_total").increment(records as u64);
        ::metrics::histogram!("meteorite_extract_page_duration_seconds").record(duration_secs);
    }

    pub fn record_failed_range() {
        ::metrics::counter!("meteorite_extract_failed_ranges_total").increment(1);
    }

    pub fn record_run(duration_secs: f64) {
        ::metrics::histogram!("meteorite_extract_duration_seconds").record(duration_secs);
    }
}

pub struct TransformMetrics;

impl TransformMetrics {
    pub fn record_accepted() {
        ::metrics::counter!("meteorite_transform_accepted_total").increment(1);
    }

    pub fn record_rejected(reason: &RejectReason) {
        ::metrics::counter!("meteorite_transform_rejected_total", "reason" => reason.label())
            .increment(1);
    }

    pub fn record_cache_hit() {
        ::metrics::counter!("meteorite_geocode_cache_hits_total").increment(1);
    }

    pub fn record_geocode_call(duration_secs: f64) {
        ::metrics::counter!("meteorite_geocode_calls_total").increment(1);
        ::metrics::histogram!("meteorite_geocode_duration_seconds").record(duration_secs);
    }

    pub fn record_geocode_failure() {
        ::metrics::counter!("meteorite_geocode_failures_total").increment(1);
    }
}

pub struct LoadMetrics;

impl LoadMetrics {
    pub fn record_commit(rows: usize, duration_secs: f64) {
        ::metrics::counter!("meteorite_load_rows_total").increment(rows as u64);
        ::metrics::histogram!("meteorite_load_duration_seconds").record(duration_secs);
    }

    pub fn record_failure() {
        ::metrics::counter!("meteorite_load_failures_total").increment(1);
    }
}
