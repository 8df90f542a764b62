//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by terminal outcome
//! - `relay_request_duration_seconds` (histogram): latency by outcome
//! - `relay_bytes_saved_total` (counter): positive savings only
//! - `relay_transcode_failures_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Terminal outcome of one request, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Decoy,
    InvalidUrl,
    Redirect,
    Transcoded,
    Bypass,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Decoy => "decoy",
            RequestOutcome::InvalidUrl => "invalid_url",
            RequestOutcome::Redirect => "redirect",
            RequestOutcome::Transcoded => "transcoded",
            RequestOutcome::Bypass => "bypass",
        }
    }
}

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(outcome: RequestOutcome, start: Instant) {
    let label = outcome.as_str();
    counter!("relay_requests_total", "outcome" => label).increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => label)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_bytes_saved(saved: i64) {
    if saved > 0 {
        counter!("relay_bytes_saved_total").increment(saved.unsigned_abs());
    }
}

pub fn record_transcode_failure() {
    counter!("relay_transcode_failures_total").increment(1);
}
