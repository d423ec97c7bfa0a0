use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

pub const POLLS_TOTAL: &str = "feed_polls_total";
pub const POLL_ERRORS_TOTAL: &str = "feed_poll_errors_total";
pub const EVENTS_DETECTED_TOTAL: &str = "feed_events_detected_total";
pub const EVENTS_FORWARDED_TOTAL: &str = "feed_events_forwarded_total";
pub const RECORDS_IGNORED_TOTAL: &str = "feed_records_ignored_total";
pub const PARSE_ERRORS_TOTAL: &str = "feed_parse_errors_total";
pub const QUEUE_DEPTH: &str = "feed_queue_depth";
pub const SNAPSHOT_PARSE_MS: &str = "feed_snapshot_parse_ms";
pub const LAST_POLL_TS: &str = "feed_last_poll_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(POLLS_TOTAL, "Latest-record polls attempted.");
        describe_counter!(
            POLL_ERRORS_TOTAL,
            "Polls that failed transiently (network, auth, timeout)."
        );
        describe_counter!(EVENTS_DETECTED_TOTAL, "New events found by polling.");
        describe_counter!(EVENTS_FORWARDED_TOTAL, "Events handed to the sink.");
        describe_counter!(
            RECORDS_IGNORED_TOTAL,
            "Records of kinds the monitor does not model."
        );
        describe_counter!(PARSE_ERRORS_TOTAL, "Structurally corrupt records.");
        describe_gauge!(QUEUE_DEPTH, "Events waiting to be forwarded.");
        describe_histogram!(SNAPSHOT_PARSE_MS, "Snapshot parse time in milliseconds.");
        describe_gauge!(LAST_POLL_TS, "Unix ts of the last completed poll.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(())
}
