//! Push feed monitor — binary entrypoint.
//! Loads configuration, wires the GitHub source to the configured sinks and runs
//! the monitor until Ctrl-C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use push_feed_monitor::sink::webhook::WebhookSink;
use push_feed_monitor::{
    EventSink, FanoutSink, FeedMonitor, GithubSource, LogSink, MonitorConfig,
};

/// `LOG_FORMAT=json` switches to JSON lines; filter comes from `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("push_feed_monitor=info,feed=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().context("invalid METRICS_ADDR")?;
        push_feed_monitor::metrics::install_prometheus(addr)?;
        tracing::info!(%addr, "prometheus exporter listening");
    }

    let cfg = MonitorConfig::load().context("loading monitor config")?;
    let source = Arc::new(GithubSource::new(&cfg)?);

    let mut sinks: Vec<Box<dyn EventSink>> = vec![Box::new(LogSink)];
    if let Some(url) = cfg.webhook_url.clone() {
        sinks.push(Box::new(WebhookSink::new(url, cfg.target.clone())));
    }
    let sink = Arc::new(FanoutSink::new(sinks));

    let mut monitor = FeedMonitor::new(&cfg, source, sink);
    let cancel = monitor.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, shutting down");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    monitor.run().await?;
    Ok(())
}
