pub mod webhook;

use tokio::sync::mpsc;

use crate::event::Event;

/// Downstream consumer of new events, called once per event in chronological
/// order. There is no acknowledgement back to the monitor; sinks log their own
/// failures.
///
/// The monitor drops an in-flight `deliver` future when it is cancelled, so a
/// delivery may stop at any await point.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &Event);

    fn name(&self) -> &'static str;
}

/// Writes each event to the tracing log.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl EventSink for LogSink {
    async fn deliver(&self, event: &Event) {
        match event {
            Event::Push(p) => tracing::info!(
                target: "feed",
                id = p.id,
                at = %p.timestamp.to_rfc3339(),
                size = p.size,
                commits = p.commits.len(),
                "push event"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Hands events to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn deliver(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!(target: "feed", id = event.id(), "channel receiver gone, event dropped");
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Delivers to every inner sink in order.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait::async_trait]
impl EventSink for FanoutSink {
    async fn deliver(&self, event: &Event) {
        for s in &self.sinks {
            s.deliver(event).await;
        }
    }

    fn name(&self) -> &'static str {
        "fanout"
    }
}
