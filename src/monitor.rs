// src/monitor.rs
//! The feed monitor.
//!
//! After a one-time snapshot load the monitor alternates between two states:
//!
//! - `Draining`: pop one queued event per turn and forward it to the sink.
//! - `Polling`: wait the poll interval, fetch the latest record, and queue it if
//!   its id differs from the last event seen.
//!
//! Queued events always drain before the next poll. Source failures while
//! polling are logged and retried on the next interval; the loop only stops on
//! cancellation.
//!
//! Source calls, enrichment included, run under the request timeout. Every await
//! in the loop is raced against the cancellation token, so an event whose
//! delivery is interrupted by cancellation is not marked as seen.
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, ParseError, SourceError};
use crate::event::Event;
use crate::metrics as m;
use crate::parser::{parse_record, RawRecord};
use crate::queue::FeedQueue;
use crate::sink::EventSink;
use crate::source::FeedSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Draining,
    Polling,
}

/// What a single [`FeedMonitor::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// An event left the queue and went to the sink.
    Forwarded(i64),
    /// The queue was empty; switched to polling.
    Drained,
    /// A poll found a new event and queued it.
    Detected(i64),
    /// A poll returned nothing new (same id, unmodelled kind, or empty feed).
    Unchanged,
    /// A poll returned a record that failed to parse.
    Corrupt,
    /// A poll failed transiently.
    PollFailed,
    Cancelled,
}

pub struct FeedMonitor {
    source: Arc<dyn FeedSource>,
    sink: Arc<dyn EventSink>,
    target: String,
    page_size: usize,
    poll_interval: Duration,
    request_timeout: Duration,
    strict_snapshot: bool,
    queue: FeedQueue,
    last_seen: Option<Event>,
    state: MonitorState,
    cancel: CancellationToken,
}

impl FeedMonitor {
    pub fn new(cfg: &MonitorConfig, source: Arc<dyn FeedSource>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            target: cfg.target.clone(),
            page_size: cfg.page_size,
            poll_interval: cfg.poll_interval,
            request_timeout: cfg.request_timeout,
            strict_snapshot: cfg.strict_snapshot,
            queue: FeedQueue::new(cfg.page_size),
            last_seen: None,
            state: MonitorState::Polling,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token so the caller can stop the loop.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn last_seen(&self) -> Option<&Event> {
        self.last_seen.as_ref()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Load the snapshot, then step until cancelled.
    pub async fn run(&mut self) -> Result<(), MonitorError> {
        let loaded = self.load_snapshot().await?;
        tracing::info!(
            target: "feed",
            user = %self.target,
            source = self.source.name(),
            sink = self.sink.name(),
            loaded,
            interval_secs = self.poll_interval.as_secs(),
            "monitor started"
        );

        while self.step().await != StepOutcome::Cancelled {}

        tracing::info!(target: "feed", user = %self.target, "monitor stopped");
        Ok(())
    }

    /// Fetch the snapshot, parse every record concurrently, and queue the
    /// results oldest-first. Returns the number of queued events.
    ///
    /// A failed fetch starts the monitor empty in `Polling`. A corrupt record is
    /// skipped unless strict snapshot loading is on, in which case it is fatal.
    pub async fn load_snapshot(&mut self) -> Result<usize, MonitorError> {
        m::ensure_described();

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(0),
            res = tokio::time::timeout(
                self.request_timeout,
                self.source.fetch_snapshot(&self.target, self.page_size),
            ) => flatten_timeout(res, self.request_timeout),
        };
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(target: "feed", error = %e, user = %self.target, "snapshot fetch failed, starting empty");
                counter!(m::POLL_ERRORS_TOTAL).increment(1);
                Vec::new()
            }
        };

        let t0 = std::time::Instant::now();
        let slots = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(0),
            slots = self.parse_all(records) => slots,
        };

        let mut events = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(Some(ev))) => events.push(ev),
                Some(Ok(None)) => counter!(m::RECORDS_IGNORED_TOTAL).increment(1),
                Some(Err(source)) => {
                    counter!(m::PARSE_ERRORS_TOTAL).increment(1);
                    if self.strict_snapshot {
                        return Err(MonitorError::Snapshot { index, source });
                    }
                    tracing::warn!(target: "feed", index, error = %source, "skipping corrupt snapshot record");
                }
                // task panicked; already logged
                None => {}
            }
        }
        histogram!(m::SNAPSHOT_PARSE_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);

        let loaded = events.len();
        self.queue.load(events, true);
        self.state = if self.queue.is_empty() {
            MonitorState::Polling
        } else {
            MonitorState::Draining
        };
        gauge!(m::QUEUE_DEPTH).set(self.queue.len() as f64);
        Ok(loaded)
    }

    /// One unit of parse work per record. Results are written back by feed
    /// index so completion order cannot reorder the snapshot. Dropping the
    /// future aborts whatever is still running.
    async fn parse_all(
        &self,
        records: Vec<RawRecord>,
    ) -> Vec<Option<Result<Option<Event>, ParseError>>> {
        let mut slots: Vec<Option<Result<Option<Event>, ParseError>>> =
            (0..records.len()).map(|_| None).collect();

        let limit = self.request_timeout;
        let mut set = JoinSet::new();
        for (idx, record) in records.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            set.spawn(async move {
                let record = enrich_within(source.as_ref(), record, limit).await;
                (idx, parse_record(&record))
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, res)) => slots[idx] = Some(res),
                Err(e) => tracing::error!(target: "feed", error = ?e, "snapshot parse task failed"),
            }
        }
        slots
    }

    /// One scheduling turn of the state machine.
    pub async fn step(&mut self) -> StepOutcome {
        if self.cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        match self.state {
            MonitorState::Draining => self.drain_one().await,
            MonitorState::Polling => self.poll_once().await,
        }
    }

    async fn drain_one(&mut self) -> StepOutcome {
        let Some(event) = self.queue.try_pop() else {
            self.state = MonitorState::Polling;
            return StepOutcome::Drained;
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::info!(target: "feed", id = event.id(), "cancelled during delivery");
                return StepOutcome::Cancelled;
            }
            _ = self.sink.deliver(&event) => {}
        }
        counter!(m::EVENTS_FORWARDED_TOTAL).increment(1);
        gauge!(m::QUEUE_DEPTH).set(self.queue.len() as f64);

        let id = event.id();
        self.last_seen = Some(event);
        StepOutcome::Forwarded(id)
    }

    async fn poll_once(&mut self) -> StepOutcome {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return StepOutcome::Cancelled,
            _ = tokio::time::sleep(self.poll_interval) => {}
        }

        counter!(m::POLLS_TOTAL).increment(1);
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return StepOutcome::Cancelled,
            res = tokio::time::timeout(
                self.request_timeout,
                self.source.fetch_latest(&self.target),
            ) => flatten_timeout(res, self.request_timeout),
        };
        gauge!(m::LAST_POLL_TS).set(chrono::Utc::now().timestamp() as f64);

        let record = match fetched {
            Ok(Some(record)) => record,
            Ok(None) => return StepOutcome::Unchanged,
            Err(e) => {
                tracing::warn!(target: "feed", error = %e, user = %self.target, "poll failed");
                counter!(m::POLL_ERRORS_TOTAL).increment(1);
                return StepOutcome::PollFailed;
            }
        };

        let event = match parse_record(&record) {
            Ok(Some(ev)) => ev,
            Ok(None) => {
                counter!(m::RECORDS_IGNORED_TOTAL).increment(1);
                return StepOutcome::Unchanged;
            }
            Err(e) => {
                tracing::warn!(target: "feed", error = %e, "latest record is corrupt");
                counter!(m::PARSE_ERRORS_TOTAL).increment(1);
                return StepOutcome::Corrupt;
            }
        };

        if self
            .last_seen
            .as_ref()
            .is_some_and(|seen| seen.same_identity(&event))
        {
            tracing::trace!(target: "feed", id = event.id(), "same event");
            return StepOutcome::Unchanged;
        }

        let event = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return StepOutcome::Cancelled,
            ev = self.enriched(record, event) => ev,
        };
        let id = event.id();
        tracing::debug!(target: "feed", id, "new event detected");
        counter!(m::EVENTS_DETECTED_TOTAL).increment(1);
        self.queue.push(event);
        gauge!(m::QUEUE_DEPTH).set(self.queue.len() as f64);
        self.state = MonitorState::Draining;
        StepOutcome::Detected(id)
    }

    /// Re-parse after enrichment; keep the plain event if that goes wrong.
    async fn enriched(&self, record: RawRecord, plain: Event) -> Event {
        let record = enrich_within(self.source.as_ref(), record, self.request_timeout).await;
        match parse_record(&record) {
            Ok(Some(ev)) if ev.same_identity(&plain) => ev,
            Ok(_) => plain,
            Err(e) => {
                tracing::warn!(target: "feed", error = %e, "enriched record failed to parse");
                plain
            }
        }
    }
}

/// Enrich under the request timeout; on expiry keep the record as fetched.
async fn enrich_within(source: &dyn FeedSource, record: RawRecord, limit: Duration) -> RawRecord {
    match tokio::time::timeout(limit, source.enrich(record.clone())).await {
        Ok(enriched) => enriched,
        Err(_) => {
            tracing::warn!(
                target: "feed",
                source = source.name(),
                timeout_ms = limit.as_millis() as u64,
                "enrichment timed out, keeping plain record"
            );
            counter!(m::POLL_ERRORS_TOTAL).increment(1);
            record
        }
    }
}

fn flatten_timeout<T>(
    res: Result<Result<T, SourceError>, tokio::time::error::Elapsed>,
    limit: Duration,
) -> Result<T, SourceError> {
    res.unwrap_or(Err(SourceError::Timeout(limit)))
}
