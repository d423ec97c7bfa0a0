// tests/common/mod.rs
#![allow(dead_code)]

use push_feed_monitor::{FeedSource, RawRecord, SourceError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn push_record(id: impl Into<Value>, created_at: &str) -> Value {
    json!({
        "type": "PushEvent",
        "id": id.into(),
        "created_at": created_at,
        "payload": { "size": "1", "commits": [] }
    })
}

pub fn issues_record(id: i64, created_at: &str) -> Value {
    json!({
        "type": "IssuesEvent",
        "id": id.to_string(),
        "created_at": created_at,
        "payload": { "action": "opened" }
    })
}

/// What one `fetch_latest` call returns.
pub enum Reply {
    Record(Value),
    Empty,
    Fail,
    Hang,
}

/// Feed source driven by a script. Once the script runs out, the last reply
/// is repeated.
pub struct ScriptedSource {
    snapshot: Option<Vec<Value>>,
    latest: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Value>>,
    latest_calls: AtomicUsize,
    /// Per-record enrichment delay, keyed by position in the snapshot order.
    enrich_delay: Option<fn(&Value) -> Duration>,
}

impl ScriptedSource {
    pub fn new(snapshot: Vec<Value>) -> Self {
        Self {
            snapshot: Some(snapshot),
            latest: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            latest_calls: AtomicUsize::new(0),
            enrich_delay: None,
        }
    }

    pub fn failing_snapshot() -> Self {
        let mut s = Self::new(vec![]);
        s.snapshot = None;
        s
    }

    pub fn then(self, reply: Reply) -> Self {
        self.latest.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_enrich_delay(mut self, f: fn(&Value) -> Duration) -> Self {
        self.enrich_delay = Some(f);
        self
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> SourceError {
    SourceError::Status {
        url: "scripted".into(),
        status: 503,
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch_snapshot(
        &self,
        _user: &str,
        page_size: usize,
    ) -> Result<Vec<RawRecord>, SourceError> {
        match &self.snapshot {
            Some(records) => Ok(records.iter().take(page_size).cloned().collect()),
            None => Err(unavailable()),
        }
    }

    async fn fetch_latest(&self, _user: &str) -> Result<Option<RawRecord>, SourceError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.latest.lock().unwrap().pop_front();
        let reply = match next {
            Some(r) => r,
            None => match self.last.lock().unwrap().clone() {
                Some(v) => Reply::Record(v),
                None => Reply::Empty,
            },
        };
        match reply {
            Reply::Record(v) => {
                *self.last.lock().unwrap() = Some(v.clone());
                Ok(Some(v))
            }
            Reply::Empty => Ok(None),
            Reply::Fail => Err(unavailable()),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn enrich(&self, record: RawRecord) -> RawRecord {
        if let Some(delay) = self.enrich_delay {
            tokio::time::sleep(delay(&record)).await;
        }
        record
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
