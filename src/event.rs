// src/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced an event: the watched user, or someone acting on their behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    MadeByUser,
    MadeForUser,
}

/// Line stats for one commit (only files that count as code).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// Number of commits in the push, as reported by the feed.
    pub size: u64,
    /// Empty unless commit enrichment is turned on.
    pub commits: Vec<Commit>,
}

/// A feed activity we know how to model. New kinds are added here and in
/// `parser::parse_record`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    Push(PushEvent),
}

impl Event {
    /// Identity key. Equality only, never ordering.
    pub fn id(&self) -> i64 {
        match self {
            Event::Push(p) => p.id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Push(p) => p.timestamp,
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Event::Push(_) => Origin::MadeByUser,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Push(_) => "push",
        }
    }

    pub fn same_identity(&self, other: &Event) -> bool {
        self.id() == other.id()
    }
}
