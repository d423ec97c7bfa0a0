// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod monitor;
pub mod parser;
pub mod queue;
pub mod sink;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::config::MonitorConfig;
pub use crate::error::{ConfigError, MonitorError, ParseError, SourceError};
pub use crate::event::{Commit, Event, Origin, PushEvent};
pub use crate::monitor::{FeedMonitor, MonitorState, StepOutcome};
pub use crate::parser::{parse_record, RawRecord};
pub use crate::queue::FeedQueue;
pub use crate::sink::{ChannelSink, EventSink, FanoutSink, LogSink};
pub use crate::source::{github::GithubSource, FeedSource};
