// src/source/mod.rs
pub mod github;

use crate::error::SourceError;
use crate::parser::RawRecord;

/// Where feed records come from.
///
/// Implementations hold no per-feed state; every call is independent. Any error
/// is treated by the monitor as "nothing new this cycle".
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// The most recent `page_size` records of `user`'s feed, newest first.
    async fn fetch_snapshot(
        &self,
        user: &str,
        page_size: usize,
    ) -> Result<Vec<RawRecord>, SourceError>;

    /// The single most recent record, or `None` if the feed is empty.
    async fn fetch_latest(&self, user: &str) -> Result<Option<RawRecord>, SourceError>;

    /// Fill in extra detail (e.g. commit stats) for a record that is about to be
    /// queued. Must not fail; on trouble return the record unchanged.
    async fn enrich(&self, record: RawRecord) -> RawRecord {
        record
    }

    fn name(&self) -> &'static str;
}
