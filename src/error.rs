//! Error types for the feed monitor.
//!
//! The split matters for recovery: a [`SourceError`] means "no new information
//! this cycle" and is always absorbed by the poll loop, while a [`ParseError`]
//! means a record is structurally corrupt.

/// Transient failure talking to the feed source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered with a non-success status (auth, rate limit, 5xx)
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body was not the JSON array we expect
    #[error("undecodable feed body from {url}: {reason}")]
    Body { url: String, reason: String },

    /// The call did not finish within the configured request timeout
    #[error("feed request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A record that claims to be a modelled kind but cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid created_at {value:?}: expected YYYY-MM-DDTHH:MM:SSZ")]
    Timestamp { value: String },

    #[error("field `{field}` is not an integer: {value}")]
    Numeric { field: &'static str, value: String },

    #[error("field `{field}` has the wrong shape: {reason}")]
    Shape { field: &'static str, reason: String },
}

/// Errors that stop the monitor before it enters the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A snapshot record failed to parse while strict snapshot loading is on
    #[error("snapshot record #{index} is corrupt: {source}")]
    Snapshot {
        index: usize,
        #[source]
        source: ParseError,
    },
}

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
