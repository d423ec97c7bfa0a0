// src/parser.rs
//! Raw feed record -> typed [`Event`].
//!
//! `Ok(None)` means the record is a kind we do not model and should be skipped.
//! `Err(_)` means the record is a modelled kind but structurally corrupt.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ParseError;
use crate::event::{Commit, Event, PushEvent};

/// One undecoded record as delivered by the feed API.
pub type RawRecord = Value;

/// Wire format of `created_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn parse_record(record: &RawRecord) -> Result<Option<Event>, ParseError> {
    match record.get("type").and_then(Value::as_str) {
        Some("PushEvent") => parse_push(record).map(|p| Some(Event::Push(p))),
        _ => Ok(None),
    }
}

fn parse_push(record: &RawRecord) -> Result<PushEvent, ParseError> {
    let timestamp = parse_timestamp(record.get("created_at"))?;
    let id = int_field(record.get("id"), "id")?;

    let payload = record
        .get("payload")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::Shape {
            field: "payload",
            reason: "expected an object".into(),
        })?;

    let size = int_field(payload.get("size"), "size")?;

    let entries = payload
        .get("commits")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::Shape {
            field: "commits",
            reason: "expected an array".into(),
        })?;

    // The events API does not carry line stats; only enriched entries have them.
    let mut commits = Vec::new();
    for entry in entries {
        if entry.get("additions").is_some() || entry.get("deletions").is_some() {
            commits.push(parse_file_stats(entry)?);
        }
    }

    Ok(PushEvent {
        id,
        timestamp,
        size,
        commits,
    })
}

pub fn parse_timestamp(v: Option<&Value>) -> Result<DateTime<Utc>, ParseError> {
    let raw = match v {
        Some(Value::String(s)) => s.as_str(),
        other => {
            return Err(ParseError::Timestamp {
                value: other.map(Value::to_string).unwrap_or_default(),
            })
        }
    };
    let bad = || ParseError::Timestamp {
        value: raw.to_string(),
    };
    if !has_timestamp_shape(raw) {
        return Err(bad());
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| bad())
}

/// `YYYY-MM-DDTHH:MM:SSZ`, zero-padded, no surrounding whitespace, no leap
/// second. chrono alone accepts all of those.
fn has_timestamp_shape(raw: &str) -> bool {
    const LAYOUT: &[u8; 20] = b"dddd-dd-ddTdd:dd:ddZ";
    let bytes = raw.as_bytes();
    if bytes.len() != LAYOUT.len() {
        return false;
    }
    let laid_out = bytes.iter().zip(LAYOUT).all(|(&b, &want)| match want {
        b'd' => b.is_ascii_digit(),
        sep => b == sep,
    });
    laid_out && &bytes[17..19] < b"60".as_slice()
}

/// Integer field that may arrive as a JSON number or a quoted numeric string.
pub fn int_field<T>(v: Option<&Value>, field: &'static str) -> Result<T, ParseError>
where
    T: TryFrom<i64>,
{
    let bad = |value: String| ParseError::Numeric { field, value };
    let n: i64 = match v {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| bad(n.to_string()))?,
        Some(Value::String(s)) => s.parse().map_err(|_| bad(format!("{s:?}")))?,
        Some(other) => return Err(bad(other.to_string())),
        None => return Err(bad("<missing>".into())),
    };
    T::try_from(n).map_err(|_| bad(n.to_string()))
}

/// Additions/deletions of an enriched commit entry or of one changed file in a
/// commit detail.
pub fn parse_file_stats(file: &Value) -> Result<Commit, ParseError> {
    Ok(Commit {
        additions: int_field(file.get("additions"), "additions")?,
        deletions: int_field(file.get("deletions"), "deletions")?,
    })
}

/// `payload.commits[].url` of a push record, in payload order.
/// Entries without a url come back as `None` so indices stay aligned.
pub fn commit_urls(record: &RawRecord) -> Vec<Option<String>> {
    record
        .pointer("/payload/commits")
        .and_then(Value::as_array)
        .map(|commits| {
            commits
                .iter()
                .map(|c| c.get("url").and_then(Value::as_str).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
