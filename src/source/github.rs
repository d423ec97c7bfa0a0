// src/source/github.rs
//! GitHub `/users/{user}/events` feed over HTTPS.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::MonitorConfig;
use crate::error::SourceError;
use crate::event::Commit;
use crate::parser::{commit_urls, parse_file_stats, RawRecord};
use crate::source::FeedSource;

const USER_AGENT: &str = concat!("push-feed-monitor/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

/// Extensions that do not count toward commit line stats.
const NON_CODE_EXTENSIONS: &[&str] = &[
    "md", "txt", "lock", "json", "toml", "yml", "yaml", "png", "jpg", "jpeg", "gif", "svg",
];

#[derive(Clone)]
struct HttpGetter {
    client: Client,
    username: String,
    api_key: String,
    timeout: Duration,
}

impl HttpGetter {
    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let mut req = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .timeout(self.timeout);
        if !self.username.is_empty() {
            req = req.basic_auth(&self.username, Some(&self.api_key));
        }

        let resp = req.send().await.map_err(|e| self.transport(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|e| self.transport(url, e))?;
        serde_json::from_str(&body).map_err(|e| SourceError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn transport(&self, url: &str, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }

    /// Sum of code-file line stats for one commit.
    async fn commit_stats(&self, url: &str) -> Result<Commit, SourceError> {
        let detail = self.get_json(url).await?;
        let files = detail
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Body {
                url: url.to_string(),
                reason: "commit has no files array".into(),
            })?;

        let mut total = Commit::default();
        for file in files {
            let name = file.get("filename").and_then(Value::as_str).unwrap_or("");
            if !is_code_file(name) {
                continue;
            }
            let stats = parse_file_stats(file).map_err(|e| SourceError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            total.additions += stats.additions;
            total.deletions += stats.deletions;
        }
        Ok(total)
    }
}

pub struct GithubSource {
    http: HttpGetter,
    base_url: String,
    enrich_commits: bool,
}

impl GithubSource {
    pub fn new(cfg: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self {
            http: HttpGetter {
                client,
                username: cfg.username.clone(),
                api_key: cfg.api_key.clone(),
                timeout: cfg.request_timeout,
            },
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            enrich_commits: cfg.enrich_commits,
        })
    }

    pub fn events_url(&self, user: &str, per_page: usize) -> String {
        format!("{}/users/{}/events?per_page={}", self.base_url, user, per_page)
    }

    async fn fetch_page(&self, user: &str, per_page: usize) -> Result<Vec<RawRecord>, SourceError> {
        let url = self.events_url(user, per_page);
        match self.http.get_json(&url).await? {
            Value::Array(records) => Ok(records),
            other => Err(SourceError::Body {
                url,
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }
}

#[async_trait]
impl FeedSource for GithubSource {
    async fn fetch_snapshot(
        &self,
        user: &str,
        page_size: usize,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let records = self.fetch_page(user, page_size).await?;
        tracing::debug!(target: "feed", user, count = records.len(), "snapshot fetched");
        Ok(records)
    }

    async fn fetch_latest(&self, user: &str) -> Result<Option<RawRecord>, SourceError> {
        Ok(self.fetch_page(user, 1).await?.into_iter().next())
    }

    async fn enrich(&self, mut record: RawRecord) -> RawRecord {
        if !self.enrich_commits || record.get("type").and_then(Value::as_str) != Some("PushEvent")
        {
            return record;
        }

        let urls = commit_urls(&record);
        let mut stats = vec![Commit::default(); urls.len()];
        let mut set = JoinSet::new();
        for (idx, url) in urls.into_iter().enumerate() {
            let Some(url) = url else { continue };
            let http = self.http.clone();
            set.spawn(async move {
                let res = http.commit_stats(&url).await;
                (idx, url, res)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, _, Ok(c))) => stats[idx] = c,
                Ok((_, url, Err(e))) => {
                    tracing::warn!(target: "feed", error = %e, url = %url, "commit stats unavailable");
                }
                Err(e) => tracing::warn!(target: "feed", error = ?e, "commit stats task failed"),
            }
        }

        if let Some(commits) = record
            .pointer_mut("/payload/commits")
            .and_then(Value::as_array_mut)
        {
            for (entry, c) in commits.iter_mut().zip(&stats) {
                if let Some(obj) = entry.as_object_mut() {
                    obj.insert("additions".into(), Value::from(c.additions));
                    obj.insert("deletions".into(), Value::from(c.deletions));
                }
            }
        }
        record
    }

    fn name(&self) -> &'static str {
        "github"
    }
}

/// Whether a changed file counts toward commit line stats.
pub fn is_code_file(filename: &str) -> bool {
    if filename.is_empty() {
        return false;
    }
    let base = filename.rsplit('/').next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            !NON_CODE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => true,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
