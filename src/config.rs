// src/config.rs
//! Monitor configuration.
//!
//! Sources, lowest to highest precedence:
//! 1) built-in defaults
//! 2) TOML file at `$MONITOR_CONFIG_PATH`, else `config/monitor.toml` if present
//! 3) environment variables (a `.env` file is loaded by the binary)
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

pub const DEFAULT_PAGE_SIZE: usize = 67;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Largest page the events API serves in one request.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub api_key: String,
    /// Account used for basic auth.
    pub username: String,
    /// Owner of the watched feed.
    pub target: String,
    pub page_size: usize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub base_url: String,
    /// Abort startup on a corrupt snapshot record instead of skipping it.
    pub strict_snapshot: bool,
    pub enrich_commits: bool,
    pub webhook_url: Option<String>,
}

impl MonitorConfig {
    /// Defaults for watching `target`, unauthenticated.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            api_key: String::new(),
            username: String::new(),
            target: target.into(),
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            base_url: DEFAULT_BASE_URL.to_string(),
            strict_snapshot: false,
            enrich_commits: false,
            webhook_url: None,
        }
    }

    /// Load from the default file location (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                load_file(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    load_file(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Ok(Self::from_sources(file, |k| std::env::var(k).ok())?)
    }

    /// Merge a parsed file with an environment lookup. Env wins.
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |k: &str| env(k).filter(|v| !v.trim().is_empty());

        let username = env("USERNAME")
            .or(file.username)
            .ok_or(ConfigError::Missing("USERNAME"))?;
        let api_key = env("API_KEY")
            .or(file.api_key)
            .ok_or(ConfigError::Missing("API_KEY"))?;
        let target = env("FEED_TARGET")
            .or(file.target)
            .unwrap_or_else(|| username.clone());

        let mut cfg = Self::new(target);
        cfg.username = username;
        cfg.api_key = api_key;

        let page_size = match env("FEED_PAGE_SIZE") {
            Some(v) => parse_num("FEED_PAGE_SIZE", &v)?,
            None => file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                key: "FEED_PAGE_SIZE",
                value: page_size.to_string(),
            });
        }
        cfg.page_size = page_size;

        if let Some(secs) = secs_setting(&env, "POLL_INTERVAL_SECS", file.poll_interval_secs)? {
            cfg.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) =
            secs_setting(&env, "REQUEST_TIMEOUT_SECS", file.request_timeout_secs)?
        {
            cfg.request_timeout = Duration::from_secs(secs);
        }

        if let Some(url) = env("GITHUB_API_URL").or(file.base_url) {
            cfg.base_url = url.trim_end_matches('/').to_string();
        }
        cfg.strict_snapshot = match env("STRICT_SNAPSHOT") {
            Some(v) => parse_bool("STRICT_SNAPSHOT", &v)?,
            None => file.strict_snapshot.unwrap_or(false),
        };
        cfg.enrich_commits = match env("ENRICH_COMMITS") {
            Some(v) => parse_bool("ENRICH_COMMITS", &v)?,
            None => file.enrich_commits.unwrap_or(false),
        };
        cfg.webhook_url = env("WEBHOOK_URL").or(file.webhook_url);

        Ok(cfg)
    }
}

/// On-disk shape of `config/monitor.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub target: Option<String>,
    pub page_size: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub base_url: Option<String>,
    pub strict_snapshot: Option<bool>,
    pub enrich_commits: Option<bool>,
    pub webhook_url: Option<String>,
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading monitor config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn secs_setting<F>(env: &F, key: &'static str, file: Option<u64>) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match env(key) {
        Some(v) => Some(parse_num::<u64>(key, &v)?),
        None => file,
    };
    match secs {
        Some(0) => Err(ConfigError::Invalid {
            key,
            value: "0".into(),
        }),
        other => Ok(other),
    }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, v: &str) -> Result<T, ConfigError> {
    v.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: v.to_string(),
    })
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: v.to_string(),
        }),
    }
}
