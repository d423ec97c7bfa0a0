use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::EventSink;
use crate::event::Event;

/// Posts each event as an embed to a Discord-compatible webhook.
#[derive(Clone)]
pub struct WebhookSink {
    webhook: String,
    feed_owner: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookSink {
    pub fn new(webhook: String, feed_owner: String) -> Self {
        Self {
            webhook,
            feed_owner,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub async fn send_event(&self, event: &Event) -> Result<()> {
        let payload = WebhookPayload::for_event(&self.feed_owner, event);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait::async_trait]
impl EventSink for WebhookSink {
    async fn deliver(&self, event: &Event) {
        if let Err(e) = self.send_event(event).await {
            tracing::warn!(target: "feed", id = event.id(), error = %e, "webhook delivery failed");
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl WebhookPayload {
    fn for_event(owner: &str, event: &Event) -> Self {
        let (title, description) = match event {
            Event::Push(p) => {
                let mut desc = format!("**Commits:** {}\n**Event:** {}", p.size, p.id);
                if !p.commits.is_empty() {
                    let adds: u64 = p.commits.iter().map(|c| c.additions).sum();
                    let dels: u64 = p.commits.iter().map(|c| c.deletions).sum();
                    desc.push_str(&format!("\n**Lines:** +{adds} / -{dels}"));
                }
                (format!("{owner} pushed"), desc)
            }
        };
        Self {
            content: None,
            embeds: vec![Embed {
                title,
                description,
                timestamp: event.timestamp().to_rfc3339(),
            }],
        }
    }
}
