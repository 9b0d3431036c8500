use super::NotificationSink;
use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Pushover-style notifier: form POST with `token`, `user`, `message` and an
/// optional `html=1`. Only HTTP 200 counts as delivered.
pub struct PushoverNotifier {
    url: String,
    token: String,
    user: String,
    http_client: Client,
}

impl PushoverNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            token: config.token.clone(),
            user: config.user.clone(),
            http_client,
        })
    }

    async fn post(&self, message: &str, html: bool) -> anyhow::Result<()> {
        let mut form = vec![
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("message", message),
        ];
        if html {
            form.push(("html", "1"));
        }

        let response = self
            .http_client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .context("Failed to send push notification request")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            anyhow::bail!("push notification rejected with status {}: {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for PushoverNotifier {
    async fn send(&self, message: &str, html: bool) -> Result<()> {
        self.post(message, html).await.map_err(Error::sink)?;
        debug!(html = html, "Push notification sent");
        Ok(())
    }
}
