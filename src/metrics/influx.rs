use super::{MetricsSink, StatusPoint};
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// InfluxDB v2 writer.
///
/// `POST {url}/api/v2/write?org=..&bucket=..&precision=s` with a
/// `Token` authorization header and a line-protocol body.
pub struct InfluxMetricsSink {
    write_url: String,
    token: String,
    org: String,
    bucket: String,
    http_client: Client,
}

impl InfluxMetricsSink {
    /// Builds a sink from a validated, enabled metrics config.
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        let setting = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| Error::Config(format!("metrics {} not set", name)))
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            write_url: format!(
                "{}/api/v2/write",
                setting(&config.url, "url")?.trim_end_matches('/')
            ),
            token: setting(&config.token, "token")?,
            org: setting(&config.org, "org")?,
            bucket: setting(&config.bucket, "bucket")?,
            http_client,
        })
    }

    async fn write(&self, body: String) -> anyhow::Result<()> {
        let response = self
            .http_client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .context("Failed to send metrics write request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            anyhow::bail!("metrics write rejected with status {}: {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl MetricsSink for InfluxMetricsSink {
    async fn record(
        &self,
        eui: &str,
        structure_id: &str,
        structure_name: &str,
        is_online: bool,
        at: DateTime<Tz>,
    ) -> Result<()> {
        let line = StatusPoint {
            eui: eui.to_string(),
            structure_id: structure_id.to_string(),
            structure_name: structure_name.to_string(),
            is_online,
            at,
        }
        .to_line_protocol();

        debug!(line = %line, "Writing status point");
        self.write(line).await.map_err(Error::sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Helsinki;
    use mockito::{Matcher, Server};

    fn config_for(url: String) -> MetricsConfig {
        MetricsConfig {
            enabled: Some(true),
            url: Some(url),
            token: Some("influx-token".to_string()),
            org: Some("plant-ops".to_string()),
            bucket: Some("sensors".to_string()),
            ..MetricsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_record_writes_line_protocol() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "plant-ops".into()),
                Matcher::UrlEncoded("bucket".into(), "sensors".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            .match_header("authorization", "Token influx-token")
            .match_body(
                "sensor_status,eui=AA11BB22,structure_id=S1,structure_name=Plant\\ 1 is_online=true 1792391400",
            )
            .with_status(204)
            .create_async()
            .await;

        let sink = InfluxMetricsSink::new(&config_for(server.url())).unwrap();
        let at = Helsinki.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        sink.record("AA11BB22", "S1", "Plant 1", true, at).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_write_is_sink_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"code":"unauthorized"}"#)
            .create_async()
            .await;

        let sink = InfluxMetricsSink::new(&config_for(server.url())).unwrap();
        let at = Helsinki.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let err = sink.record("AA11BB22", "S1", "Plant 1", false, at).await.unwrap_err();

        assert!(matches!(err, Error::SinkFailure(_)));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_missing_setting_is_config_error() {
        let mut config = config_for("http://influx:8086".to_string());
        config.bucket = None;

        let err = InfluxMetricsSink::new(&config).err().expect("bucket is required");
        assert_eq!(err, Error::Config("metrics bucket not set".to_string()));
    }
}
