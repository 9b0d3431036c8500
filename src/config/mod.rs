use crate::error::{Error, Result};
use chrono_tz::Tz;
use serde::Deserialize;

pub const DEFAULT_NOTIFY_URL: &str = "https://api.pushover.net/1/messages.json";
pub const DEFAULT_TIMEZONE: &str = "Europe/Helsinki";

/// Environment variable pointing at an optional TOML config file.
pub const CONFIG_PATH_VAR: &str = "SENSORWATCH_CONFIG";

/// Complete sensorwatch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Structure directory (sensor telemetry API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub paging: Paging,
    /// Upper bound on pages fetched when `paging = "pages"`
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How the structure listing is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paging {
    /// One `GET {base}/structures` request
    #[default]
    None,
    /// `GET {base}/structures?page=N` from 0 until an empty page
    Pages,
}

impl std::str::FromStr for Paging {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Paging::None),
            "pages" => Ok(Paging::Pages),
            other => Err(Error::Config(format!(
                "unknown paging strategy '{}': expected 'none' or 'pages'",
                other
            ))),
        }
    }
}

fn default_max_pages() -> u32 {
    50
}

fn default_timeout_secs() -> u64 {
    30
}

/// Sensor state store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "sensorwatch.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Push notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_url")]
    pub url: String,
    pub token: String,
    pub user: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_notify_url() -> String {
    DEFAULT_NOTIFY_URL.to_string()
}

/// Time-series metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Explicit switch; when absent, metrics are on iff `url` is set
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    /// IANA zone the metric and digest timestamps are reported in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            url: None,
            token: None,
            org: None,
            bucket: None,
            timezone: default_timezone(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MetricsConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(self.url.is_some())
    }

    /// Parses the configured reporting timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::Config(format!("unknown timezone '{}'", self.timezone)))
    }
}

impl Config {
    /// Loads configuration from the TOML file named by `SENSORWATCH_CONFIG`,
    /// or from individual environment variables when it is unset.
    pub fn load() -> Result<Self> {
        let config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds configuration from environment variables:
    /// - `SENSORWATCH_API_BASE_URL`, `SENSORWATCH_API_KEY` (required)
    /// - `SENSORWATCH_API_PAGING`, `SENSORWATCH_API_MAX_PAGES`
    /// - `SENSORWATCH_STORE_PATH`
    /// - `SENSORWATCH_PUSHOVER_TOKEN`, `SENSORWATCH_PUSHOVER_USER` (required), `SENSORWATCH_PUSHOVER_URL`
    /// - `SENSORWATCH_METRICS_ENABLED`, `SENSORWATCH_INFLUX_URL`, `SENSORWATCH_INFLUX_TOKEN`,
    ///   `SENSORWATCH_INFLUX_ORG`, `SENSORWATCH_INFLUX_BUCKET`
    /// - `SENSORWATCH_TIMEZONE`
    /// - `SENSORWATCH_HTTP_TIMEOUT_SECS`, shared by every outbound client
    pub fn from_env() -> Result<Self> {
        let timeout_secs =
            parse_optional("SENSORWATCH_HTTP_TIMEOUT_SECS")?.unwrap_or_else(default_timeout_secs);

        let directory = DirectoryConfig {
            base_url: required("SENSORWATCH_API_BASE_URL")?,
            api_key: required("SENSORWATCH_API_KEY")?,
            paging: optional("SENSORWATCH_API_PAGING")
                .map(|v| v.parse::<Paging>())
                .transpose()?
                .unwrap_or_default(),
            max_pages: parse_optional("SENSORWATCH_API_MAX_PAGES")?.unwrap_or_else(default_max_pages),
            timeout_secs,
        };

        let store = StoreConfig {
            path: optional("SENSORWATCH_STORE_PATH").unwrap_or_else(default_store_path),
        };

        let notify = NotifyConfig {
            url: optional("SENSORWATCH_PUSHOVER_URL").unwrap_or_else(default_notify_url),
            token: required("SENSORWATCH_PUSHOVER_TOKEN")?,
            user: required("SENSORWATCH_PUSHOVER_USER")?,
            timeout_secs,
        };

        let metrics = MetricsConfig {
            enabled: parse_optional("SENSORWATCH_METRICS_ENABLED")?,
            url: optional("SENSORWATCH_INFLUX_URL"),
            token: optional("SENSORWATCH_INFLUX_TOKEN"),
            org: optional("SENSORWATCH_INFLUX_ORG"),
            bucket: optional("SENSORWATCH_INFLUX_BUCKET"),
            timezone: optional("SENSORWATCH_TIMEZONE").unwrap_or_else(default_timezone),
            timeout_secs,
        };

        Ok(Self {
            directory,
            store,
            notify,
            metrics,
        })
    }

    /// Checks cross-field requirements serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.directory.base_url.trim().is_empty() {
            return Err(Error::Config("directory base_url is empty".to_string()));
        }
        if [
            self.directory.timeout_secs,
            self.notify.timeout_secs,
            self.metrics.timeout_secs,
        ]
        .contains(&0)
        {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.directory.paging == Paging::Pages && self.directory.max_pages == 0 {
            return Err(Error::Config("directory max_pages must be at least 1".to_string()));
        }

        self.metrics.tz()?;

        if self.metrics.is_enabled() {
            let missing: Vec<&str> = [
                ("url", &self.metrics.url),
                ("token", &self.metrics.token),
                ("org", &self.metrics.org),
                ("bucket", &self.metrics.bucket),
            ]
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect();

            if !missing.is_empty() {
                return Err(Error::Config(format!(
                    "metrics enabled but missing: {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path, e)))?;
    toml::from_str(&contents).map_err(|e| Error::Config(format!("cannot parse {}: {}", path, e)))
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{} not set", name)))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_optional<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    optional(name)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| Error::Config(format!("{} has invalid value '{}'", name, v)))
        })
        .transpose()
}
