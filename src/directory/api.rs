use super::payload::{parse_sensors, parse_structures};
use super::{Listing, StructureDirectory};
use crate::config::{DirectoryConfig, Paging};
use crate::error::{Error, Result};
use crate::model::{ObservedSensor, Structure};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the sensor telemetry REST API.
///
/// Authenticates with a Bearer token. One instance is built at startup and
/// reused for every pass.
pub struct DirectoryClient {
    api_key: String,
    http_client: Client,
    base_url: Url,
    paging: Paging,
    max_pages: u32,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("sensorwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            Error::Config(format!("invalid directory base_url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "directory base_url '{}' cannot hold a path",
                config.base_url
            )));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            http_client,
            base_url,
            paging: config.paging,
            max_pages: config.max_pages,
        })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))
            .map_err(Error::directory)?;

        check_response_status(&response).map_err(Error::directory)?;

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::MalformedResponse(format!("{} returned invalid JSON: {}", url, e)))
    }

    async fn list_structure_pages(&self) -> Result<Listing<Structure>> {
        let mut listing = Listing::default();
        let mut seen = HashSet::new();

        for page in 0..self.max_pages {
            let mut url = self.endpoint(&["structures"]);
            url.query_pairs_mut().append_pair("page", &page.to_string());
            let page_listing = parse_structures(&self.get_json(url).await?)?;

            if page_listing.items.is_empty() && page_listing.malformed == 0 {
                debug!(page = page, "Reached empty structure page");
                return Ok(listing);
            }

            let fetched = page_listing.items.len();
            let known = listing.items.len();
            listing.malformed += page_listing.malformed;
            listing.items.extend(
                page_listing
                    .items
                    .into_iter()
                    .filter(|structure| seen.insert(structure.id.clone())),
            );

            // An API that ignores `page` keeps returning the same structures
            if fetched > 0 && listing.items.len() == known {
                debug!(page = page, "Structure page added no new ids, stopping");
                return Ok(listing);
            }
        }

        warn!(
            max_pages = self.max_pages,
            structures = listing.items.len(),
            "Structure listing hit the page limit, later pages were not fetched"
        );
        Ok(listing)
    }
}

#[async_trait]
impl StructureDirectory for DirectoryClient {
    async fn list_structures(&self) -> Result<Listing<Structure>> {
        match self.paging {
            Paging::None => {
                let body = self.get_json(self.endpoint(&["structures"])).await?;
                parse_structures(&body)
            }
            Paging::Pages => self.list_structure_pages().await,
        }
    }

    async fn list_sensors(&self, structure: &Structure) -> Result<Listing<ObservedSensor>> {
        let body = self
            .get_json(self.endpoint(&["structures", &structure.id]))
            .await?;
        parse_sensors(structure, &body)
    }
}

/// Check the response status and map known error codes to descriptive errors.
///
/// - 401 → auth error (API key rejected)
/// - 404 → unknown resource
/// - 429 → rate limit (logs Retry-After)
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> anyhow::Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("directory auth error: API key rejected")),
        StatusCode::NOT_FOUND => Err(anyhow!("directory resource not found: {}", response.url())),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            Err(anyhow!(
                "directory rate limit exceeded (Retry-After: {})",
                retry_after
            ))
        }
        s if !s.is_success() => Err(anyhow!("directory API error: {}", s)),
        _ => Ok(()),
    }
}
