/// Client for the external metadata crawler
use std::fmt;

use serde::Deserialize;

use crate::config::AppConfig;
use crate::workflow::Crawler;

/// Open-Graph style metadata returned by the crawler.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrawlData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(rename = "site_name")]
    pub site_name: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrawlEnvelope {
    #[serde(default)]
    data: CrawlData,
}

/// Every crawler failure shows the user the same message; the detail is
/// only for the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    Status(u16),
    Transport(String),
    Body(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Crawl request failed.")
    }
}

pub struct CrawlClient {
    endpoint: String,
    http: reqwest::Client,
}

impl CrawlClient {
    pub fn new(config: &AppConfig) -> Self {
        CrawlClient {
            endpoint: format!("{}/crawl", config.crawl_endpoint.trim_end_matches('/')),
            http: reqwest::Client::new(),
        }
    }

    /// `POST /crawl {"url": …}`; any non-2xx status is total failure.
    pub async fn fetch_metadata(&self, url: &str) -> Result<CrawlData, CrawlError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| CrawlError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CrawlError::Status(response.status().as_u16()));
        }

        let envelope: CrawlEnvelope = response
            .json()
            .await
            .map_err(|e| CrawlError::Body(e.to_string()))?;
        Ok(envelope.data)
    }
}

impl Crawler for CrawlClient {
    async fn crawl(&self, url: &str) -> Result<CrawlData, CrawlError> {
        self.fetch_metadata(url).await
    }
}
