/// Startup configuration for the popup
///
/// The host page hands a configuration object to `start_popup` once at
/// startup; components receive it by reference/props and never read ambient
/// globals.
use std::fmt;

use serde::Deserialize;
use url::Url;

/// Configuration handed over from the extension's JS side.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Base URL of the hosted data store (PostgREST-style REST under `/rest/v1`).
    pub store_url: String,
    /// Publishable (anon) API key for the data store.
    pub store_anon_key: String,
    /// Base URL of the metadata crawler (`POST {crawl_endpoint}/crawl`).
    pub crawl_endpoint: String,
    /// Hosted sign-in page, opened in a new browser tab when signed out.
    pub sign_in_url: String,
    /// Hosted sign-up page, same routing as sign-in.
    pub sign_up_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration field {} is not a valid URL: {}", self.field, self.value)
    }
}

impl AppConfig {
    /// Validate every endpoint URL and normalize away trailing slashes.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("storeUrl", &self.store_url),
            ("crawlEndpoint", &self.crawl_endpoint),
            ("signInUrl", &self.sign_in_url),
            ("signUpUrl", &self.sign_up_url),
        ] {
            Url::parse(value).map_err(|_| ConfigError {
                field,
                value: value.clone(),
            })?;
        }

        self.store_url = self.store_url.trim_end_matches('/').to_string();
        self.crawl_endpoint = self.crawl_endpoint.trim_end_matches('/').to_string();
        Ok(self)
    }
}
