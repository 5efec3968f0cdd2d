/// REST client for the hosted data store
///
/// The store is a PostgREST-style backend: table access under `/rest/v1`,
/// bearer token per call, errors as `{ code, message }` JSON bodies.
use std::fmt;

use serde::Deserialize;
use serde_json::json;

use crate::category::Category;
use crate::config::AppConfig;
use crate::link::NewLink;
use crate::workflow::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An error the store itself reported; shown to the user verbatim.
    Api { code: String, message: String },
    /// The request never produced a store response.
    Network(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Api { code, message } => write!(f, "{} {}", code, message),
            StoreError::Network(_) => write!(f, "Save failed: network error."),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Map a non-2xx response body to a `StoreError`, falling back to the HTTP
/// status when the body is not the expected error shape.
fn parse_api_error(status: u16, body: &str) -> StoreError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    StoreError::Api {
        code: parsed.code.unwrap_or_else(|| status.to_string()),
        message: parsed.message.unwrap_or_else(|| "request failed".to_string()),
    }
}

pub struct StoreClient {
    rest_base: String,
    anon_key: String,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(config: &AppConfig) -> Self {
        StoreClient {
            rest_base: format!("{}/rest/v1", config.store_url.trim_end_matches('/')),
            anon_key: config.store_anon_key.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_base, table)
    }

    fn authorize(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(parse_api_error(status.as_u16(), &body))
    }

    /// `select id, name from categories order by name asc`, row-level
    /// permissions scope the result to the caller.
    pub async fn list_categories(&self, token: &str) -> Result<Vec<Category>, StoreError> {
        let request = self
            .http
            .get(self.table_url("categories"))
            .query(&[("select", "id,name"), ("order", "name.asc")]);
        let response = self
            .authorize(request, token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::checked(response)
            .await?
            .json::<Vec<Category>>()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn create_category(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Category, StoreError> {
        let request = self
            .http
            .post(self.table_url("categories"))
            .header("Prefer", "return=representation")
            // Ask for a single object back instead of a one-row array.
            .header("Accept", "application/vnd.pgrst.object+json")
            .json(&json!({ "user_id": user_id, "name": name }));
        let response = self
            .authorize(request, token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::checked(response)
            .await?
            .json::<Category>()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn create_link(&self, token: &str, link: &NewLink) -> Result<(), StoreError> {
        let request = self
            .http
            .post(self.table_url("links"))
            .header("Prefer", "return=minimal")
            .json(link);
        let response = self
            .authorize(request, token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::checked(response).await?;
        Ok(())
    }
}

impl Store for StoreClient {
    async fn insert_category(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Category, StoreError> {
        self.create_category(token, user_id, name).await
    }

    async fn insert_link(&self, token: &str, link: &NewLink) -> Result<(), StoreError> {
        self.create_link(token, link).await
    }
}
