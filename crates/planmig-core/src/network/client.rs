//! HTTP client for a PostgREST-style table API.
//!
//! Provides a thin wrapper around reqwest with:
//! - Service-key authentication headers on every request
//! - URL construction for `<base>/rest/v1/<table>` with filter parameters
//! - Status checking that turns non-2xx responses into typed errors
//! - Configurable timeouts

use crate::config::{NetworkConfig, StoreCredentials};
use crate::{MigrateError, Result};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

/// HTTP client bound to one store.
pub struct RestClient {
    client: Client,
    base_url: Url,
    service_key: String,
    /// Store name used in errors and log lines.
    label: String,
}

impl RestClient {
    /// Create a client with the default request timeout.
    pub fn new(label: impl Into<String>, credentials: &StoreCredentials) -> Result<Self> {
        Self::with_timeout(label, credentials, NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        label: impl Into<String>,
        credentials: &StoreCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MigrateError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url: rest_base(&credentials.url)?,
            service_key: credentials.service_key.clone(),
            label: label.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Build the endpoint URL for a table with query parameters.
    pub fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(table).map_err(|e| {
            MigrateError::config(format!("Invalid table name '{}': {}", table, e))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET rows from a table.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, params)?;
        debug!("[{}] GET {}", self.label, url);

        let response = self
            .authorized(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| self.send_error("GET", &url, e))?;

        let response = self.check_response_status(response, table).await?;
        response.json::<Vec<T>>().await.map_err(|e| MigrateError::Json {
            message: format!("[{}] Failed to decode rows from {}: {}", self.label, table, e),
            source: None,
        })
    }

    /// GET every matching row, one `limit`/`offset` page at a time.
    ///
    /// The server truncates large responses without reporting it, so a
    /// multi-row read keeps asking until a page comes back short. `params`
    /// must include an `order` for the pages to be stable.
    pub async fn select_paged<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
        page_size: usize,
    ) -> Result<Vec<T>> {
        let page_size = page_size.max(1);
        let mut rows: Vec<T> = Vec::new();
        loop {
            let page: Vec<T> = self
                .select(table, &page_params(params, page_size, rows.len()))
                .await?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < page_size {
                return Ok(rows);
            }
            debug!("[{}] {}: {} rows so far, fetching next page", self.label, table, rows.len());
        }
    }

    /// POST rows to a table and return the inserted representation.
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        rows: &[B],
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, &[("select", "*".to_string())])?;
        debug!("[{}] POST {} ({} rows)", self.label, url, rows.len());

        let response = self
            .authorized(self.client.post(url.clone()))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await
            .map_err(|e| self.send_error("POST", &url, e))?;

        let response = self.check_response_status(response, table).await?;
        response.json::<Vec<T>>().await.map_err(|e| MigrateError::Json {
            message: format!(
                "[{}] Failed to decode inserted rows from {}: {}",
                self.label, table, e
            ),
            source: None,
        })
    }

    // Internal methods

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.service_key))
            .header(header::ACCEPT, "application/json")
    }

    fn send_error(&self, method: &str, url: &Url, err: reqwest::Error) -> MigrateError {
        if err.is_timeout() {
            return MigrateError::Timeout(format!("[{}] {} {}", self.label, method, url.path()));
        }
        MigrateError::Network {
            message: format!("[{}] {} {} failed: {}", self.label, method, url.path(), err),
            cause: std::error::Error::source(&err).map(|s| s.to_string()),
        }
    }

    async fn check_response_status(&self, response: Response, table: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(MigrateError::RemoteStatus {
            store: self.label.clone(),
            table: table.to_string(),
            status: status.as_u16(),
            message: truncate(&body, MAX_ERROR_BODY),
        })
    }
}

/// Resolve `<url>/rest/v1/` so table names can be joined onto it.
fn rest_base(url: &Url) -> Result<Url> {
    let mut base = url.clone();
    base.set_query(None);
    let path = format!(
        "{}/{}/",
        base.path().trim_end_matches('/'),
        NetworkConfig::REST_PATH
    );
    base.set_path(&path);
    if base.cannot_be_a_base() {
        return Err(MigrateError::config(format!(
            "Store URL {} cannot be used as a base URL",
            url
        )));
    }
    Ok(base)
}

fn page_params<'a>(
    params: &[(&'a str, String)],
    limit: usize,
    offset: usize,
) -> Vec<(&'a str, String)> {
    let mut paged = params.to_vec();
    paged.push(("limit", limit.to_string()));
    paged.push(("offset", offset.to_string()));
    paged
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
