//! Shared HTTP plumbing for the managed data store.

use crate::config::StoreConfig;
use reqwest::{Client, RequestBuilder, Url};
use shop_core::{ShopError, ShopResult};
use std::time::Duration;
use tracing::error;

/// Build the pooled HTTP client used by every adapter
pub fn http_client() -> ShopResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Authenticated client for the store's REST and storage APIs
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    config: StoreConfig,
}

impl StoreClient {
    pub fn new(client: Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Base URL with `segments` appended, each percent-encoded
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> ShopResult<Url> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| ShopError::Configuration(format!("Invalid STORE_URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ShopError::Configuration("STORE_URL cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{url}/rest/v1/{table}`
    pub fn table_url(&self, table: &str) -> ShopResult<Url> {
        self.endpoint(["rest", "v1", table])
    }

    /// Attach the service key headers
    pub fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .header("Authorization", format!("Bearer {}", self.config.service_key))
    }

    /// Send an authorized request, returning the body of a successful
    /// response. Every failure is reported through `kind`.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        kind: fn(String) -> ShopError,
    ) -> ShopResult<String> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| kind(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| kind(e.to_string()))?;

        if !status.is_success() {
            error!("Store API error: status={}, body={}", status, body);
            return Err(kind(format!("HTTP {}: {}", status, upstream_message(&body))));
        }

        Ok(body)
    }
}

/// Pull a human-readable message out of an upstream error body
pub(crate) fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error", "msg"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreClient {
        StoreClient::new(Client::new(), StoreConfig::new("https://abc.store.test/", "k"))
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = store()
            .endpoint(["storage", "v1", "object", "products", "products", "my file"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.store.test/storage/v1/object/products/products/my%20file"
        );
    }

    #[test]
    fn test_table_url() {
        assert_eq!(
            store().table_url("products").unwrap().as_str(),
            "https://abc.store.test/rest/v1/products"
        );
    }

    #[test]
    fn test_upstream_message() {
        assert_eq!(upstream_message(r#"{"message":"permission denied"}"#), "permission denied");
        assert_eq!(upstream_message("Bad Gateway"), "Bad Gateway");
    }
}
