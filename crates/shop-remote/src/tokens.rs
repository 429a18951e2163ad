//! # Remote Reset-Token Store
//!
//! Hashed password-reset tokens in a REST table keyed by `token_hash`.

use crate::client::StoreClient;
use async_trait::async_trait;
use serde_json::Value;
use shop_core::{ResetToken, ShopError, ShopResult, TokenStore};
use tracing::{debug, instrument};

/// Failures talking to the token table surface as store errors
fn token_store_error(message: String) -> ShopError {
    ShopError::Storage(format!("reset token store: {}", message))
}

/// Token store backed by a REST table
pub struct RestTokenStore {
    store: StoreClient,
}

impl RestTokenStore {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    fn table_url(&self) -> ShopResult<reqwest::Url> {
        self.store.table_url(&self.store.config().reset_table)
    }
}

#[async_trait]
impl TokenStore for RestTokenStore {
    #[instrument(skip_all)]
    async fn insert(&self, token: &ResetToken) -> ShopResult<()> {
        let request = self
            .store
            .http()
            .post(self.table_url()?)
            .header("Prefer", "return=minimal")
            .json(&[token]);

        self.store.send(request, token_store_error).await?;
        debug!("Inserted reset token");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find(&self, token_hash: &str) -> ShopResult<Option<ResetToken>> {
        let request = self.store.http().get(self.table_url()?).query(&[
            ("select", "token_hash,email,created_at,expires_at".to_string()),
            ("token_hash", format!("eq.{}", token_hash)),
            ("limit", "1".to_string()),
        ]);

        let body = self.store.send(request, token_store_error).await?;
        let mut rows: Vec<ResetToken> = serde_json::from_str(&body)
            .map_err(|e| token_store_error(format!("unexpected response: {}", e)))?;

        Ok(rows.pop())
    }

    #[instrument(skip_all)]
    async fn delete(&self, token_hash: &str) -> ShopResult<bool> {
        let request = self
            .store
            .http()
            .delete(self.table_url()?)
            .query(&[("token_hash", format!("eq.{}", token_hash))])
            .header("Prefer", "return=representation");

        let body = self.store.send(request, token_store_error).await?;
        let deleted: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| token_store_error(format!("unexpected response: {}", e)))?;

        Ok(!deleted.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_store(server: &MockServer) -> RestTokenStore {
        let config = StoreConfig::new(server.uri(), "service-key");
        RestTokenStore::new(StoreClient::new(reqwest::Client::new(), config))
    }

    fn record() -> ResetToken {
        let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        ResetToken {
            token_hash: "abc123".into(),
            email: "user@example.com".into(),
            created_at,
            expires_at: created_at + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_insert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/password_reset_tokens"))
            .and(header("Prefer", "return=minimal"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        token_store(&server).insert(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_find() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/password_reset_tokens"))
            .and(query_param("token_hash", "eq.abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "token_hash": "abc123",
                "email": "user@example.com",
                "created_at": "2026-01-01T12:00:00Z",
                "expires_at": "2026-01-01T13:00:00Z"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/password_reset_tokens"))
            .and(query_param("token_hash", "eq.missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = token_store(&server);
        assert_eq!(store.find("abc123").await.unwrap(), Some(record()));
        assert_eq!(store.find("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/password_reset_tokens"))
            .and(query_param("token_hash", "eq.abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "token_hash": "abc123" }])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/password_reset_tokens"))
            .and(query_param("token_hash", "eq.gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = token_store(&server);
        assert!(store.delete("abc123").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_maps_to_storage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
            .mount(&server)
            .await;

        let err = token_store(&server).insert(&record()).await.unwrap_err();
        assert!(matches!(err, ShopError::Storage(_)));
    }
}
