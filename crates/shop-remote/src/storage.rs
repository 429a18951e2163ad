//! # Remote Object Storage
//!
//! Product files in a storage bucket: upserting uploads and signed
//! download URLs.

use crate::client::StoreClient;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use shop_core::{ObjectStorage, ShopError, ShopResult, SignedUrl, StoredObject};
use std::time::Duration;
use tracing::{info, instrument};

/// Object storage backed by the store's storage API
pub struct RestObjectStorage {
    store: StoreClient,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl RestObjectStorage {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    fn object_url(&self, action: &[&str], key: &str) -> ShopResult<reqwest::Url> {
        let bucket = self.store.config().bucket.as_str();
        let segments = ["storage", "v1", "object"]
            .into_iter()
            .chain(action.iter().copied())
            .chain(std::iter::once(bucket))
            .chain(key.split('/'));
        self.store.endpoint(segments)
    }

    /// Signed paths come back relative to `/storage/v1`
    fn absolute_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!(
                "{}/storage/v1/{}",
                self.store.config().url,
                signed.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl ObjectStorage for RestObjectStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ShopResult<StoredObject> {
        let size = bytes.len();
        let request = self
            .store
            .http()
            .post(self.object_url(&[], key)?)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes);

        self.store.send(request, ShopError::Storage).await?;
        info!("Stored object {} ({} bytes)", key, size);

        Ok(StoredObject {
            key: key.to_string(),
            size,
            content_type: content_type.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn signed_url(&self, key: &str, expires_in: Duration) -> ShopResult<SignedUrl> {
        let request = self
            .store
            .http()
            .post(self.object_url(&["sign"], key)?)
            .json(&json!({ "expiresIn": expires_in.as_secs() }));

        let issued_at = Utc::now();
        let body = self.store.send(request, ShopError::Storage).await?;
        let signed: SignResponse = serde_json::from_str(&body)
            .map_err(|e| ShopError::Storage(format!("Unexpected sign response: {}", e)))?;

        let ttl = chrono::Duration::from_std(expires_in)
            .map_err(|e| ShopError::Internal(format!("Link lifetime out of range: {}", e)))?;

        Ok(SignedUrl {
            url: self.absolute_signed_url(&signed.signed_url),
            expires_at: issued_at + ttl,
        })
    }
}
