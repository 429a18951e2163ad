//! # Object Storage
//!
//! Contract for the managed object store holding purchasable files.

use crate::error::ShopResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Object key under which a product's downloadable file is stored
pub fn product_object_key(product_id: &str) -> String {
    format!("products/{}", product_id)
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

/// Time-limited, capability-bearing download URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Object store: put files by key, hand out signed URLs for them.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store (or replace) the object at `key`
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ShopResult<StoredObject>;

    /// Issue a URL granting read access to `key` for `expires_in`
    async fn signed_url(&self, key: &str, expires_in: Duration) -> ShopResult<SignedUrl>;
}

/// Type alias for a shared object store (dynamic dispatch)
pub type BoxedObjectStorage = Arc<dyn ObjectStorage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_object_key() {
        assert_eq!(product_object_key("ebook-rust"), "products/ebook-rust");
    }
}
