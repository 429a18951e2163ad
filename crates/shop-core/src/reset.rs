//! # Password-Reset Tokens
//!
//! Issue, verify and consume one-time reset tokens. Only a SHA-256 hash of
//! each token is persisted; the raw token exists in the email link alone.
//! Changing the password itself belongs to the account service: consuming a
//! token hands back the email it was issued for.

use crate::error::{ShopError, ShopResult};
use crate::mail::{password_reset_email, BoxedMailer};
use crate::payment::CheckoutUrls;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A persisted reset token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToken {
    /// Hex SHA-256 of the raw token
    pub token_hash: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly issued token (the only place the raw value is visible)
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Persistence for reset tokens, keyed by token hash
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &ResetToken) -> ShopResult<()>;

    async fn find(&self, token_hash: &str) -> ShopResult<Option<ResetToken>>;

    /// Delete a token; returns whether a record was removed
    async fn delete(&self, token_hash: &str) -> ShopResult<bool>;
}

/// Type alias for a shared token store (dynamic dispatch)
pub type BoxedTokenStore = Arc<dyn TokenStore>;

/// Process-local token store for development and tests
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, ResetToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> ShopError {
    ShopError::Internal("token store lock poisoned".to_string())
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, token: &ResetToken) -> ShopResult<()> {
        self.tokens
            .write()
            .map_err(poisoned)?
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> ShopResult<Option<ResetToken>> {
        Ok(self.tokens.read().map_err(poisoned)?.get(token_hash).cloned())
    }

    async fn delete(&self, token_hash: &str) -> ShopResult<bool> {
        Ok(self
            .tokens
            .write()
            .map_err(poisoned)?
            .remove(token_hash)
            .is_some())
    }
}

/// Hex SHA-256 of a raw token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Reset-token lifecycle
#[derive(Clone)]
pub struct PasswordResetService {
    store: BoxedTokenStore,
    mailer: BoxedMailer,
    urls: CheckoutUrls,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(store: BoxedTokenStore, mailer: BoxedMailer, urls: CheckoutUrls, ttl: Duration) -> Self {
        Self {
            store,
            mailer,
            urls,
            ttl,
        }
    }

    /// Issue a token for `email` and mail the reset link. Returns the expiry.
    #[instrument(skip(self, email))]
    pub async fn request_reset(&self, email: &str) -> ShopResult<DateTime<Utc>> {
        let issued = self.issue_token(email).await?;
        let message = password_reset_email(
            email.trim(),
            &self.urls.reset_password_url(&issued.token),
            issued.expires_at,
        );
        let message_id = self.mailer.send(&message).await?;
        info!("Sent password reset email: message_id={}", message_id);
        Ok(issued.expires_at)
    }

    /// Create and persist a token without sending anything
    pub async fn issue_token(&self, email: &str) -> ShopResult<IssuedToken> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(ShopError::InvalidRequest(
                "A valid email address is required".to_string(),
            ));
        }

        let token = generate_token();
        let now = Utc::now();
        let record = ResetToken {
            token_hash: hash_token(&token),
            email: email.to_lowercase(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.insert(&record).await?;
        debug!("Stored reset token expiring at {}", record.expires_at);

        Ok(IssuedToken {
            token,
            expires_at: record.expires_at,
        })
    }

    /// Check a token without consuming it
    pub async fn verify(&self, token: &str) -> ShopResult<ResetToken> {
        self.verify_at(token, Utc::now()).await
    }

    /// Check a token and invalidate it; returns the email it belongs to
    #[instrument(skip(self, token))]
    pub async fn consume(&self, token: &str) -> ShopResult<String> {
        let record = self.verify(token).await?;
        if !self.store.delete(&record.token_hash).await? {
            // lost a race with another consume
            return Err(ShopError::InvalidToken);
        }
        info!("Consumed password reset token");
        Ok(record.email)
    }

    async fn verify_at(&self, token: &str, now: DateTime<Utc>) -> ShopResult<ResetToken> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ShopError::InvalidToken);
        }

        let token_hash = hash_token(token);
        let record = self
            .store
            .find(&token_hash)
            .await?
            .ok_or(ShopError::InvalidToken)?;

        if record.is_expired_at(now) {
            warn!("Rejected expired reset token (expired {})", record.expires_at);
            self.store.delete(&token_hash).await?;
            return Err(ShopError::TokenExpired);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{EmailMessage, Mailer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, message: &EmailMessage) -> ShopResult<String> {
            self.sent.lock().unwrap().push(message.clone());
            Ok("msg_1".to_string())
        }
    }

    fn service(store: Arc<InMemoryTokenStore>, mailer: Arc<CapturingMailer>) -> PasswordResetService {
        PasswordResetService::new(
            store,
            mailer,
            CheckoutUrls::new("https://shop.test"),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_issue_stores_only_hash() {
        let store = Arc::new(InMemoryTokenStore::new());
        let resets = service(store.clone(), Arc::new(CapturingMailer::default()));

        let issued = resets.issue_token("User@Example.com").await.unwrap();

        assert_eq!(issued.token.len(), 64);
        assert_eq!(store.len(), 1);
        assert!(store.find(&issued.token).await.unwrap().is_none());
        let record = store.find(&hash_token(&issued.token)).await.unwrap().unwrap();
        assert_eq!(record.email, "user@example.com");
    }

    #[tokio::test]
    async fn test_request_reset_sends_link() {
        let mailer = Arc::new(CapturingMailer::default());
        let resets = service(Arc::new(InMemoryTokenStore::new()), mailer.clone());

        resets.request_reset("user@example.com").await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user@example.com");
        assert!(sent[0].text.contains("https://shop.test/reset-password?token="));
    }

    #[tokio::test]
    async fn test_rejects_bad_email() {
        let resets = service(
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(CapturingMailer::default()),
        );
        let err = resets.request_reset("not-an-email").await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_verify_and_expiry() {
        let store = Arc::new(InMemoryTokenStore::new());
        let resets = service(store.clone(), Arc::new(CapturingMailer::default()));
        let issued = resets.issue_token("user@example.com").await.unwrap();

        let record = resets.verify(&issued.token).await.unwrap();
        assert_eq!(record.email, "user@example.com");

        let later = issued.expires_at + Duration::seconds(1);
        let err = resets.verify_at(&issued.token, later).await.unwrap_err();
        assert!(matches!(err, ShopError::TokenExpired));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let resets = service(
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(CapturingMailer::default()),
        );
        let issued = resets.issue_token("user@example.com").await.unwrap();

        assert_eq!(resets.consume(&issued.token).await.unwrap(), "user@example.com");
        let err = resets.consume(&issued.token).await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidToken));
    }

    #[tokio::test]
    async fn test_unknown_and_blank_tokens() {
        let resets = service(
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(CapturingMailer::default()),
        );
        assert!(matches!(resets.verify("nope").await, Err(ShopError::InvalidToken)));
        assert!(matches!(resets.verify("  ").await, Err(ShopError::InvalidToken)));
    }

    #[test]
    fn test_hash_token_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(hash_token("abc").len(), 64);
    }
}
