//! # Payment Session Service
//!
//! Contract for the hosted-checkout payment provider, plus the redirect
//! targets handed to it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               PaymentSessionService (trait)                 │
//! │  ├── create_session()                                       │
//! │  ├── retrieve_session()                                     │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!                  │ StripeCheckout    │
//!                  │   Service         │
//!                  └───────────────────┘
//! ```

use crate::error::ShopResult;
use crate::session::{CheckoutSession, SessionDetails, SessionRequest, WebhookEvent};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Placeholder the provider replaces with the real session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Hosted checkout provider.
#[async_trait]
pub trait PaymentSessionService: Send + Sync {
    /// Open a checkout session and return its redirect URL and id.
    async fn create_session(&self, request: &SessionRequest) -> ShopResult<CheckoutSession>;

    /// Look up an existing session (payment status, email, metadata).
    async fn retrieve_session(&self, session_id: &str) -> ShopResult<SessionDetails>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - Signature header from the request
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment session service (dynamic dispatch)
pub type BoxedPaymentService = Arc<dyn PaymentSessionService>;

/// Redirect targets derived from the storefront's base address
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Frontend base URL (e.g., "https://shop.example.com")
    pub frontend_url: String,
}

impl CheckoutUrls {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        let frontend_url: String = frontend_url.into();
        Self {
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<frontend>/thank-you/<first-item-id>?session_id={CHECKOUT_SESSION_ID}&email=<escaped>`
    ///
    /// The id is percent-encoded as a single path segment. It is dropped when
    /// the first item has no id or the frontend URL cannot carry a path, and
    /// the email parameter is dropped when no email was given.
    pub fn success_url(&self, first_item_id: Option<&str>, email: Option<&str>) -> String {
        let mut url = self.page_url("thank-you", first_item_id);
        url.push_str("?session_id=");
        url.push_str(SESSION_ID_PLACEHOLDER);
        if let Some(email) = email {
            if let Ok(query) = serde_urlencoded::to_string(&[("email", email)]) {
                url.push('&');
                url.push_str(&query);
            }
        }
        url
    }

    fn page_url(&self, page: &str, segment: Option<&str>) -> String {
        let base = format!("{}/{}", self.frontend_url, page);
        let Some(segment) = segment else {
            return base;
        };
        let Ok(mut url) = Url::parse(&base) else {
            return base;
        };
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.push(segment);
            }
            Err(()) => return base,
        }
        url.to_string()
    }

    /// `<frontend>/cart`
    pub fn cancel_url(&self) -> String {
        format!("{}/cart", self.frontend_url)
    }

    /// `<frontend>/reset-password?token=<token>`
    pub fn reset_password_url(&self, token: &str) -> String {
        match serde_urlencoded::to_string(&[("token", token)]) {
            Ok(query) => format!("{}/reset-password?{}", self.frontend_url, query),
            Err(_) => format!("{}/reset-password", self.frontend_url),
        }
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
