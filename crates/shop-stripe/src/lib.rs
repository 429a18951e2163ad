//! # shop-stripe
//!
//! Stripe Checkout Sessions behind the `PaymentSessionService` trait.
//!
//! - **StripeCheckoutService** creates hosted checkout sessions from the
//!   normalized line items, retrieves sessions for download access and
//!   verifies `Stripe-Signature` webhook headers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeCheckoutService;
//! use shop_core::PaymentSessionService;
//!
//! // Create service from environment
//! let stripe = StripeCheckoutService::from_env()?;
//!
//! let session = stripe.create_session(&request).await?;
//!
//! // Redirect the buyer to session.url
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use shop_stripe::{dispatch_webhook_event, CheckoutCompletedData, WebhookHandler};
//!
//! struct Fulfil;
//!
//! #[async_trait]
//! impl WebhookHandler for Fulfil {
//!     async fn on_checkout_completed(&self, data: CheckoutCompletedData) -> ShopResult<()> {
//!         // Send the receipt
//!         Ok(())
//!     }
//! }
//!
//! // In your webhook endpoint:
//! let event = stripe.verify_webhook(payload, signature).await?;
//! dispatch_webhook_event(&Fulfil, event).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod webhook;

// Re-exports
pub use checkout::StripeCheckoutService;
pub use config::StripeConfig;
pub use webhook::{
    dispatch_webhook_event, CheckoutCompletedData, LoggingWebhookHandler, WebhookHandler,
    REQUIRED_WEBHOOK_EVENTS,
};
