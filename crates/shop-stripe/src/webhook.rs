//! # Stripe Webhook Handling
//!
//! Utilities for handling Stripe webhooks.
//! Webhooks notify the backend when a checkout completes, expires or fails.

use async_trait::async_trait;
use shop_core::{
    product_ids_from_metadata, Currency, ShopError, ShopResult, WebhookEvent, WebhookEventType,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parsed checkout.session.completed event data
#[derive(Debug, Clone)]
pub struct CheckoutCompletedData {
    pub session_id: String,
    pub customer_email: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<Currency>,
    pub payment_status: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutCompletedData {
    /// Parse from a webhook event
    pub fn from_event(event: &WebhookEvent) -> ShopResult<Self> {
        let raw = event
            .raw_data
            .as_ref()
            .ok_or_else(|| ShopError::WebhookParseError("Missing raw data".to_string()))?;

        let obj = raw.as_object().ok_or_else(|| {
            ShopError::WebhookParseError("Raw data is not an object".to_string())
        })?;

        let session_id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ShopError::WebhookParseError("Missing session id".to_string()))?;

        let customer_email = obj
            .get("customer_details")
            .and_then(|cd| cd.get("email"))
            .and_then(|v| v.as_str())
            .or_else(|| obj.get("customer_email").and_then(|v| v.as_str()))
            .map(String::from);

        let amount_total = obj.get("amount_total").and_then(|v| v.as_i64());

        let currency = obj
            .get("currency")
            .and_then(|v| v.as_str())
            .and_then(|c| c.parse().ok());

        let payment_status = obj
            .get("payment_status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let metadata = obj
            .get("metadata")
            .and_then(|m| m.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            session_id,
            customer_email,
            amount_total,
            currency,
            payment_status,
            metadata,
        })
    }

    /// Check if payment was successful
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Product ids recorded at checkout time
    pub fn product_ids(&self) -> Vec<String> {
        product_ids_from_metadata(&self.metadata)
    }
}

/// Webhook event handler trait
///
/// Implement this trait to handle different webhook events.
#[async_trait]
#[allow(unused_variables)]
pub trait WebhookHandler: Send + Sync {
    /// Called when a checkout session is completed
    async fn on_checkout_completed(&self, data: CheckoutCompletedData) -> ShopResult<()> {
        info!(
            "Checkout completed: session={}, amount={:?}",
            data.session_id, data.amount_total
        );
        Ok(())
    }

    /// Called when a checkout session expires unpaid
    async fn on_checkout_expired(&self, event: &WebhookEvent) -> ShopResult<()> {
        info!("Checkout expired: {:?}", event.session_id);
        Ok(())
    }

    /// Called when a payment fails
    async fn on_payment_failed(&self, event: &WebhookEvent) -> ShopResult<()> {
        warn!("Payment failed: event={}", event.event_id);
        Ok(())
    }

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &WebhookEvent) -> ShopResult<()> {
        debug!("Unhandled webhook event: {:?}", event.event_type);
        Ok(())
    }
}

/// Default no-op webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: WebhookEvent,
) -> ShopResult<()> {
    match &event.event_type {
        WebhookEventType::CheckoutCompleted => {
            let data = CheckoutCompletedData::from_event(&event)?;
            handler.on_checkout_completed(data).await
        }
        WebhookEventType::CheckoutExpired => handler.on_checkout_expired(&event).await,
        WebhookEventType::PaymentFailed => handler.on_payment_failed(&event).await,
        WebhookEventType::Unknown(_) => handler.on_unknown_event(&event).await,
    }
}

/// Events to enable on the Stripe webhook endpoint
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.expired",
    "payment_intent.payment_failed",
];
