//! # Checkout Session Types
//!
//! Normalized line items, the request submitted to the payment session
//! service, and what comes back from it.

use crate::currency::Currency;
use crate::error::{ShopError, ShopResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the comma-joined product ids of a checkout.
/// Long lists continue under `product_ids_1`, `product_ids_2`, ...
pub const PRODUCT_IDS_METADATA_KEY: &str = "product_ids";

/// Longest metadata value the payment provider accepts
pub const MAX_METADATA_VALUE_LEN: usize = 500;

/// Provider allows 50 metadata keys per session; leave room for others
const MAX_PRODUCT_ID_KEYS: usize = 40;

/// A normalized, price-authoritative line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Display name
    pub name: String,

    /// Unit amount in minor currency units (always > 0)
    pub unit_amount: i64,

    /// Quantity (always > 0)
    pub quantity: u32,

    /// Zero or one image URL
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl LineItem {
    /// Total for this line in minor units
    pub fn total(&self) -> i64 {
        self.unit_amount.saturating_mul(i64::from(self.quantity))
    }
}

/// Checkout mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-time payment
    #[default]
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
        }
    }
}

/// Everything the payment session service needs to open a hosted checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Line items, in cart order
    pub line_items: Vec<LineItem>,

    /// Currency for every line item
    pub currency: Currency,

    /// Buyer email (optional, for prefill and receipts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Redirect after payment
    pub success_url: String,

    /// Redirect if the buyer backs out
    pub cancel_url: String,

    /// Checkout mode
    #[serde(default)]
    pub mode: CheckoutMode,

    /// Custom metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SessionRequest {
    /// Order total in minor units
    pub fn total(&self) -> i64 {
        self.line_items.iter().map(LineItem::total).sum()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(|i| i.quantity).sum()
    }
}

/// A hosted checkout session: where to send the buyer, and its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub id: String,

    /// URL to redirect the buyer to
    pub url: String,
}

/// Session state as reported back by the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetails {
    pub id: String,

    /// "paid", "unpaid" or "no_payment_required"
    pub payment_status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Amount paid in minor units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_total: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionDetails {
    /// Check if payment was successful
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Product ids recorded at checkout time, in cart order
    pub fn product_ids(&self) -> Vec<String> {
        product_ids_from_metadata(&self.metadata)
    }
}

fn product_ids_key(index: usize) -> String {
    if index == 0 {
        PRODUCT_IDS_METADATA_KEY.to_string()
    } else {
        format!("{}_{}", PRODUCT_IDS_METADATA_KEY, index)
    }
}

/// Pack product ids into as few metadata entries as fit the value limit.
pub fn product_ids_metadata(ids: &[&str]) -> ShopResult<Vec<(String, String)>> {
    let mut chunks: Vec<String> = Vec::new();
    for id in ids {
        if id.len() > MAX_METADATA_VALUE_LEN || id.contains(',') {
            return Err(ShopError::InvalidRequest(format!(
                "Product id {:?} cannot be recorded on the checkout",
                id
            )));
        }
        match chunks.last_mut() {
            Some(chunk) if chunk.len() + 1 + id.len() <= MAX_METADATA_VALUE_LEN => {
                chunk.push(',');
                chunk.push_str(id);
            }
            _ => chunks.push(id.to_string()),
        }
    }

    if chunks.len() > MAX_PRODUCT_ID_KEYS {
        return Err(ShopError::InvalidRequest(format!(
            "Cart has too many distinct products ({})",
            ids.len()
        )));
    }

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| (product_ids_key(index), chunk))
        .collect())
}

/// Product ids from `product_ids`, `product_ids_1`, ... in order
pub fn product_ids_from_metadata(metadata: &HashMap<String, String>) -> Vec<String> {
    (0..)
        .map(product_ids_key)
        .map_while(|key| metadata.get(&key))
        .flat_map(|value| split_product_ids(Some(value.as_str())))
        .collect()
}

/// Split a comma-joined product id list, dropping blanks
pub fn split_product_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutCompleted,
    /// Checkout session expired without payment
    CheckoutExpired,
    /// Payment failed
    PaymentFailed,
    /// Unknown event (passthrough)
    Unknown(String),
}

/// A verified, parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Related session ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Raw event object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,

    pub timestamp: DateTime<Utc>,
}
