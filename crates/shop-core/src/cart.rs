//! # Cart Items
//!
//! Client-submitted cart records. Everything in here is untrusted: ids may be
//! strings or numbers, prices may be numbers or numeric strings, quantities
//! may be missing or nonsensical. Accessors normalize those shapes; the
//! checkout builder decides what to trust.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One purchasable line as sent by the storefront client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier (string or number on the wire)
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Alternative display name used by some clients
    #[serde(default)]
    pub title: Option<String>,

    /// Client-supplied unit price in major units (untrusted)
    #[serde(default)]
    pub price: Value,

    /// Requested quantity
    #[serde(default)]
    pub quantity: Value,

    /// Optional product image
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Create an item with an id and title (test and fixture helper)
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Builder: set the client price
    pub fn with_price(mut self, price: impl Into<Value>) -> Self {
        self.price = price.into();
        self
    }

    /// Builder: set the quantity
    pub fn with_quantity(mut self, quantity: impl Into<Value>) -> Self {
        self.quantity = quantity.into();
        self
    }

    /// Builder: set the image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Non-empty product identifier, if any
    pub fn product_id(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }

    /// Display name: `name`, else `title`, else "Item N" (1-based)
    pub fn display_name(&self, index: usize) -> String {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(self.title.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Item {}", index + 1))
    }

    /// Quantity if it is a positive whole number (`2` or `2.0`), else 1.
    ///
    /// A whole number too large for a line item is an error rather than
    /// a silent single unit.
    pub fn resolved_quantity(&self) -> Result<u32, String> {
        match self.quantity.as_f64() {
            Some(q) if q >= 1.0 && q.fract() == 0.0 => {
                if q > f64::from(u32::MAX) {
                    Err(format!("quantity {} is too large", self.quantity))
                } else {
                    Ok(q as u32)
                }
            }
            _ => Ok(1),
        }
    }

    /// Client price coerced to a number; NaN when it cannot be read as one
    pub fn client_price(&self) -> f64 {
        coerce_number(&self.price)
    }

    /// Image URL, if present and non-empty
    pub fn image(&self) -> Option<&str> {
        non_empty(self.image_url.as_deref())
    }
}

/// Coerce a JSON value to a number: numbers pass through, numeric strings are
/// parsed after trimming, everything else is NaN.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
