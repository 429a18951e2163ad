//! # Shop Error Types
//!
//! Typed error handling for the storefront backend.
//! All core operations return `Result<T, ShopError>`.

use thiserror::Error;

/// Core error type for checkout, downloads, uploads and reset tokens
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Feature disabled by configuration
    #[error("Not available: {0}")]
    Unavailable(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Checkout submitted without any items
    #[error("Cart is empty")]
    EmptyCart,

    /// Resolved price is not a positive amount of minor units
    #[error("Invalid price for item \"{item}\": {message}")]
    InvalidPrice { item: String, message: String },

    /// Requested quantity cannot be charged as sent
    #[error("Invalid quantity for item \"{item}\": {message}")]
    InvalidQuantity { item: String, message: String },

    /// Product exists in the price store but is not for sale
    #[error("Product \"{0}\" is no longer available")]
    ProductUnavailable(String),

    /// Missing or wrong credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session exists but has not been paid
    #[error("Payment required: session {session_id} is {status}")]
    PaymentRequired { session_id: String, status: String },

    /// Reset token unknown or already consumed
    #[error("Invalid or unknown reset token")]
    InvalidToken,

    /// Reset token past its expiry
    #[error("Reset token has expired")]
    TokenExpired,

    /// Price store lookup failed
    #[error("Price lookup failed: {0}")]
    PriceLookup(String),

    /// Object storage call failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Mail delivery call failed
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with an upstream service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShopError {
    /// Returns true if the failure came from an upstream dependency
    /// rather than from the caller's input
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ShopError::PriceLookup(_)
                | ShopError::Storage(_)
                | ShopError::Mail(_)
                | ShopError::ProviderError { .. }
                | ShopError::NetworkError(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::Unavailable(_) => 503,
            ShopError::InvalidRequest(_) => 400,
            ShopError::EmptyCart => 400,
            ShopError::InvalidPrice { .. } => 400,
            ShopError::InvalidQuantity { .. } => 400,
            ShopError::ProductUnavailable(_) => 400,
            ShopError::Unauthorized(_) => 401,
            ShopError::PaymentRequired { .. } => 402,
            ShopError::InvalidToken => 404,
            ShopError::TokenExpired => 410,
            ShopError::PriceLookup(_) => 502,
            ShopError::Storage(_) => 502,
            ShopError::Mail(_) => 502,
            ShopError::ProviderError { .. } => 502,
            ShopError::NetworkError(_) => 503,
            ShopError::WebhookVerificationFailed(_) => 401,
            ShopError::WebhookParseError(_) => 400,
            ShopError::Internal(_) => 500,
            ShopError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for shop operations
pub type ShopResult<T> = Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors() {
        assert!(ShopError::NetworkError("timeout".into()).is_upstream());
        assert!(ShopError::PriceLookup("503".into()).is_upstream());
        assert!(!ShopError::EmptyCart.is_upstream());
        assert!(!ShopError::InvalidRequest("bad data".into()).is_upstream());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ShopError::EmptyCart.status_code(), 400);
        assert_eq!(
            ShopError::InvalidPrice {
                item: "Mystery".into(),
                message: "not positive".into()
            }
            .status_code(),
            400
        );
        assert_eq!(ShopError::ProductUnavailable("retired".into()).status_code(), 400);
        assert_eq!(ShopError::TokenExpired.status_code(), 410);
        assert_eq!(
            ShopError::ProviderError {
                provider: "stripe".into(),
                message: "boom".into()
            }
            .status_code(),
            502
        );
    }

    #[test]
    fn test_invalid_price_names_item() {
        let err = ShopError::InvalidPrice {
            item: "Mystery".into(),
            message: "amount must be positive".into(),
        };
        assert!(err.to_string().contains("Mystery"));
    }
}
