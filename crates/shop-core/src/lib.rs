//! # shop-core
//!
//! Core types and traits for the storefront backend.
//!
//! This crate provides:
//! - `CartItem` and the checkout line-item builder (`CheckoutService`,
//!   `build_line_items`) that reconciles client prices with the price store
//! - `PriceStore`, `PaymentSessionService`, `ObjectStorage`, `Mailer` and
//!   `TokenStore` traits for the external collaborators
//! - `DownloadService` and `PasswordResetService` for the post-purchase and
//!   account glue
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CartItem, CheckoutService, CheckoutUrls};
//!
//! let checkout = CheckoutService::new(prices, payments, CheckoutUrls::new("https://shop.example.com"));
//!
//! let items = vec![CartItem::new("ebook-rust", "Rust Ebook").with_price(19.99)];
//! let session = checkout.create_checkout(&items, Some("buyer@example.com")).await?;
//!
//! // Redirect the buyer to session.url
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod currency;
pub mod downloads;
pub mod error;
pub mod mail;
pub mod payment;
pub mod pricing;
pub mod reset;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use cart::{coerce_number, CartItem};
pub use catalog::{Product, ProductCatalog};
pub use checkout::{build_line_items, CheckoutService, PricingPolicy};
pub use currency::Currency;
pub use downloads::{DownloadLink, DownloadService};
pub use error::{ShopError, ShopResult};
pub use mail::{password_reset_email, receipt_email, BoxedMailer, EmailMessage, LoggingMailer, Mailer};
pub use payment::{BoxedPaymentService, CheckoutUrls, PaymentSessionService, SESSION_ID_PLACEHOLDER};
pub use pricing::{index_prices, BoxedPriceStore, PriceRecord, PriceStore};
pub use reset::{
    hash_token, BoxedTokenStore, InMemoryTokenStore, IssuedToken, PasswordResetService,
    ResetToken, TokenStore,
};
pub use session::{
    product_ids_from_metadata, product_ids_metadata, split_product_ids, CheckoutMode,
    CheckoutSession, LineItem, SessionDetails, SessionRequest, WebhookEvent, WebhookEventType,
    MAX_METADATA_VALUE_LEN, PRODUCT_IDS_METADATA_KEY,
};
pub use storage::{product_object_key, BoxedObjectStorage, ObjectStorage, SignedUrl, StoredObject};
