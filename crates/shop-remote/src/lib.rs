//! # shop-remote
//!
//! Adapters for the hosted services behind the storefront backend:
//!
//! - **RestPriceStore** - bulk price lookup from a REST table
//! - **RestObjectStorage** - product file uploads and signed download URLs
//! - **RestTokenStore** - hashed password-reset tokens
//! - **HttpMailer** - transactional email over a JSON mail API
//!
//! ```rust,ignore
//! use shop_remote::{http_client, RemoteConfig, RestPriceStore, StoreClient};
//!
//! let config = RemoteConfig::from_env()?;
//! let store = StoreClient::new(http_client()?, config.store.unwrap());
//! let prices = RestPriceStore::new(store);
//! ```

pub mod client;
pub mod config;
pub mod mailer;
pub mod prices;
pub mod storage;
pub mod tokens;

// Re-exports
pub use client::{http_client, StoreClient};
pub use config::{MailConfig, RemoteConfig, StoreConfig};
pub use mailer::HttpMailer;
pub use prices::RestPriceStore;
pub use storage::RestObjectStorage;
pub use tokens::RestTokenStore;
