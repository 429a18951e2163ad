//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout, download and reset services, the collaborators
//! behind them, and configuration.

use async_trait::async_trait;
use shop_core::{
    BoxedMailer, BoxedObjectStorage, BoxedPaymentService, BoxedPriceStore, BoxedTokenStore,
    CheckoutService, CheckoutUrls, Currency, DownloadService, InMemoryTokenStore, LoggingMailer,
    ObjectStorage, PasswordResetService, PricingPolicy, ProductCatalog, ShopError, ShopResult,
    SignedUrl, StoredObject,
};
use shop_remote::{
    http_client, HttpMailer, RemoteConfig, RestObjectStorage, RestPriceStore, RestTokenStore,
    StoreClient,
};
use shop_stripe::StripeCheckoutService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Storefront base URL for redirects and email links
    pub frontend_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Checkout currency
    pub currency: Currency,
    /// Use client prices when the price store is unreachable
    pub price_lookup_fallback: bool,
    /// Optional TOML catalog used instead of the remote price table
    pub price_catalog_path: Option<PathBuf>,
    /// Bearer token required for uploads (uploads disabled when unset)
    pub admin_token: Option<String>,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
    /// Lifetime of signed download links
    pub download_link_ttl: Duration,
    /// Lifetime of password-reset tokens
    pub reset_token_ttl: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> ShopResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ShopResult<Self> {
        let currency = match lookup("CURRENCY") {
            Some(code) => code.parse().map_err(ShopError::Configuration)?,
            None => Currency::default(),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or("PORT", &lookup, 8080)?,
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            currency,
            price_lookup_fallback: parse_or("PRICE_LOOKUP_FALLBACK", &lookup, true)?,
            price_catalog_path: lookup("PRICE_CATALOG_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            admin_token: lookup("ADMIN_TOKEN").filter(|t| !t.is_empty()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", &lookup, DEFAULT_MAX_UPLOAD_BYTES)?,
            download_link_ttl: Duration::from_secs(parse_or("DOWNLOAD_LINK_TTL_SECS", &lookup, 3600)?),
            reset_token_ttl: Duration::from_secs(parse_or("RESET_TOKEN_TTL_SECS", &lookup, 3600)?),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> ShopResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ShopError::Configuration(format!("Invalid HOST/PORT: {}", e)))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            fallback_to_client_price: self.price_lookup_fallback,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> ShopResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ShopError::Configuration(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}

/// External collaborators the services are built from
#[derive(Clone)]
pub struct Collaborators {
    pub prices: BoxedPriceStore,
    pub payments: BoxedPaymentService,
    pub storage: BoxedObjectStorage,
    pub mailer: BoxedMailer,
    pub tokens: BoxedTokenStore,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Line-item builder + session creation
    pub checkout: CheckoutService,
    /// Signed download links for paid sessions
    pub downloads: DownloadService,
    /// Password-reset tokens
    pub resets: PasswordResetService,
    /// Product file storage
    pub storage: BoxedObjectStorage,
    /// Payment session service (webhook verification)
    pub payments: BoxedPaymentService,
    /// Outbound email
    pub mailer: BoxedMailer,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create the state from environment variables
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let remote = RemoteConfig::from_env()?;
        let client = http_client()?;

        let stripe = StripeCheckoutService::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let store = remote.store.map(|c| StoreClient::new(client.clone(), c));

        let prices: BoxedPriceStore = match (&config.price_catalog_path, &store) {
            (Some(path), _) => {
                let catalog = ProductCatalog::from_file(path)?;
                info!("Loaded {} products from {}", catalog.products.len(), path.display());
                Arc::new(catalog)
            }
            (None, Some(store)) => Arc::new(RestPriceStore::new(store.clone())),
            (None, None) => {
                warn!("No price store configured, client prices will be charged");
                Arc::new(ProductCatalog::new())
            }
        };

        let (storage, tokens): (BoxedObjectStorage, BoxedTokenStore) = match store {
            Some(store) => (
                Arc::new(RestObjectStorage::new(store.clone())),
                Arc::new(RestTokenStore::new(store)),
            ),
            None => {
                warn!("STORE_URL not set: uploads and downloads disabled, reset tokens kept in memory");
                (Arc::new(DisabledStorage), Arc::new(InMemoryTokenStore::new()))
            }
        };

        let mailer: BoxedMailer = match remote.mail {
            Some(mail) => Arc::new(HttpMailer::new(client, mail)),
            None => {
                warn!("MAIL_API_KEY not set, emails will only be logged");
                Arc::new(LoggingMailer)
            }
        };

        Ok(Self::from_parts(
            config,
            Collaborators {
                prices,
                payments: Arc::new(stripe),
                storage,
                mailer,
                tokens,
            },
        ))
    }

    /// Wire services from already-built collaborators
    pub fn from_parts(config: AppConfig, parts: Collaborators) -> Self {
        let urls = CheckoutUrls::new(&config.frontend_url);

        let checkout = CheckoutService::new(parts.prices, parts.payments.clone(), urls.clone())
            .with_currency(config.currency)
            .with_policy(config.pricing_policy());

        let downloads = DownloadService::new(
            parts.storage.clone(),
            parts.payments.clone(),
            config.download_link_ttl,
        );

        let reset_ttl = chrono::Duration::from_std(config.reset_token_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let resets = PasswordResetService::new(parts.tokens, parts.mailer.clone(), urls, reset_ttl);

        Self {
            checkout,
            downloads,
            resets,
            storage: parts.storage,
            payments: parts.payments,
            mailer: parts.mailer,
            config: Arc::new(config),
        }
    }
}

/// Object storage stand-in when no store is configured
struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn put_object(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> ShopResult<StoredObject> {
        Err(ShopError::Unavailable("object storage is not configured".to_string()))
    }

    async fn signed_url(&self, _key: &str, _expires_in: Duration) -> ShopResult<SignedUrl> {
        Err(ShopError::Unavailable("object storage is not configured".to_string()))
    }
}
