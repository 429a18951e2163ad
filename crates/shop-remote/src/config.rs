//! # Remote Service Configuration
//!
//! Connection settings for the managed data store (price table, reset-token
//! table, object storage) and the transactional mail API.
//! All secrets are loaded from environment variables.

use shop_core::ShopError;
use std::env;

/// Managed data store + object storage settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project base URL (e.g. "https://abc.supabase.co")
    pub url: String,

    /// Service-role key, sent as `apikey` and bearer token
    pub service_key: String,

    /// Bucket holding product files
    pub bucket: String,

    /// Table with `id` and `price` columns
    pub price_table: String,

    /// Table holding hashed password-reset tokens
    pub reset_table: String,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: "products".to_string(),
            price_table: "products".to_string(),
            reset_table: "password_reset_tokens".to_string(),
        }
    }

    /// Read `STORE_*` variables. Returns `None` when `STORE_URL` is unset.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ShopError> {
        let Some(url) = lookup("STORE_URL").filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ShopError::Configuration(
                "STORE_URL must be an http(s) URL".to_string(),
            ));
        }

        let service_key = lookup("STORE_SERVICE_KEY").ok_or_else(|| {
            ShopError::Configuration("STORE_SERVICE_KEY not set".to_string())
        })?;

        let mut config = Self::new(url, service_key);
        if let Some(bucket) = lookup("STORE_BUCKET") {
            config.bucket = bucket;
        }
        if let Some(table) = lookup("PRICE_TABLE") {
            config.price_table = table;
        }
        if let Some(table) = lookup("RESET_TABLE") {
            config.reset_table = table;
        }
        Ok(Some(config))
    }
}

/// Transactional mail API settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Send endpoint (JSON POST)
    pub api_url: String,

    /// Bearer API key
    pub api_key: String,

    /// Sender address
    pub from: String,
}

impl MailConfig {
    /// Read `MAIL_*` variables. Returns `None` when `MAIL_API_KEY` is unset.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ShopError> {
        let Some(api_key) = lookup("MAIL_API_KEY").filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let from = lookup("MAIL_FROM")
            .ok_or_else(|| ShopError::Configuration("MAIL_FROM not set".to_string()))?;

        Ok(Some(Self {
            api_url: lookup("MAIL_API_URL")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            api_key,
            from,
        }))
    }
}

/// Everything the remote adapters need
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub store: Option<StoreConfig>,
    pub mail: Option<MailConfig>,
}

impl RemoteConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ShopError> {
        Ok(Self {
            store: StoreConfig::from_lookup(&lookup)?,
            mail: MailConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment() {
        let config = RemoteConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.store.is_none());
        assert!(config.mail.is_none());
    }

    #[test]
    fn test_store_defaults_and_overrides() {
        let config = RemoteConfig::from_lookup(lookup(&[
            ("STORE_URL", "https://abc.store.test/"),
            ("STORE_SERVICE_KEY", "service-key"),
            ("RESET_TABLE", "reset_tokens"),
        ]))
        .unwrap();

        let store = config.store.unwrap();
        assert_eq!(store.url, "https://abc.store.test");
        assert_eq!(store.bucket, "products");
        assert_eq!(store.price_table, "products");
        assert_eq!(store.reset_table, "reset_tokens");
    }

    #[test]
    fn test_store_requires_key() {
        let result = RemoteConfig::from_lookup(lookup(&[("STORE_URL", "https://abc.store.test")]));
        assert!(matches!(result, Err(ShopError::Configuration(_))));

        let result = RemoteConfig::from_lookup(lookup(&[
            ("STORE_URL", "abc.store.test"),
            ("STORE_SERVICE_KEY", "k"),
        ]));
        assert!(matches!(result, Err(ShopError::Configuration(_))));
    }

    #[test]
    fn test_mail_requires_sender() {
        let result = RemoteConfig::from_lookup(lookup(&[("MAIL_API_KEY", "re_123")]));
        assert!(result.is_err());

        let config = RemoteConfig::from_lookup(lookup(&[
            ("MAIL_API_KEY", "re_123"),
            ("MAIL_FROM", "shop@example.com"),
        ]))
        .unwrap();
        let mail = config.mail.unwrap();
        assert_eq!(mail.api_url, "https://api.resend.com/emails");
        assert_eq!(mail.from, "shop@example.com");
    }
}
