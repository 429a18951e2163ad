//! # Product Catalog
//!
//! Static price catalog loaded from a TOML file. Used as the price store in
//! development, or in deployments that keep prices in config rather than in
//! the managed database. Inactive products are reported as retired price
//! records, never dropped.
//!
//! ```toml
//! [[products]]
//! id = "ebook-rust"
//! name = "Rust for Shopkeepers"
//! price = 19.99
//! ```

use crate::error::{ShopError, ShopResult};
use crate::pricing::{PriceRecord, PriceStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Price in major currency units
    pub price: f64,

    /// Whether this product can currently be bought
    #[serde(default = "default_true")]
    pub active: bool,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            active: true,
            image_url: None,
        }
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    /// Find an active product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.find(id).filter(|p| p.active)
    }

    /// Find a product by ID, active or not
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load catalog from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ShopResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShopError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content).map_err(|e| {
            ShopError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl PriceStore for ProductCatalog {
    async fn fetch_prices(&self, ids: &BTreeSet<String>) -> ShopResult<Vec<PriceRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.find(id))
            .map(|p| PriceRecord {
                id: p.id.clone(),
                price: p.price,
                active: p.active,
            })
            .collect())
    }

    fn store_name(&self) -> &'static str {
        "catalog"
    }
}
