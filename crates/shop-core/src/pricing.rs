//! # Price Store
//!
//! Authoritative product prices, queried in bulk by id.

use crate::error::ShopResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Authoritative price for one product, in major currency units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: String,
    pub price: f64,
    /// Retired products are still reported so they cannot be bought at a client price
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PriceRecord {
    pub fn new(id: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            price,
            active: true,
        }
    }

    /// A known product that is no longer for sale
    pub fn retired(id: impl Into<String>, price: f64) -> Self {
        Self {
            active: false,
            ..Self::new(id, price)
        }
    }
}

/// Bulk id → price lookup.
///
/// Ids that are unknown to the store are simply absent from the result;
/// that is not an error. Known but inactive products must be returned with
/// `active: false`.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Fetch prices for every id in `ids`
    async fn fetch_prices(&self, ids: &BTreeSet<String>) -> ShopResult<Vec<PriceRecord>>;

    /// Store name (for logging)
    fn store_name(&self) -> &'static str;
}

/// Type alias for a shared price store (dynamic dispatch)
pub type BoxedPriceStore = Arc<dyn PriceStore>;

/// Index price records by id. Later duplicates win.
pub fn index_prices(records: Vec<PriceRecord>) -> HashMap<String, f64> {
    records.into_iter().map(|r| (r.id, r.price)).collect()
}
