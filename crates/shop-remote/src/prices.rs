//! # Remote Price Store
//!
//! Bulk price lookup against the store's REST API:
//! `GET /rest/v1/{table}?select=id,price&id=in.("a","b")`.

use crate::client::StoreClient;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use shop_core::{coerce_number, PriceRecord, PriceStore, ShopError, ShopResult};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Price store backed by a REST table with `id` and `price` columns
pub struct RestPriceStore {
    store: StoreClient,
}

impl RestPriceStore {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    id: Value,
    #[serde(default)]
    price: Value,
}

/// `in.(...)` filter with every id double-quoted
fn in_filter(ids: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn row_id(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PriceStore for RestPriceStore {
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn fetch_prices(&self, ids: &BTreeSet<String>) -> ShopResult<Vec<PriceRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.store.table_url(&self.store.config().price_table)?;
        let request = self
            .store
            .http()
            .get(url)
            .query(&[("select", "id,price".to_string()), ("id", in_filter(ids))]);

        let body = self.store.send(request, ShopError::PriceLookup).await?;
        let rows: Vec<PriceRow> = serde_json::from_str(&body)
            .map_err(|e| ShopError::PriceLookup(format!("Unexpected price response: {}", e)))?;

        let records: Vec<PriceRecord> = rows
            .into_iter()
            .filter_map(|row| row_id(&row.id).map(|id| PriceRecord::new(id, coerce_number(&row.price))))
            .collect();

        debug!("Price store returned {} rows", records.len());
        Ok(records)
    }

    fn store_name(&self) -> &'static str {
        "rest"
    }
}
