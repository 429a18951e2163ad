//! # Checkout
//!
//! Turns an untrusted client cart into price-authoritative line items and
//! opens a payment session for them.
//!
//! Pricing rules:
//! - an item whose id is found in the price store is charged the store price,
//!   whatever the client sent;
//! - an item without an id, or with an id the store does not know, is charged
//!   the client price;
//! - an item whose id the store reports as retired rejects the whole cart;
//! - if the store lookup itself fails, the client prices are used when
//!   [`PricingPolicy::fallback_to_client_price`] is set, otherwise the whole
//!   checkout fails.
//!
//! Any item whose resolved amount is not a positive whole number of minor
//! units, or whose quantity is too large, rejects the whole cart. No partial
//! session is ever created.

use crate::cart::CartItem;
use crate::currency::Currency;
use crate::error::{ShopError, ShopResult};
use crate::payment::{BoxedPaymentService, CheckoutUrls};
use crate::pricing::{index_prices, BoxedPriceStore};
use crate::session::{product_ids_metadata, CheckoutMode, CheckoutSession, LineItem, SessionRequest};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info, instrument, warn};

/// Largest amount of minor units accepted (2^53 - 1, exactly representable)
const MAX_MINOR_UNITS: f64 = 9_007_199_254_740_991.0;

/// How much to trust the client when the price store cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Use client prices for the whole cart when the price lookup fails
    pub fallback_to_client_price: bool,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            fallback_to_client_price: true,
        }
    }
}

/// Builds line items and submits them to the payment session service
#[derive(Clone)]
pub struct CheckoutService {
    prices: BoxedPriceStore,
    payments: BoxedPaymentService,
    urls: CheckoutUrls,
    currency: Currency,
    policy: PricingPolicy,
}

impl CheckoutService {
    pub fn new(prices: BoxedPriceStore, payments: BoxedPaymentService, urls: CheckoutUrls) -> Self {
        Self {
            prices,
            payments,
            urls,
            currency: Currency::default(),
            policy: PricingPolicy::default(),
        }
    }

    /// Builder: set the checkout currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Builder: set the pricing policy
    pub fn with_policy(mut self, policy: PricingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Validate the cart, reconcile prices and open a payment session.
    #[instrument(skip(self, items, email), fields(items = items.len()))]
    pub async fn create_checkout(
        &self,
        items: &[CartItem],
        email: Option<&str>,
    ) -> ShopResult<CheckoutSession> {
        if items.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        let prices = self.authoritative_prices(items).await?;
        let request = self.session_request(items, &prices, email)?;

        info!(
            "Creating checkout: {} lines, {} units, total={}",
            request.line_items.len(),
            request.item_count(),
            self.currency.display(request.total())
        );

        let session = self.payments.create_session(&request).await.map_err(|e| {
            error!("Failed to create {} session: {}", self.payments.provider_name(), e);
            e
        })?;

        info!("Created checkout session: {}", session.id);
        Ok(session)
    }

    /// Bulk-fetch store prices for every id in the cart.
    async fn authoritative_prices(&self, items: &[CartItem]) -> ShopResult<HashMap<String, f64>> {
        let ids: BTreeSet<String> = items
            .iter()
            .filter_map(CartItem::product_id)
            .map(str::to_string)
            .collect();

        if ids.is_empty() {
            debug!("No product ids in cart, skipping price lookup");
            return Ok(HashMap::new());
        }

        match self.prices.fetch_prices(&ids).await {
            Ok(records) => {
                debug!(
                    "Fetched {} of {} prices from {}",
                    records.len(),
                    ids.len(),
                    self.prices.store_name()
                );
                if let Some(retired) = records.iter().find(|r| !r.active) {
                    warn!("Cart contains retired product {}", retired.id);
                    return Err(ShopError::ProductUnavailable(retired.id.clone()));
                }
                Ok(index_prices(records))
            }
            Err(e) if self.policy.fallback_to_client_price => {
                warn!(
                    "Price lookup via {} failed, using client prices: {}",
                    self.prices.store_name(),
                    e
                );
                Ok(HashMap::new())
            }
            Err(e) => {
                error!("Price lookup via {} failed: {}", self.prices.store_name(), e);
                Err(match e {
                    ShopError::PriceLookup(_) => e,
                    other => ShopError::PriceLookup(other.to_string()),
                })
            }
        }
    }

    /// Assemble the full session request from a cart and resolved prices.
    pub fn session_request(
        &self,
        items: &[CartItem],
        prices: &HashMap<String, f64>,
        email: Option<&str>,
    ) -> ShopResult<SessionRequest> {
        let line_items = build_line_items(items, prices, self.currency)?;
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let first_id = items.first().and_then(CartItem::product_id);

        let metadata: HashMap<String, String> =
            product_ids_metadata(&cart_product_ids(items))?.into_iter().collect();

        Ok(SessionRequest {
            line_items,
            currency: self.currency,
            customer_email: email.map(str::to_string),
            success_url: self.urls.success_url(first_id, email),
            cancel_url: self.urls.cancel_url(),
            mode: CheckoutMode::Payment,
            metadata,
        })
    }
}

/// Build line items in cart order, failing the whole batch on the first bad price.
pub fn build_line_items(
    items: &[CartItem],
    prices: &HashMap<String, f64>,
    currency: Currency,
) -> ShopResult<Vec<LineItem>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| -> ShopResult<LineItem> {
            let name = item.display_name(index);
            let price = item
                .product_id()
                .and_then(|id| prices.get(id).copied())
                .unwrap_or_else(|| item.client_price());

            let unit_amount = minor_units(price, currency).map_err(|message| {
                ShopError::InvalidPrice {
                    item: name.clone(),
                    message,
                }
            })?;

            let quantity = item.resolved_quantity().map_err(|message| {
                ShopError::InvalidQuantity {
                    item: name.clone(),
                    message,
                }
            })?;

            Ok(LineItem {
                name,
                unit_amount,
                quantity,
                images: item.image().map(str::to_string).into_iter().collect(),
            })
        })
        .collect()
}

/// Convert a major-unit price to a positive whole number of minor units.
fn minor_units(price: f64, currency: Currency) -> Result<i64, String> {
    let amount = currency.to_minor_units(price);
    if !amount.is_finite() {
        return Err(format!("price {} is not a number", price));
    }
    if amount <= 0.0 {
        return Err(format!("amount {} must be greater than zero", amount));
    }
    if amount > MAX_MINOR_UNITS {
        return Err(format!("amount {} is too large", amount));
    }
    Ok(amount as i64)
}

/// Distinct product ids in cart order
fn cart_product_ids(items: &[CartItem]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .filter_map(CartItem::product_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentSessionService;
    use crate::pricing::{PriceRecord, PriceStore};
    use crate::catalog::{Product, ProductCatalog};
    use crate::session::{SessionDetails, WebhookEvent, MAX_METADATA_VALUE_LEN, PRODUCT_IDS_METADATA_KEY};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct StubPrices {
        records: Vec<PriceRecord>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubPrices {
        fn with(records: Vec<PriceRecord>) -> Arc<Self> {
            Arc::new(Self {
                records,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                records: vec![],
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceStore for StubPrices {
        async fn fetch_prices(&self, ids: &BTreeSet<String>) -> ShopResult<Vec<PriceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ShopError::NetworkError("connection refused".into()));
            }
            Ok(self
                .records
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect())
        }

        fn store_name(&self) -> &'static str {
            "stub"
        }
    }

    #[derive(Default)]
    struct RecordingPayments {
        requests: Mutex<Vec<SessionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentSessionService for RecordingPayments {
        async fn create_session(&self, request: &SessionRequest) -> ShopResult<CheckoutSession> {
            if self.fail {
                return Err(ShopError::ProviderError {
                    provider: "test".into(),
                    message: "declined".into(),
                });
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(CheckoutSession {
                id: "cs_test_1".into(),
                url: "https://pay.test/cs_test_1".into(),
            })
        }

        async fn retrieve_session(&self, _session_id: &str) -> ShopResult<SessionDetails> {
            Err(ShopError::Internal("not used".into()))
        }

        async fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> ShopResult<WebhookEvent> {
            Err(ShopError::Internal("not used".into()))
        }

        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    fn service(prices: Arc<StubPrices>, payments: Arc<RecordingPayments>) -> CheckoutService {
        CheckoutService::new(prices, payments, CheckoutUrls::new("https://shop.test"))
    }

    fn cart(value: serde_json::Value) -> Vec<CartItem> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_store_price_overrides_client_price() {
        let prices = StubPrices::with(vec![PriceRecord::new("p1", 19.99)]);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(prices, payments.clone());

        let items = cart(json!([{ "id": "p1", "title": "Widget", "price": 0.01, "quantity": 2 }]));
        let session = checkout.create_checkout(&items, None).await.unwrap();

        assert_eq!(session.id, "cs_test_1");
        let requests = payments.requests.lock().unwrap();
        assert_eq!(
            requests[0].line_items,
            vec![LineItem {
                name: "Widget".into(),
                unit_amount: 1999,
                quantity: 2,
                images: vec![],
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_before_lookup() {
        let prices = StubPrices::with(vec![]);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(prices.clone(), payments.clone());

        let err = checkout.create_checkout(&[], None).await.unwrap_err();

        assert!(matches!(err, ShopError::EmptyCart));
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
        assert!(payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_price_rejects_batch() {
        let prices = StubPrices::with(vec![PriceRecord::new("p1", 10.0)]);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(prices, payments.clone());

        let items = cart(json!([
            { "id": "p1", "title": "Good" },
            { "title": "Mystery", "price": "0", "quantity": 1 }
        ]));
        let err = checkout.create_checkout(&items, None).await.unwrap_err();

        assert!(matches!(err, ShopError::InvalidPrice { ref item, .. } if item == "Mystery"));
        assert!(err.to_string().contains("Mystery"));
        assert!(payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retired_product_cannot_be_bought_at_client_price() {
        let mut retired = Product::new("wallpaper-pack", "Wallpaper Pack", 4.50);
        retired.active = false;
        let catalog = ProductCatalog::new().with_product(retired);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = CheckoutService::new(
            Arc::new(catalog),
            payments.clone(),
            CheckoutUrls::new("https://shop.test"),
        );

        let items = cart(json!([{ "id": "wallpaper-pack", "title": "Wallpapers", "price": 0.01 }]));
        let err = checkout.create_checkout(&items, None).await.unwrap_err();

        assert!(matches!(err, ShopError::ProductUnavailable(ref id) if id == "wallpaper-pack"));
        assert_eq!(err.status_code(), 400);
        assert!(payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_cart_spreads_product_ids_over_metadata_keys() {
        let ids: Vec<String> = (0..20)
            .map(|i| format!("6f1c9a2e-3b7d-4e8a-b5c1-9d0e7f{:06}", i))
            .collect();
        let records = ids.iter().map(|id| PriceRecord::new(id.clone(), 1.0)).collect();
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(StubPrices::with(records), payments.clone());

        let items: Vec<CartItem> = ids.iter().map(|id| CartItem::new(id.clone(), "Asset")).collect();
        checkout.create_checkout(&items, None).await.unwrap();

        let requests = payments.requests.lock().unwrap();
        let metadata = &requests[0].metadata;
        assert!(metadata.contains_key("product_ids_1"));
        assert!(metadata.values().all(|v| v.len() <= MAX_METADATA_VALUE_LEN));

        let details = SessionDetails {
            id: "cs_test_1".into(),
            payment_status: "paid".into(),
            customer_email: None,
            amount_total: None,
            metadata: metadata.clone(),
        };
        assert_eq!(details.product_ids(), ids);
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_back_to_client_price() {
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(StubPrices::failing(), payments.clone());

        let items = cart(json!([{ "id": "p1", "name": "Widget", "price": "4.50" }]));
        checkout.create_checkout(&items, None).await.unwrap();

        let requests = payments.requests.lock().unwrap();
        assert_eq!(requests[0].line_items[0].unit_amount, 450);
    }

    #[tokio::test]
    async fn test_lookup_failure_without_fallback_fails() {
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(StubPrices::failing(), payments.clone()).with_policy(PricingPolicy {
            fallback_to_client_price: false,
        });

        let items = cart(json!([{ "id": "p1", "name": "Widget", "price": "4.50" }]));
        let err = checkout.create_checkout(&items, None).await.unwrap_err();

        assert!(matches!(err, ShopError::PriceLookup(_)));
        assert!(payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_without_ids_skip_lookup() {
        let prices = StubPrices::with(vec![]);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(prices.clone(), payments.clone());

        let items = cart(json!([{ "title": "Sticker", "price": 2 }]));
        checkout.create_checkout(&items, None).await.unwrap();

        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
        assert_eq!(payments.requests.lock().unwrap()[0].line_items[0].unit_amount, 200);
    }

    #[tokio::test]
    async fn test_session_failure_surfaces_once() {
        let prices = StubPrices::with(vec![PriceRecord::new("p1", 1.0)]);
        let payments = Arc::new(RecordingPayments {
            fail: true,
            ..Default::default()
        });
        let checkout = service(prices, payments);

        let items = cart(json!([{ "id": "p1" }]));
        let err = checkout.create_checkout(&items, None).await.unwrap_err();
        assert!(matches!(err, ShopError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_redirects_and_metadata() {
        let prices = StubPrices::with(vec![
            PriceRecord::new("p1", 1.0),
            PriceRecord::new("p2", 2.0),
        ]);
        let payments = Arc::new(RecordingPayments::default());
        let checkout = service(prices, payments.clone());

        let items = cart(json!([{ "id": "p1" }, { "id": "p2" }, { "id": "p1" }]));
        checkout
            .create_checkout(&items, Some("buyer@example.com"))
            .await
            .unwrap();

        let requests = payments.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(
            request.success_url,
            "https://shop.test/thank-you/p1?session_id={CHECKOUT_SESSION_ID}&email=buyer%40example.com"
        );
        assert_eq!(request.cancel_url, "https://shop.test/cart");
        assert_eq!(request.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(request.mode, CheckoutMode::Payment);
        assert_eq!(request.metadata.get(PRODUCT_IDS_METADATA_KEY).unwrap(), "p1,p2");
        assert_eq!(request.line_items.len(), 3);
    }

    #[test]
    fn test_build_line_items_names_and_images() {
        let items = cart(json!([
            { "name": "Named", "title": "Ignored", "price": 1, "image_url": "https://img.test/a.png" },
            { "price": 1, "image_url": "" }
        ]));
        let line_items = build_line_items(&items, &HashMap::new(), Currency::USD).unwrap();

        assert_eq!(line_items[0].name, "Named");
        assert_eq!(line_items[0].images, vec!["https://img.test/a.png"]);
        assert_eq!(line_items[1].name, "Item 2");
        assert!(line_items[1].images.is_empty());
    }

    #[test]
    fn test_unknown_id_uses_client_price() {
        let items = cart(json!([{ "id": "unknown", "title": "X", "price": 3.5 }]));
        let prices = HashMap::from([("other".to_string(), 99.0)]);
        let line_items = build_line_items(&items, &prices, Currency::USD).unwrap();
        assert_eq!(line_items[0].unit_amount, 350);
    }

    #[test]
    fn test_invalid_prices() {
        for price in [json!(-1), json!("abc"), json!(null), json!(0.004)] {
            let items = cart(json!([{ "title": "Bad", "price": price.clone() }]));
            let err = build_line_items(&items, &HashMap::new(), Currency::USD).unwrap_err();
            assert!(
                matches!(err, ShopError::InvalidPrice { ref item, .. } if item == "Bad"),
                "price {}",
                price
            );
        }
    }

    #[test]
    fn test_store_price_can_also_be_invalid() {
        let items = cart(json!([{ "id": "p1", "title": "Free", "price": 10 }]));
        let prices = HashMap::from([("p1".to_string(), 0.0)]);
        assert!(build_line_items(&items, &prices, Currency::USD).is_err());
    }

    #[test]
    fn test_quantity_passthrough_and_defaults() {
        let items = cart(json!([
            { "title": "A", "price": 1, "quantity": 5 },
            { "title": "B", "price": 1, "quantity": 0 },
            { "title": "C", "price": 1, "quantity": -2 },
            { "title": "D", "price": 1 }
        ]));
        let quantities: Vec<u32> = build_line_items(&items, &HashMap::new(), Currency::USD)
            .unwrap()
            .iter()
            .map(|l| l.quantity)
            .collect();
        assert_eq!(quantities, vec![5, 1, 1, 1]);
    }

    #[test]
    fn test_whole_float_quantity_and_oversized_quantity() {
        let items = cart(json!([{ "title": "A", "price": 1, "quantity": 2.0 }]));
        let line_items = build_line_items(&items, &HashMap::new(), Currency::USD).unwrap();
        assert_eq!(line_items[0].quantity, 2);

        let items = cart(json!([
            { "title": "A", "price": 1 },
            { "title": "Bulk", "price": 1, "quantity": 5_000_000_000u64 }
        ]));
        let err = build_line_items(&items, &HashMap::new(), Currency::USD).unwrap_err();
        assert!(matches!(err, ShopError::InvalidQuantity { ref item, .. } if item == "Bulk"));
    }
}
