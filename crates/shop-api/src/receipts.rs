//! # Receipts
//!
//! Webhook handler that emails a receipt, with download links, when a
//! checkout completes. Delivery problems are logged; the event itself has
//! been received either way.

use async_trait::async_trait;
use shop_core::{receipt_email, BoxedMailer, Currency, DownloadService, SessionDetails, ShopResult};
use shop_stripe::{CheckoutCompletedData, WebhookHandler};
use tracing::{error, info, warn};

/// Sends a receipt for every paid checkout completion
pub struct ReceiptWebhookHandler {
    downloads: DownloadService,
    mailer: BoxedMailer,
    currency: Currency,
}

impl ReceiptWebhookHandler {
    pub fn new(downloads: DownloadService, mailer: BoxedMailer, currency: Currency) -> Self {
        Self {
            downloads,
            mailer,
            currency,
        }
    }
}

#[async_trait]
impl WebhookHandler for ReceiptWebhookHandler {
    async fn on_checkout_completed(&self, data: CheckoutCompletedData) -> ShopResult<()> {
        if !data.is_paid() {
            info!(
                "Checkout {} completed with payment_status={}, no receipt sent",
                data.session_id, data.payment_status
            );
            return Ok(());
        }

        let Some(email) = data.customer_email.clone() else {
            warn!("Checkout {} has no customer email, no receipt sent", data.session_id);
            return Ok(());
        };

        let currency = data.currency.unwrap_or(self.currency);
        let session = SessionDetails {
            id: data.session_id,
            payment_status: data.payment_status,
            customer_email: Some(email.clone()),
            amount_total: data.amount_total,
            metadata: data.metadata,
        };

        let links = self.downloads.links_for_details(&session).await.unwrap_or_else(|e| {
            warn!("Could not issue download links for {}: {}", session.id, e);
            Vec::new()
        });

        let message = receipt_email(&email, &session.id, session.amount_total, currency, &links);
        match self.mailer.send(&message).await {
            Ok(message_id) => info!(
                "Sent receipt for {} ({} links): message_id={}",
                session.id,
                links.len(),
                message_id
            ),
            Err(e) => error!("Failed to send receipt for {}: {}", session.id, e),
        }

        Ok(())
    }
}
