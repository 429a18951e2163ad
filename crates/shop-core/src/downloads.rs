//! # Download Links
//!
//! Signed download URLs for the products bought in a paid checkout session.

use crate::error::{ShopError, ShopResult};
use crate::payment::BoxedPaymentService;
use crate::session::SessionDetails;
use crate::storage::{product_object_key, BoxedObjectStorage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// One product's signed download link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub product_id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues download links for paid sessions
#[derive(Clone)]
pub struct DownloadService {
    storage: BoxedObjectStorage,
    payments: BoxedPaymentService,
    link_ttl: Duration,
}

impl DownloadService {
    pub fn new(
        storage: BoxedObjectStorage,
        payments: BoxedPaymentService,
        link_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            payments,
            link_ttl,
        }
    }

    pub fn link_ttl(&self) -> Duration {
        self.link_ttl
    }

    /// Look up the session and issue links for its products.
    ///
    /// Fails with [`ShopError::PaymentRequired`] unless the session is paid.
    #[instrument(skip(self))]
    pub async fn links_for_session(&self, session_id: &str) -> ShopResult<Vec<DownloadLink>> {
        let session = self.payments.retrieve_session(session_id).await?;
        self.links_for_details(&session).await
    }

    /// Issue links for an already-retrieved session.
    pub async fn links_for_details(&self, session: &SessionDetails) -> ShopResult<Vec<DownloadLink>> {
        if !session.is_paid() {
            return Err(ShopError::PaymentRequired {
                session_id: session.id.clone(),
                status: session.payment_status.clone(),
            });
        }

        let mut links = Vec::new();
        for product_id in session.product_ids() {
            let signed = self
                .storage
                .signed_url(&product_object_key(&product_id), self.link_ttl)
                .await?;
            links.push(DownloadLink {
                product_id,
                url: signed.url,
                expires_at: signed.expires_at,
            });
        }

        info!("Issued {} download links for session {}", links.len(), session.id);
        Ok(links)
    }
}
