//! # Request Handlers
//!
//! Axum request handlers for the storefront API.

use crate::receipts::ReceiptWebhookHandler;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_core::{product_object_key, CartItem, DownloadLink, ShopError, StoredObject};
use shop_stripe::dispatch_webhook_event;
use tracing::{error, info, instrument, warn, Level};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Cart contents as sent by the storefront
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Buyer email (optional)
    #[serde(default, alias = "customer_email")]
    pub email: Option<String>,
}

/// Create checkout response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCheckoutResponse {
    /// Hosted checkout URL (redirect the buyer here)
    pub url: String,
    /// Session ID
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadsResponse {
    pub session_id: String,
    pub links: Vec<DownloadLink>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(response))
}

/// Upstream and server-side failures are errors; bad client input is a warning
fn failure_level(err: &ShopError) -> Level {
    if err.is_upstream() || err.status_code() >= 500 {
        Level::ERROR
    } else {
        Level::WARN
    }
}

fn multipart_error_to_response(err: MultipartError) -> ApiError {
    let status = err.status();
    let response = ErrorResponse::new("Invalid multipart upload", status.as_u16())
        .with_details(err.body_text());
    (status, Json(response))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shop-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a checkout session from the client's cart
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let session = state
        .checkout
        .create_checkout(&request.items, email)
        .await
        .map_err(|e| {
            if failure_level(&e) == Level::ERROR {
                error!("Failed to create checkout: {}", e);
            } else {
                warn!("Rejected checkout: {}", e);
            }
            shop_error_to_response(e)
        })?;

    Ok(Json(CreateCheckoutResponse {
        url: session.url,
        id: session.id,
    }))
}

/// Upload (or replace) the downloadable file for a product
#[instrument(skip(state, headers, multipart))]
pub async fn upload_product_file(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>), ApiError> {
    authorize_admin(&state, &headers).map_err(shop_error_to_response)?;

    if product_id.is_empty() || product_id.contains('/') || product_id == "." || product_id == ".." {
        return Err(shop_error_to_response(ShopError::InvalidRequest(format!(
            "Invalid product id: {:?}",
            product_id
        ))));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error_to_response)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error_to_response)?;
        upload = Some((bytes, content_type));
        break;
    }

    let (bytes, content_type) = upload.filter(|(b, _)| !b.is_empty()).ok_or_else(|| {
        shop_error_to_response(ShopError::InvalidRequest(
            "Multipart field \"file\" is missing or empty".to_string(),
        ))
    })?;

    let stored = state
        .storage
        .put_object(&product_object_key(&product_id), bytes.to_vec(), &content_type)
        .await
        .map_err(|e| {
            error!("Upload for {} failed: {}", product_id, e);
            shop_error_to_response(e)
        })?;

    info!("Uploaded file for product {}: {} bytes", product_id, stored.size);
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Signed download links for a paid session
#[instrument(skip(state))]
pub async fn get_downloads(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DownloadsResponse>, ApiError> {
    let links = state
        .downloads
        .links_for_session(&session_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(DownloadsResponse { session_id, links }))
}

/// Issue a reset token and email the link
///
/// Answers 202 for any plausible address so callers cannot tell which
/// accounts exist.
#[instrument(skip(state, request))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.resets.request_reset(&request.email).await {
        Ok(_) => {}
        Err(e @ ShopError::InvalidRequest(_)) => return Err(shop_error_to_response(e)),
        Err(e) if e.is_upstream() => error!("Password reset delivery failed: {}", e),
        Err(e) => return Err(shop_error_to_response(e)),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    ))
}

/// Check a reset token without consuming it
#[instrument(skip(state, request))]
pub async fn verify_reset_token(
    State(state): State<AppState>,
    Json(request): Json<ResetTokenRequest>,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let record = state
        .resets
        .verify(&request.token)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(VerifyTokenResponse {
        valid: true,
        email: record.email,
        expires_at: record.expires_at,
    }))
}

/// Consume a reset token, handing back the account email
#[instrument(skip(state, request))]
pub async fn consume_reset_token(
    State(state): State<AppState>,
    Json(request): Json<ResetTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = state
        .resets
        .consume(&request.token)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(serde_json::json!({ "email": email })))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Get signature header
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe-Signature header", 400)),
            )
        })?;

    // Verify and parse webhook
    let event = state
        .payments
        .verify_webhook(&body, signature)
        .await
        .map_err(|e| {
            warn!("Webhook verification failed: {}", e);
            shop_error_to_response(e)
        })?;

    info!(
        "Received webhook: type={:?}, id={}",
        event.event_type, event.event_id
    );

    let handler = ReceiptWebhookHandler::new(
        state.downloads.clone(),
        state.mailer.clone(),
        state.checkout.currency(),
    );
    dispatch_webhook_event(&handler, event).await.map_err(|e| {
        error!("Webhook handler error: {}", e);
        shop_error_to_response(e)
    })?;

    Ok(Json(serde_json::json!({ "received": true })))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ShopError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or_else(|| ShopError::Unavailable("uploads are disabled".to_string()))?;

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ShopError::Unauthorized("missing bearer token".to_string()))?;

    if !constant_time_eq(presented.trim().as_bytes(), expected.as_bytes()) {
        return Err(ShopError::Unauthorized("invalid admin token".to_string()));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
    }

    #[test]
    fn test_shop_error_conversion() {
        let (status, Json(body)) = shop_error_to_response(ShopError::EmptyCart);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Cart is empty");

        let (status, _) = shop_error_to_response(ShopError::TokenExpired);
        assert_eq!(status, StatusCode::GONE);
    }

    #[test]
    fn test_client_errors_log_as_warnings() {
        assert_eq!(failure_level(&ShopError::EmptyCart), Level::WARN);
        assert_eq!(
            failure_level(&ShopError::InvalidPrice {
                item: "Mystery".into(),
                message: "amount 0 must be greater than zero".into(),
            }),
            Level::WARN
        );
        assert_eq!(
            failure_level(&ShopError::ProviderError {
                provider: "stripe".into(),
                message: "declined".into(),
            }),
            Level::ERROR
        );
        assert_eq!(failure_level(&ShopError::Internal("lock".into())), Level::ERROR);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }
}
