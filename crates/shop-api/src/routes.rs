//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - API:
///   - POST /api/checkout - Create checkout session from a cart
///   - POST /api/products/{product_id}/file - Upload product file (admin)
///   - GET  /api/downloads/{session_id} - Signed links for a paid session
///   - POST /api/password-reset - Issue reset token + email
///   - POST /api/password-reset/verify - Check reset token
///   - POST /api/password-reset/consume - Consume reset token
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let reset_routes = Router::new()
        .route("/", post(handlers::request_password_reset))
        .route("/verify", post(handlers::verify_reset_token))
        .route("/consume", post(handlers::consume_reset_token));

    let api_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route(
            "/products/{product_id}/file",
            post(handlers::upload_product_file).layer(upload_limit),
        )
        .route("/downloads/{session_id}", get(handlers::get_downloads))
        .nest("/password-reset", reset_routes);

    // Webhook routes (must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .nest("/webhook", webhook_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}
