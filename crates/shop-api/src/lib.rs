//! # shop-api
//!
//! HTTP API layer for the storefront backend.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout, upload, download and password-reset endpoints
//! - Stripe webhook handling that emails receipts
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/checkout` | Create checkout session |
//! | POST | `/api/products/{product_id}/file` | Upload product file |
//! | GET | `/api/downloads/{session_id}` | Download links for a paid session |
//! | POST | `/api/password-reset` | Request a reset link |
//! | POST | `/api/password-reset/verify` | Check a reset token |
//! | POST | `/api/password-reset/consume` | Consume a reset token |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod handlers;
pub mod receipts;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, Collaborators};
