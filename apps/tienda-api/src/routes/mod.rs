//! # HTTP Routes
//!
//! ```text
//! /health                                  database check
//! /api/products[/{id}]                     storefront catalog
//! /api/coupons/validate                    coupon quote
//! /api/checkout[/{order_id}/confirm]       hosted checkout
//! /api/webhooks/payments                   processor notifications
//! /api/account/{customer}/transactions/{tx}/receipt
//! /admin/...                               back-office (see admin module)
//! ```

pub mod admin;
pub mod checkout;
pub mod health;
pub mod storefront;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::receipt::ReceiptData;

/// All routes, before middleware and state are attached.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/products", get(storefront::list_products))
        .route("/api/products/{id}", get(storefront::get_product))
        .route("/api/coupons/validate", post(storefront::validate_coupon))
        .route(
            "/api/account/{customer_id}/transactions/{transaction_id}/receipt",
            get(storefront::account_receipt),
        )
        .route("/api/checkout", post(checkout::checkout))
        .route("/api/checkout/{order_id}/confirm", post(checkout::confirm))
        .route("/api/webhooks/payments", post(checkout::payment_webhook))
        .nest("/admin", admin::router())
}

/// Renders a receipt as a PNG download.
pub(crate) fn png_response(receipt: &ReceiptData) -> Result<Response, ApiError> {
    let bytes = tienda_receipt::render_png(receipt)?;
    let disposition = format!("attachment; filename=\"{}\"", receipt.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
