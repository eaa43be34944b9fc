//! # Storefront Routes
//!
//! Public reads: the active catalog, coupon quotes and a customer's own
//! receipts.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::png_response;
use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::{DiscountType, Money, Product, ProductDetail};
use tienda_db::ProductFilter;

/// Active products only, whatever the query says.
pub async fn list_products(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    filter.include_inactive = false;
    let products = state.db.products().list(&filter).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetail>, ApiError> {
    let detail = state
        .db
        .products()
        .get_detail(&id)
        .await?
        .filter(|detail| detail.product.is_active)
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub struct CouponQuoteRequest {
    pub code: String,
    pub subtotal_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CouponQuote {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Quotes the discount a code would give. Nothing is counted.
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<CouponQuoteRequest>,
) -> Result<Json<CouponQuote>, ApiError> {
    if request.subtotal_cents < 0 {
        return Err(ApiError::validation("subtotal_cents must not be negative"));
    }
    let subtotal = Money::from_cents(request.subtotal_cents);
    let (coupon, discount) = state
        .db
        .coupons()
        .validate_for(&request.code, subtotal, Utc::now())
        .await?;

    debug!(code = %coupon.code, discount = %discount, "Coupon quoted");
    Ok(Json(CouponQuote {
        code: coupon.code,
        discount_type: coupon.discount_type,
        discount_cents: discount.cents(),
        total_cents: (subtotal - discount).cents(),
    }))
}

/// A customer's own receipt; someone else's transaction is a 404.
pub async fn account_receipt(
    State(state): State<AppState>,
    Path((customer_id, transaction_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let transaction = state
        .db
        .ledger()
        .get_customer_transaction(&customer_id, &transaction_id)
        .await?;
    let receipt = state
        .db
        .receipts()
        .for_loaded_transaction(transaction, &state.store)
        .await?;
    png_response(&receipt)
}
