//! # Checkout Routes
//!
//! ## Order Lifecycle Over HTTP
//! ```text
//! POST /api/checkout  { cart, customer, coupon_code }
//!      │  pending order (live prices, no stock taken)
//!      │  processor preference ──► { checkout_url }
//!      ▼
//! shopper pays at the processor
//!      │
//!      ├──► POST /api/webhooks/payments       (processor, always 200)
//!      └──► POST /api/checkout/{id}/confirm   (shopper's return page)
//!                 │
//!                 ▼
//!        get_payment ──► apply_payment_update
//!                          approved ──► stock taken, coupon counted
//!                          rejected ──► order cancelled
//! ```
//!
//! Both notification paths converge on the same idempotent update, so
//! whichever arrives second changes nothing.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::processor::{string_or_number, PreferenceRequest};
use crate::state::AppState;
use tienda_core::cart::{Cart, StoredCart};
use tienda_core::{Order, OrderCustomer};
use tienda_db::{CheckoutItem, CheckoutRequest};

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// The cart exactly as the storefront persisted it.
    pub cart: StoredCart,
    pub customer: OrderCustomer,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub order_number: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub preference_id: String,
    /// Hosted payment page.
    pub checkout_url: String,
}

/// Creates a pending order and its processor preference.
///
/// ## Errors
/// - `STALE_CART` if the stored cart was written by another release
/// - `INSUFFICIENT_STOCK` / `COUPON_REJECTED` from the pending order
/// - `PAYMENT_ERROR` if the processor is unavailable; the pending order is
///   cancelled so it never lingers
pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let cart = Cart::try_from(body.cart)?;
    let request = CheckoutRequest {
        items: cart.items.iter().map(CheckoutItem::from).collect(),
        customer: body.customer,
        shipping_address: body.shipping_address,
        coupon_code: body.coupon_code,
    };

    let orders = state.db.orders();
    let order = orders.create_pending_order(&request).await?;

    let preference_request = PreferenceRequest::for_order(&order, &state.processor_settings);
    let preference = match state.processor.create_preference(&preference_request).await {
        Ok(preference) => preference,
        Err(err) => {
            warn!(order_number = %order.order_number, "Preference failed, releasing pending order");
            if let Err(cancel_err) = orders.cancel_order(&order.id, Some("processor unavailable")).await {
                error!(order_number = %order.order_number, error = %cancel_err, "Could not release pending order");
            }
            return Err(err.into());
        }
    };
    orders.set_preference(&order.id, &preference.id).await?;

    info!(
        order_number = %order.order_number,
        total = %order.total_cents,
        preference_id = %preference.id,
        "Checkout started"
    );
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order.id,
            order_number: order.order_number,
            subtotal_cents: order.subtotal_cents,
            discount_cents: order.discount_cents,
            total_cents: order.total_cents,
            preference_id: preference.id,
            checkout_url: preference.init_point,
        }),
    ))
}

// =============================================================================
// Payment Reconciliation
// =============================================================================

/// Looks a payment up at the processor and applies it to its order.
async fn reconcile_payment(
    state: &AppState,
    payment_id: &str,
    expected_order: Option<&str>,
) -> Result<Order, ApiError> {
    let payment = state.processor.get_payment(payment_id).await?;
    let order_id = payment
        .external_reference
        .as_deref()
        .ok_or_else(|| ApiError::validation("Payment has no order reference"))?;

    if let Some(expected) = expected_order {
        if expected != order_id {
            return Err(ApiError::validation("Payment does not belong to this order"));
        }
    }

    let order = state
        .db
        .orders()
        .apply_payment_update(order_id, &payment.id, payment.payment_status())
        .await?;
    Ok(order)
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub payment_id: String,
}

/// Return-page confirmation.
///
/// ## Errors
/// `INSUFFICIENT_STOCK` when the payment was approved but the goods are
/// gone; the order is then on the admin attention list.
pub async fn confirm(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<Order>, ApiError> {
    let order = reconcile_payment(&state, &body.payment_id, Some(&order_id)).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

/// Payment id from a JSON body (`{"type":"payment","data":{"id":..}}`)
/// or from query parameters (`?type=payment&data.id=..` / `?topic=payment&id=..`).
fn notification_payment_id(params: &HashMap<String, String>, body: &[u8]) -> Option<String> {
    if let Ok(notification) = serde_json::from_slice::<Notification>(body) {
        let is_payment = notification.kind.as_deref().map_or(true, |kind| kind == "payment");
        if let (true, Some(data)) = (is_payment, notification.data) {
            return Some(data.id);
        }
    }

    let topic = params.get("type").or_else(|| params.get("topic"))?;
    if topic != "payment" {
        return None;
    }
    params.get("data.id").or_else(|| params.get("id")).cloned()
}

/// Processor notification endpoint. Always answers 200 so the processor
/// stops retrying; failures are logged.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> StatusCode {
    let Some(payment_id) = notification_payment_id(&params, &body) else {
        debug!("Ignoring notification without a payment id");
        return StatusCode::OK;
    };

    match reconcile_payment(&state, &payment_id, None).await {
        Ok(order) => info!(
            payment_id = %payment_id,
            order_number = %order.order_number,
            status = %order.status,
            "Payment notification applied"
        ),
        Err(err) => error!(payment_id = %payment_id, error = %err, "Payment notification failed"),
    }
    StatusCode::OK
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        body_json, cart_json, post_json, product, send, stock_of, test_app,
    };
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tienda_core::{OrderStatus, PaymentStatus};

    fn checkout_body(cart: serde_json::Value) -> serde_json::Value {
        json!({
            "cart": cart,
            "customer": {"name": "Ana Gómez", "email": "Ana@Example.com"},
            "shipping_address": "Av. Siempreviva 742",
        })
    }

    #[tokio::test]
    async fn test_checkout_then_confirm() {
        let (app, state, processor) = test_app().await;
        let remera = product(&state, "Remera", "REM-001", 10_000, 5).await;

        let response = send(
            &app,
            post_json("/api/checkout", checkout_body(cart_json(&[(&remera, 2)]))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let order_id = created["order_id"].as_str().unwrap().to_string();
        assert_eq!(created["total_cents"], 20_000);
        assert!(created["checkout_url"].as_str().unwrap().starts_with("https://pay.test/"));

        let preference = processor.last_preference().unwrap();
        assert_eq!(preference.external_reference, order_id);
        assert_eq!(preference.payer.email, "ana@example.com");
        // Nothing is taken until the payment is approved.
        assert_eq!(stock_of(&state, &remera.id).await, 5);

        processor.add_payment("9001", "approved", &order_id);
        let uri = format!("/api/checkout/{order_id}/confirm");
        let response = send(&app, post_json(&uri, json!({"payment_id": "9001"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let order = body_json(response).await;
        assert_eq!(order["status"], "confirmed");
        assert_eq!(order["payment_status"], "approved");
        assert_eq!(stock_of(&state, &remera.id).await, 3);

        // The webhook for the same payment changes nothing.
        let response = send(
            &app,
            post_json("/api/webhooks/payments", json!({"type": "payment", "data": {"id": 9001}})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stock_of(&state, &remera.id).await, 3);
    }

    #[tokio::test]
    async fn test_stale_cart_is_rejected() {
        let (app, state, _) = test_app().await;
        let remera = product(&state, "Remera", "REM-001", 10_000, 5).await;
        let mut cart = cart_json(&[(&remera, 1)]);
        cart["version"] = json!(1);

        let response = send(&app, post_json("/api/checkout", checkout_body(cart))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "STALE_CART");
    }

    #[tokio::test]
    async fn test_processor_failure_releases_order() {
        let (app, state, processor) = test_app().await;
        let remera = product(&state, "Remera", "REM-001", 10_000, 5).await;
        processor.fail_preferences();

        let response = send(
            &app,
            post_json("/api/checkout", checkout_body(cart_json(&[(&remera, 1)]))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["code"], "PAYMENT_ERROR");

        let orders = state.db.orders().list(&Default::default()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_confirm_rejects_foreign_payment() {
        let (app, state, processor) = test_app().await;
        let remera = product(&state, "Remera", "REM-001", 10_000, 5).await;
        let response = send(
            &app,
            post_json("/api/checkout", checkout_body(cart_json(&[(&remera, 1)]))),
        )
        .await;
        let order_id = body_json(response).await["order_id"].as_str().unwrap().to_string();

        processor.add_payment("77", "approved", "some-other-order");
        let uri = format!("/api/checkout/{order_id}/confirm");
        let response = send(&app, post_json(&uri, json!({"payment_id": "77"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stock_of(&state, &remera.id).await, 5);
    }

    #[tokio::test]
    async fn test_webhook_always_answers_ok() {
        let (app, state, processor) = test_app().await;
        let remera = product(&state, "Remera", "REM-001", 10_000, 5).await;
        let response = send(
            &app,
            post_json("/api/checkout", checkout_body(cart_json(&[(&remera, 1)]))),
        )
        .await;
        let order_id = body_json(response).await["order_id"].as_str().unwrap().to_string();

        // Unknown payment, garbage body, other topics: all 200.
        let response = send(
            &app,
            post_json("/api/webhooks/payments", json!({"type": "payment", "data": {"id": "404"}})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let garbage = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payments")
            .body(Body::from("not json"))
            .unwrap();
        assert_eq!(send(&app, garbage).await.status(), StatusCode::OK);

        // Query-string form, rejected payment: the pending order is cancelled.
        processor.add_payment("55", "rejected", &order_id);
        let response = send(
            &app,
            post_json("/api/webhooks/payments?type=payment&data.id=55", json!({})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let order = state.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Rejected);
        assert_eq!(stock_of(&state, &remera.id).await, 5);
    }

    #[test]
    fn test_notification_payment_id() {
        let none = HashMap::new();
        assert_eq!(
            notification_payment_id(&none, br#"{"type":"payment","data":{"id":123}}"#),
            Some("123".to_string())
        );
        assert_eq!(
            notification_payment_id(&none, br#"{"type":"merchant_order","data":{"id":"1"}}"#),
            None
        );

        let params = HashMap::from([
            ("topic".to_string(), "payment".to_string()),
            ("id".to_string(), "42".to_string()),
        ]);
        assert_eq!(notification_payment_id(&params, b""), Some("42".to_string()));
    }
}
