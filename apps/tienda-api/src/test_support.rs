//! Router fixtures for handler tests: an in-memory database, a scripted
//! payment processor, and request helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::ProcessorSettings;
use crate::processor::{
    PaymentProcessor, Preference, PreferenceRequest, ProcessorError, ProcessorPayment,
};
use crate::state::AppState;
use crate::build_router;
use tienda_core::cart::{Cart, CartItem};
use tienda_core::receipt::StoreProfile;
use tienda_core::{Customer, Product, ProductVariant};
use tienda_db::{Database, DbConfig, NewCustomer, NewProduct, NewVariant};

// =============================================================================
// Fake Processor
// =============================================================================

#[derive(Default)]
pub struct FakeProcessor {
    preferences: Mutex<Vec<PreferenceRequest>>,
    payments: Mutex<HashMap<String, ProcessorPayment>>,
    failing: AtomicBool,
}

impl FakeProcessor {
    pub fn add_payment(&self, id: &str, status: &str, order_id: &str) {
        self.payments.lock().unwrap().insert(
            id.to_string(),
            ProcessorPayment {
                id: id.to_string(),
                status: status.to_string(),
                status_detail: None,
                external_reference: Some(order_id.to_string()),
            },
        );
    }

    pub fn last_preference(&self) -> Option<PreferenceRequest> {
        self.preferences.lock().unwrap().last().cloned()
    }

    /// Every following preference request fails with a 503.
    pub fn fail_preferences(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference, ProcessorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProcessorError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let mut preferences = self.preferences.lock().unwrap();
        preferences.push(request.clone());
        let id = format!("pref-{}", preferences.len());
        Ok(Preference {
            init_point: format!("https://pay.test/{id}"),
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| ProcessorError::NotFound(payment_id.to_string()))
    }
}

// =============================================================================
// App
// =============================================================================

pub fn store() -> StoreProfile {
    StoreProfile {
        name: "Tienda Norte".to_string(),
        site_url: "tiendanorte.com".to_string(),
        thank_you: "Gracias por su compra".to_string(),
        utc_offset_minutes: -180,
    }
}

pub async fn test_app() -> (Router, AppState, Arc<FakeProcessor>) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let processor = Arc::new(FakeProcessor::default());
    let state = AppState::new(db, store(), processor.clone(), ProcessorSettings::default());
    (build_router(state.clone()), state, processor)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    with_json("POST", uri, body)
}

pub fn put_json(uri: &str, body: Value) -> Request<Body> {
    with_json("PUT", uri, body)
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Data
// =============================================================================

pub async fn product(state: &AppState, name: &str, sku: &str, price_cents: i64, stock: i64) -> Product {
    state
        .db
        .products()
        .insert(&NewProduct {
            name: name.to_string(),
            sku: Some(sku.to_string()),
            price_cents,
            stock,
            ..Default::default()
        })
        .await
        .unwrap()
}

pub async fn product_with_sizes(
    state: &AppState,
    name: &str,
    sku: &str,
    price_cents: i64,
    sizes: &[(&str, i64)],
) -> (Product, Vec<ProductVariant>) {
    let product = product(state, name, sku, price_cents, 0).await;
    let mut variants = Vec::new();
    for (size, stock) in sizes {
        let variant = state
            .db
            .products()
            .add_variant(
                &product.id,
                &NewVariant {
                    sku: Some(sku.to_string()),
                    size: Some(size.to_string()),
                    color: None,
                    stock: *stock,
                },
            )
            .await
            .unwrap();
        variants.push(variant);
    }
    (product, variants)
}

pub async fn customer(state: &AppState, name: &str) -> Customer {
    state
        .db
        .customers()
        .insert(&NewCustomer {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
        })
        .await
        .unwrap()
}

pub async fn stock_of(state: &AppState, product_id: &str) -> i64 {
    state
        .db
        .products()
        .get_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

/// A stored cart (current version) holding `quantity` of each product.
pub fn cart_json(lines: &[(&Product, i64)]) -> Value {
    let mut cart = Cart::new();
    for (product, quantity) in lines {
        cart.add(CartItem::from_product(product, None, *quantity)).unwrap();
    }
    serde_json::to_value(cart.to_stored()).unwrap()
}
