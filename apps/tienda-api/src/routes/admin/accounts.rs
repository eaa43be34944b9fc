//! # Running Tabs
//!
//! Balances are derived from the ledger; nothing here edits a balance
//! directly.
//!
//! ```text
//! account sale ──► +amount ─┐
//! charge       ──► +amount ─┼──► Σ = balance (positive: customer owes)
//! payment      ──► -amount ─┘
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::png_response;
use crate::state::AppState;
use tienda_core::{AccountTransaction, CustomerBalance, Money, PaymentMethod};
use tienda_db::NewPayment;

pub async fn balances(State(state): State<AppState>) -> Result<Json<Vec<CustomerBalance>>, ApiError> {
    Ok(Json(state.db.ledger().balances().await?))
}

#[derive(Debug, Serialize)]
pub struct AccountDetail {
    pub balance: CustomerBalance,
    /// Newest first.
    pub transactions: Vec<AccountTransaction>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<AccountDetail>, ApiError> {
    let ledger = state.db.ledger();
    let balance = ledger.balance(&customer_id).await?;
    let transactions = ledger.transactions(&customer_id).await?;
    Ok(Json(AccountDetail {
        balance,
        transactions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

pub async fn register_payment(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(body): Json<PaymentBody>,
) -> Result<(StatusCode, Json<AccountTransaction>), ApiError> {
    let payment = NewPayment {
        customer_id,
        amount_cents: body.amount_cents,
        payment_method: body.payment_method,
        description: body.description,
        idempotency_key: body.idempotency_key,
    };
    let transaction = state.db.ledger().register_payment(&payment, &state.store).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[derive(Debug, Deserialize)]
pub struct ChargeBody {
    pub amount_cents: i64,
    pub description: String,
    pub sale_id: Option<String>,
}

/// A debit recorded after the fact, outside the register.
pub async fn register_charge(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(body): Json<ChargeBody>,
) -> Result<(StatusCode, Json<AccountTransaction>), ApiError> {
    let transaction = state
        .db
        .ledger()
        .register_sale_to_account(
            &customer_id,
            body.sale_id.as_deref(),
            Money::from_cents(body.amount_cents),
            &body.description,
            None,
            &state.store,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn receipt(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Response, ApiError> {
    let receipt = state
        .db
        .receipts()
        .for_transaction(&transaction_id, &state.store)
        .await?;
    png_response(&receipt)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_bytes, body_json, customer, get, post_json, product, send, test_app};
    use axum::http::{header, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_account_sale_then_payment() {
        let (app, state, _) = test_app().await;
        let marta = customer(&state, "Marta").await;
        let campera = product(&state, "Campera", "CAM-001", 50_000, 3).await;

        let response = send(
            &app,
            post_json(
                "/admin/pos/sales",
                json!({
                    "lines": [{"product_id": campera.id, "quantity": 1}],
                    "payment_method": "account",
                    "customer": {"customer_id": marta.id}
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let uri = format!("/admin/accounts/{}/payments", marta.id);
        let body = json!({"amount_cents": 20_000, "payment_method": "cash", "idempotency_key": "pay-1"});
        let response = send(&app, post_json(&uri, body.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let payment = body_json(response).await;
        assert_eq!(payment["amount_cents"], -20_000);

        // A retried submission is not posted twice.
        let retried = body_json(send(&app, post_json(&uri, body)).await).await;
        assert_eq!(retried["id"], payment["id"]);

        let reused = json!({"amount_cents": 25_000, "payment_method": "cash", "idempotency_key": "pay-1"});
        let response = send(&app, post_json(&uri, reused)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "CONFLICT");

        let detail = body_json(send(&app, get(&format!("/admin/accounts/{}", marta.id))).await).await;
        assert_eq!(detail["balance"]["balance_cents"], 30_000);
        let transactions = detail["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 2);
        let signed: i64 = transactions.iter().map(|t| t["amount_cents"].as_i64().unwrap()).sum();
        assert_eq!(signed, 30_000);

        let balances = body_json(send(&app, get("/admin/accounts")).await).await;
        assert_eq!(balances[0]["customer_name"], "Marta");

        let receipt_uri = format!(
            "/admin/accounts/transactions/{}/receipt",
            payment["id"].as_str().unwrap()
        );
        let response = send(&app, get(&receipt_uri)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let first = body_bytes(response).await;
        let second = body_bytes(send(&app, get(&receipt_uri)).await).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_charges_and_invalid_amounts() {
        let (app, state, _) = test_app().await;
        let luis = customer(&state, "Luis").await;

        let response = send(
            &app,
            post_json(
                &format!("/admin/accounts/{}/charges", luis.id),
                json!({"amount_cents": 12_500, "description": "Arreglo de ruedo"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["type"], "sale");

        let response = send(
            &app,
            post_json(
                &format!("/admin/accounts/{}/payments", luis.id),
                json!({"amount_cents": 0, "payment_method": "cash"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            post_json(
                "/admin/accounts/missing/payments",
                json!({"amount_cents": 100, "payment_method": "cash"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let detail = body_json(send(&app, get(&format!("/admin/accounts/{}", luis.id))).await).await;
        assert_eq!(detail["balance"]["balance_cents"], 12_500);
    }
}
