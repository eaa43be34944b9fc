//! Customer records.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::Customer;
use tienda_db::NewCustomer;

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    /// Matches name or email.
    pub search: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.db.customers().list(query.search.as_deref()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.db.customers().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Customer", &id))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewCustomer>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.db.customers().update(&id, &input).await?))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_json, get, post_json, put_json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_customer_records() {
        let (app, _state, _) = test_app().await;

        let response = send(
            &app,
            post_json("/admin/customers", json!({"name": "Marta Díaz", "email": "Marta@Example.com"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let marta = body_json(response).await;
        assert_eq!(marta["email"], "marta@example.com");
        let id = marta["id"].as_str().unwrap().to_string();

        send(&app, post_json("/admin/customers", json!({"name": "Luis Pérez"}))).await;

        let found = body_json(send(&app, get("/admin/customers?search=Marta")).await).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        let all = body_json(send(&app, get("/admin/customers")).await).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let response = send(
            &app,
            put_json(&format!("/admin/customers/{id}"), json!({"name": "Marta Díaz", "phone": "341-555"})),
        )
        .await;
        assert_eq!(body_json(response).await["phone"], "341-555");

        let response = send(
            &app,
            post_json("/admin/customers", json!({"name": "Sin Mail", "email": "no-es-mail"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, get("/admin/customers/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
