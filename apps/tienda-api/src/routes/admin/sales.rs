//! Register sales.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::png_response;
use crate::state::AppState;
use tienda_core::LocalSale;
use tienda_db::PosSaleRequest;

/// Completes a sale at the register. Account sales also post the debit
/// on the customer's tab.
pub async fn complete(
    State(state): State<AppState>,
    Json(request): Json<PosSaleRequest>,
) -> Result<(StatusCode, Json<LocalSale>), ApiError> {
    let sale = state.db.sales().complete_pos_sale(&request, &state.store).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<LocalSale>>, ApiError> {
    let sales = state
        .db
        .sales()
        .list(query.customer_id.as_deref(), query.limit.unwrap_or(50))
        .await?;
    Ok(Json(sales))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LocalSale>, ApiError> {
    state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

pub async fn receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let receipt = state.db.receipts().for_sale(&id, &state.store).await?;
    png_response(&receipt)
}
