//! Online order management.
//!
//! ```text
//! pending ──► confirmed ──► shipped ──► delivered
//!    │            │
//!    └────────────┴──► cancelled (stock returned if it was taken)
//! ```

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::{Order, OrderStatus};
use tienda_db::{CancelOutcome, OrderFilter};

/// `?attention=true` lists paid orders whose fulfillment failed.
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.db.orders().list(&filter).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state
        .db
        .orders()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order", &id))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub order: Order,
    /// True when the order was already cancelled and nothing changed.
    pub already_cancelled: bool,
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancelResponse>, ApiError> {
    let outcome = state.db.orders().cancel_order(&id, body.reason.as_deref()).await?;
    let already_cancelled = matches!(outcome, CancelOutcome::AlreadyCancelled(_));
    Ok(Json(CancelResponse {
        order: outcome.into_order(),
        already_cancelled,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: OrderStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.db.orders().update_status(&id, body.status).await?))
}
