//! Stock corrections, returns and movement history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::InventoryHistory;
use tienda_db::{ReturnRequest, StockAdjustment};

pub async fn adjust(
    State(state): State<AppState>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<(StatusCode, Json<InventoryHistory>), ApiError> {
    let movement = state.db.inventory().adjust_stock(&adjustment).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Looks the garment up by SKU and size; exactly one match is required.
pub async fn process_return(
    State(state): State<AppState>,
    Json(request): Json<ReturnRequest>,
) -> Result<(StatusCode, Json<InventoryHistory>), ApiError> {
    let movement = state.db.inventory().process_return(&request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<InventoryHistory>>, ApiError> {
    let movements = state
        .db
        .inventory()
        .history(&product_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(movements))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{
        body_json, get, post_json, product, product_with_sizes, send, stock_of, test_app,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_return_by_sku_and_size() {
        let (app, state, _) = test_app().await;
        let (jean, variants) =
            product_with_sizes(&state, "Jean", "JEA-001", 60_000, &[("38", 2), ("40", 0)]).await;

        let response = send(
            &app,
            post_json(
                "/admin/inventory/returns",
                json!({"sku": "JEA-001", "size": "40", "quantity": 1, "reason": "Cambio de talle"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let movement = body_json(response).await;
        assert_eq!(movement["change_type"], "return");
        assert_eq!(movement["variant_id"], variants[1].id.as_str());
        assert_eq!(movement["previous_stock"], 0);
        assert_eq!(movement["stock_after"], 1);
        assert_eq!(stock_of(&state, &jean.id).await, 3);

        // A sized SKU needs the size.
        let response = send(
            &app,
            post_json("/admin/inventory/returns", json!({"sku": "JEA-001", "quantity": 1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "BUSINESS_LOGIC");

        let history = body_json(
            send(&app, get(&format!("/admin/inventory/{}/history?limit=10", jean.id))).await,
        )
        .await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["reason"], "Cambio de talle");
    }

    #[tokio::test]
    async fn test_adjustment_never_goes_negative() {
        let (app, state, _) = test_app().await;
        let gorra = product(&state, "Gorra", "GOR-001", 8_000, 2).await;

        let response = send(
            &app,
            post_json("/admin/inventory/adjustments", json!({"product_id": gorra.id, "delta": -3})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(stock_of(&state, &gorra.id).await, 2);

        let response = send(
            &app,
            post_json("/admin/inventory/adjustments", json!({"product_id": gorra.id, "delta": 5})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let movement = body_json(response).await;
        assert_eq!(movement["reason"], "Manual adjustment");
        assert_eq!(movement["stock_after"], 7);

        let response = send(
            &app,
            post_json("/admin/inventory/adjustments", json!({"product_id": gorra.id, "delta": 0})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
