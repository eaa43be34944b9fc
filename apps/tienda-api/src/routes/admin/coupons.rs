//! Coupon maintenance.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::Coupon;
use tienda_db::NewCoupon;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.db.coupons().list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    let coupon = state.db.coupons().create(&input).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewCoupon>,
) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(state.db.coupons().update(&id, &input).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub is_active: bool,
}

pub async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActiveBody>,
) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(state.db.coupons().set_active(&id, body.is_active).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.coupons().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_json, delete, get, post_json, put_json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_coupon_crud() {
        let (app, _state, _) = test_app().await;
        let coupon = json!({
            "code": "otono",
            "discount_type": "fixed",
            "discount_value": 2_000,
            "min_purchase_cents": 10_000
        });

        let response = send(&app, post_json("/admin/coupons", coupon.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["code"], "OTONO");
        assert_eq!(created["is_active"], true);
        let id = created["id"].as_str().unwrap().to_string();

        let response = send(&app, post_json("/admin/coupons", coupon)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "CONFLICT");

        let response = send(
            &app,
            put_json(&format!("/admin/coupons/{id}/active"), json!({"is_active": false})),
        )
        .await;
        assert_eq!(body_json(response).await["is_active"], false);

        // Deactivated coupons are rejected at the storefront.
        let response = send(
            &app,
            post_json("/api/coupons/validate", json!({"code": "OTONO", "subtotal_cents": 20_000})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = send(
            &app,
            put_json(
                &format!("/admin/coupons/{id}"),
                json!({"code": "OTONO", "discount_type": "percentage", "discount_value": 1_500}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["discount_type"], "percentage");

        let response = send(&app, delete(&format!("/admin/coupons/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let remaining = body_json(send(&app, get("/admin/coupons")).await).await;
        assert!(remaining.as_array().unwrap().is_empty());

        let response = send(&app, delete(&format!("/admin/coupons/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
