//! Catalog maintenance.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use tienda_core::{Product, ProductDetail, ProductVariant};
use tienda_db::{NewProduct, NewVariant, ProductFilter};

/// Unlike the storefront listing, honours `include_inactive`.
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.db.products().list(&filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.db.products().insert(&input).await?;
    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetail>, ApiError> {
    state
        .db
        .products()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewProduct>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.db.products().update(&id, &input).await?))
}

/// Deactivates the product; sales history keeps pointing at it.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.products().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_variant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewVariant>,
) -> Result<(StatusCode, Json<ProductVariant>), ApiError> {
    let variant = state.db.products().add_variant(&id, &input).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn update_variant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewVariant>,
) -> Result<Json<ProductVariant>, ApiError> {
    Ok(Json(state.db.products().update_variant(&id, &input).await?))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.products().categories().await?))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_json, delete, get, post_json, put_json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_product_lifecycle() {
        let (app, _state, _) = test_app().await;

        let response = send(
            &app,
            post_json(
                "/admin/products",
                json!({"name": "Campera", "sku": "CAM-001", "category": "Abrigos", "price_cents": 45_000}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let product = body_json(response).await;
        let id = product["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            post_json(
                &format!("/admin/products/{id}/variants"),
                json!({"sku": "CAM-001", "size": "M", "stock": 4}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let variant = body_json(response).await;
        let variant_id = variant["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            put_json(
                &format!("/admin/variants/{variant_id}"),
                json!({"sku": "CAM-001", "size": "M", "color": "Negro", "stock": 99}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["color"], "Negro");

        let detail = body_json(send(&app, get(&format!("/admin/products/{id}"))).await).await;
        assert_eq!(detail["stock"], 4);
        assert_eq!(detail["variants"].as_array().unwrap().len(), 1);

        let categories = body_json(send(&app, get("/admin/categories")).await).await;
        assert_eq!(categories, json!(["Abrigos"]));

        let response = send(&app, delete(&format!("/admin/products/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let visible = body_json(send(&app, get("/admin/products")).await).await;
        assert!(visible.as_array().unwrap().is_empty());
        let all = body_json(send(&app, get("/admin/products?include_inactive=true")).await).await;
        assert_eq!(all[0]["is_active"], false);
    }

    #[tokio::test]
    async fn test_invalid_product_is_rejected() {
        let (app, _state, _) = test_app().await;
        let response = send(
            &app,
            post_json("/admin/products", json!({"name": "", "price_cents": 100})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
}
