//! # Product Repository
//!
//! Catalog reads for the storefront and the register, plus admin CRUD for
//! products and their variants.
//!
//! ## Stock Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.stock                                                         │
//! │    • no variants  → authoritative count                                 │
//! │    • has variants → Σ product_variants.stock, recomputed in the same    │
//! │                     transaction as every variant write                  │
//! │                                                                         │
//! │  This repository sets stock only when a row is created. Every later     │
//! │  change goes through the inventory, sale and order workflows so it      │
//! │  leaves an inventory_history row.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::stock;
use tienda_core::validation::{validate_price_cents, validate_product_name, validate_sku};
use tienda_core::{CoreError, Money, Product, ProductDetail, ProductVariant, ValidationError};

const PRODUCT_COLUMNS: &str = r#"
    id, name, description, category, sku, size, color, material,
    price_cents, original_price_cents, image_url, images, stock,
    is_active, created_at, updated_at
"#;

const VARIANT_COLUMNS: &str = "id, product_id, sku, size, color, stock, created_at";

/// Row shape of `products`; `images` is a JSON array column.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    sku: Option<String>,
    size: Option<String>,
    color: Option<String>,
    material: Option<String>,
    price_cents: i64,
    original_price_cents: Option<i64>,
    image_url: Option<String>,
    images: Json<Vec<String>>,
    stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            sku: row.sku,
            size: row.size,
            color: row.color,
            material: row.material,
            price_cents: row.price_cents,
            original_price_cents: row.original_price_cents,
            image_url: row.image_url,
            images: row.images.0,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Catalog listing filter. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub in_stock_only: bool,
    pub limit: Option<u32>,
}

/// Admin product form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub price_cents: i64,
    pub original_price_cents: Option<i64>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Initial stock for products without variants.
    #[serde(default)]
    pub stock: i64,
}

impl NewProduct {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_product_name(&self.name)?;
        validate_price_cents(self.price_cents)?;
        if let Some(sku) = &self.sku {
            validate_sku(sku)?;
        }
        if self.stock < 0 {
            return Err(ValidationError::MustBePositive {
                field: "stock".to_string(),
            });
        }
        Ok(())
    }
}

/// Admin variant form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVariant {
    pub sku: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Initial stock.
    #[serde(default)]
    pub stock: i64,
}

/// Name and live price of an active product, read on the caller's
/// connection when a line is priced.
pub(crate) async fn live_price(conn: &mut SqliteConnection, product_id: &str) -> DbResult<(String, Money)> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT name, price_cents FROM products WHERE id = ?1 AND is_active = 1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (name, price_cents) =
        row.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
    Ok((name, Money::from_cents(price_cents)))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products ordered by name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let limit = filter.limit.unwrap_or(100).min(500);

        debug!(?search, category = ?filter.category, limit, "Listing products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR name LIKE '%' || ?2 || '%')
              AND (?3 = 1 OR is_active = 1)
              AND (?4 = 0 OR stock > 0)
            ORDER BY name
            LIMIT ?5
            "#
        );

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(&filter.category)
            .bind(search)
            .bind(filter.include_inactive)
            .bind(filter.in_stock_only)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Gets a product by ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    /// Gets a product with its variants.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<ProductDetail>> {
        let Some(product) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let variants = self.variants(id).await?;
        Ok(Some(ProductDetail { product, variants }))
    }

    /// Variants of a product, ordered by size.
    pub async fn variants(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ?1 ORDER BY size, color"
        );
        let variants = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(variants)
    }

    pub async fn get_variant(&self, variant_id: &str) -> DbResult<Option<ProductVariant>> {
        let sql = format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = ?1");
        let variant = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(variant)
    }

    /// Creates a product.
    pub async fn insert(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate().map_err(CoreError::from)?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(id = %id, name = %input.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, sku, size, color, material,
                price_cents, original_price_cents, image_url, images, stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.sku)
        .bind(&input.size)
        .bind(&input.color)
        .bind(&input.material)
        .bind(input.price_cents)
        .bind(input.original_price_cents)
        .bind(&input.image_url)
        .bind(Json(&input.images))
        .bind(input.stock)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(id = %id, name = %input.name, "Product created");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Updates product details. `input.stock` is ignored; a product with
    /// variants has its stock recomputed from them.
    pub async fn update(&self, id: &str, input: &NewProduct) -> DbResult<Product> {
        input.validate().map_err(CoreError::from)?;

        debug!(id = %id, "Updating product");

        let mut tx = begin_write(&self.pool).await?;
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2, description = ?3, category = ?4, sku = ?5, size = ?6,
                color = ?7, material = ?8, price_cents = ?9, original_price_cents = ?10,
                image_url = ?11, images = ?12, updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.sku)
        .bind(&input.size)
        .bind(&input.color)
        .bind(&input.material)
        .bind(input.price_cents)
        .bind(input.original_price_cents)
        .bind(&input.image_url)
        .bind(Json(&input.images))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        stock::sync_product_stock(&mut *tx, id).await?;
        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Adds a variant and recomputes the product's stock.
    pub async fn add_variant(&self, product_id: &str, input: &NewVariant) -> DbResult<ProductVariant> {
        if input.stock < 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "stock".to_string(),
            })
            .into());
        }
        if let Some(sku) = &input.sku {
            validate_sku(sku).map_err(CoreError::from)?;
        }

        let id = Uuid::new_v4().to_string();
        let mut tx = begin_write(&self.pool).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, sku, size, color, stock, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(&input.sku)
        .bind(&input.size)
        .bind(&input.color)
        .bind(input.stock)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        stock::sync_product_stock(&mut *tx, product_id).await?;
        tx.commit().await?;

        info!(product_id = %product_id, variant_id = %id, "Variant created");

        self.get_variant(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", id))
    }

    /// Updates variant labels (sku, size, color). Stock is left untouched.
    pub async fn update_variant(&self, variant_id: &str, input: &NewVariant) -> DbResult<ProductVariant> {
        if let Some(sku) = &input.sku {
            validate_sku(sku).map_err(CoreError::from)?;
        }

        let result = sqlx::query(
            "UPDATE product_variants SET sku = ?2, size = ?3, color = ?4 WHERE id = ?1",
        )
        .bind(variant_id)
        .bind(&input.sku)
        .bind(&input.size)
        .bind(&input.color)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", variant_id));
        }

        self.get_variant(variant_id)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", variant_id))
    }

    /// Hides a product from the catalog. Historical sales keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Distinct categories of active products.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories = sqlx::query_scalar(
            r#"
            SELECT DISTINCT category FROM products
            WHERE is_active = 1 AND category IS NOT NULL
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

// =============================================================================
// Tests
// =============================================================================
