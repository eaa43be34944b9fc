//! # Stock Mutations
//!
//! The only code that writes `stock` columns. Every function takes the
//! caller's open transaction connection; nothing here commits.
//!
//! ## Checked Delta
//! ```text
//! UPDATE product_variants
//!    SET stock = stock + :delta
//!  WHERE id = :id AND stock + :delta >= 0
//! RETURNING stock
//!      │
//!      ├── 1 row  ──► recompute products.stock = Σ variants
//!      │              INSERT inventory_history
//!      │
//!      └── 0 rows ──► InsufficientStock (nothing written)
//! ```
//!
//! The condition and the write are one statement, so two registers selling
//! the last unit cannot both succeed, and stock never goes negative.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::{ChangeType, CoreError};

/// The row whose stock a line moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StockTarget {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Size sold or returned: the variant's, else the product's.
    pub size: Option<String>,
    /// `Remera Lisa (M)`, used in error messages.
    pub label: String,
}

/// Result of one stock write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StockMovement {
    /// The `inventory_history` row written for it.
    pub history_id: String,
    pub previous_stock: i64,
    pub stock_after: i64,
}

/// Resolves which row a line moves.
///
/// - An explicit variant must belong to the product.
/// - A product with variants and no explicit variant is matched by size;
///   exactly one variant must match.
/// - A product without variants moves its own stock.
pub(crate) async fn resolve_target(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
    size: Option<&str>,
) -> DbResult<StockTarget> {
    let product: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT name, size FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (name, product_size) =
        product.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

    if let Some(variant_id) = variant_id {
        let variant_size: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT size FROM product_variants WHERE id = ?1 AND product_id = ?2",
        )
        .bind(variant_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        let (variant_size,) =
            variant_size.ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;

        return Ok(StockTarget {
            product_id: product_id.to_string(),
            variant_id: Some(variant_id.to_string()),
            label: label(&name, variant_size.as_deref()),
            size: variant_size,
        });
    }

    let variants: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT id, size FROM product_variants WHERE product_id = ?1")
            .bind(product_id)
            .fetch_all(&mut *conn)
            .await?;

    if variants.is_empty() {
        let size = product_size.or_else(|| size.map(str::to_string));
        return Ok(StockTarget {
            product_id: product_id.to_string(),
            variant_id: None,
            label: label(&name, size.as_deref()),
            size,
        });
    }

    let mut matching = variants
        .into_iter()
        .filter(|(_, variant_size)| size.is_some() && variant_size.as_deref() == size);
    match (matching.next(), matching.next()) {
        (Some((id, variant_size)), None) => Ok(StockTarget {
            product_id: product_id.to_string(),
            variant_id: Some(id),
            label: label(&name, variant_size.as_deref()),
            size: variant_size,
        }),
        _ => Err(CoreError::VariantNotFound(label(&name, size)).into()),
    }
}

fn label(name: &str, size: Option<&str>) -> String {
    match size {
        Some(size) => format!("{} ({})", name, size),
        None => name.to_string(),
    }
}

/// Current stock of the target row.
pub(crate) async fn current_stock(
    conn: &mut SqliteConnection,
    target: &StockTarget,
) -> DbResult<i64> {
    let stock: Option<i64> = match &target.variant_id {
        Some(variant_id) => {
            sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = ?1")
                .bind(variant_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                .bind(&target.product_id)
                .fetch_optional(&mut *conn)
                .await?
        }
    };
    stock.ok_or_else(|| DbError::not_found("Stock row", target.label.clone()))
}

/// Applies a signed delta to the target row and records it in the history.
///
/// Fails with `InsufficientStock` (and writes nothing) if the result would
/// be negative.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    target: &StockTarget,
    delta: i64,
    change_type: ChangeType,
    reason: &str,
) -> DbResult<StockMovement> {
    let now = Utc::now();

    let updated: Option<i64> = match &target.variant_id {
        Some(variant_id) => {
            sqlx::query_scalar(
                r#"
                UPDATE product_variants
                SET stock = stock + ?1
                WHERE id = ?2 AND stock + ?1 >= 0
                RETURNING stock
                "#,
            )
            .bind(delta)
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar(
                r#"
                UPDATE products
                SET stock = stock + ?1, updated_at = ?3
                WHERE id = ?2 AND stock + ?1 >= 0
                RETURNING stock
                "#,
            )
            .bind(delta)
            .bind(&target.product_id)
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    let stock_after = match updated {
        Some(stock) => stock,
        None => {
            let available = current_stock(conn, target).await?;
            return Err(CoreError::InsufficientStock {
                item: target.label.clone(),
                available,
                requested: -delta,
            }
            .into());
        }
    };

    if target.variant_id.is_some() {
        sync_product_stock(conn, &target.product_id).await?;
    }

    let movement = StockMovement {
        history_id: Uuid::new_v4().to_string(),
        previous_stock: stock_after - delta,
        stock_after,
    };

    sqlx::query(
        r#"
        INSERT INTO inventory_history (
            id, product_id, variant_id, change_type,
            quantity_change, previous_stock, stock_after, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.history_id)
    .bind(&target.product_id)
    .bind(&target.variant_id)
    .bind(change_type)
    .bind(delta)
    .bind(movement.previous_stock)
    .bind(movement.stock_after)
    .bind(reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %target.product_id,
        variant_id = ?target.variant_id,
        delta,
        stock_after,
        ?change_type,
        "Stock updated"
    );

    Ok(movement)
}

/// Recomputes `products.stock` as the sum of its variants.
pub(crate) async fn sync_product_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET stock = (
                SELECT COALESCE(SUM(stock), 0)
                FROM product_variants
                WHERE product_id = ?1
            ),
            updated_at = ?2
        WHERE id = ?1
          AND EXISTS (SELECT 1 FROM product_variants WHERE product_id = ?1)
        "#,
    )
    .bind(product_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
