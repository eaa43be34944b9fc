//! # Inventory Repository
//!
//! Manual stock adjustments, returns by printed SKU/size, and the audit
//! history every stock movement leaves behind.
//!
//! ## Return Lookup
//! ```text
//! sku + size from the garment tag
//!      │
//!      ├── variants whose sku (or parent's sku) and size match
//!      └── variant-less products whose sku and size match
//!      │
//!      ├── exactly 1 ──► stock + qty, `return` history row
//!      └── 0 or 2+   ──► ReturnLookup error, nothing touched
//! ```
//!
//! Out-of-stock rows are candidates too: returning the last unit sold is
//! the common case.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::stock::{self, StockTarget};
use tienda_core::validation::validate_note;
use tienda_core::{
    ChangeType, CoreError, InventoryHistory, ValidationError, DEFAULT_ADJUSTMENT_REASON,
};

const HISTORY_COLUMNS: &str = r#"
    id, product_id, variant_id, change_type, quantity_change,
    previous_stock, stock_after, reason, created_at
"#;

/// A manual stock correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: String,
    /// Required for products with variants.
    pub variant_id: Option<String>,
    /// Signed change; never zero.
    pub delta: i64,
    pub reason: Option<String>,
}

/// A garment brought back to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub sku: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub reason: Option<String>,
}

fn reason_or<'a>(reason: Option<&'a str>, default: &'a str) -> &'a str {
    reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(default)
}

async fn fetch_history(conn: &mut SqliteConnection, id: &str) -> DbResult<InventoryHistory> {
    let sql = format!("SELECT {HISTORY_COLUMNS} FROM inventory_history WHERE id = ?1");
    sqlx::query_as::<_, InventoryHistory>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Inventory history", id))
}

/// Finds the single variant or variant-less product a tag refers to.
async fn find_return_target(
    conn: &mut SqliteConnection,
    sku: &str,
    size: Option<&str>,
) -> DbResult<StockTarget> {
    let matches: Vec<(String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT v.product_id, v.id
        FROM product_variants v
        JOIN products p ON p.id = v.product_id
        WHERE COALESCE(v.sku, p.sku) = ?1 AND v.size IS ?2
        UNION ALL
        SELECT p.id, NULL
        FROM products p
        WHERE p.sku = ?1 AND p.size IS ?2
          AND NOT EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id)
        "#,
    )
    .bind(sku)
    .bind(size)
    .fetch_all(&mut *conn)
    .await?;

    match matches.as_slice() {
        [(product_id, variant_id)] => {
            stock::resolve_target(&mut *conn, product_id, variant_id.as_deref(), size).await
        }
        _ => Err(CoreError::ReturnLookup {
            sku: sku.to_string(),
            size: size.unwrap_or("-").to_string(),
            matches: matches.len(),
        }
        .into()),
    }
}

/// Repository for stock corrections, returns and history.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Applies a manual correction.
    ///
    /// ## Errors
    /// - `NegativeStock` if the result would be below zero
    /// - `VariantNotFound` if the product has variants and none is named
    pub async fn adjust_stock(&self, adjustment: &StockAdjustment) -> DbResult<InventoryHistory> {
        if adjustment.delta == 0 {
            return Err(CoreError::from(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            })
            .into());
        }
        validate_note("reason", adjustment.reason.as_deref()).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;

        let target = stock::resolve_target(
            &mut *tx,
            &adjustment.product_id,
            adjustment.variant_id.as_deref(),
            None,
        )
        .await?;

        let current = stock::current_stock(&mut *tx, &target).await?;
        let resulting = current + adjustment.delta;
        if resulting < 0 {
            return Err(CoreError::NegativeStock {
                current,
                delta: adjustment.delta,
                resulting,
            }
            .into());
        }

        let reason = reason_or(adjustment.reason.as_deref(), DEFAULT_ADJUSTMENT_REASON);
        let movement = stock::apply_delta(
            &mut *tx,
            &target,
            adjustment.delta,
            ChangeType::ManualAdjustment,
            reason,
        )
        .await?;
        let history = fetch_history(&mut *tx, &movement.history_id).await?;
        tx.commit().await?;

        info!(
            item = %target.label,
            delta = adjustment.delta,
            stock_after = movement.stock_after,
            reason,
            "Stock adjusted"
        );
        Ok(history)
    }

    /// Puts returned units back on the shelf.
    ///
    /// ## Errors
    /// - `ReturnLookup` unless exactly one row matches the SKU and size
    pub async fn process_return(&self, request: &ReturnRequest) -> DbResult<InventoryHistory> {
        if request.quantity <= 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            })
            .into());
        }
        validate_note("reason", request.reason.as_deref()).map_err(CoreError::from)?;

        let sku = request.sku.trim();
        let size = request.size.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut tx = begin_write(&self.pool).await?;
        let target = find_return_target(&mut *tx, sku, size).await?;

        let reason = reason_or(request.reason.as_deref(), "Devolución");
        let movement = stock::apply_delta(
            &mut *tx,
            &target,
            request.quantity,
            ChangeType::Return,
            reason,
        )
        .await?;
        let history = fetch_history(&mut *tx, &movement.history_id).await?;
        tx.commit().await?;

        info!(
            item = %target.label,
            quantity = request.quantity,
            previous_stock = movement.previous_stock,
            "Return processed"
        );
        Ok(history)
    }

    /// Movements of one product (all its variants included), newest first.
    pub async fn history(&self, product_id: &str, limit: u32) -> DbResult<Vec<InventoryHistory>> {
        let sql = format!(
            r#"
            SELECT {HISTORY_COLUMNS} FROM inventory_history
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#
        );
        let rows = sqlx::query_as::<_, InventoryHistory>(&sql)
            .bind(product_id)
            .bind(limit.min(500) as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{file_db, product, product_with_variants, stock_of, test_db};
    use tokio::task::JoinSet;

    fn return_of(sku: &str, size: &str, quantity: i64) -> ReturnRequest {
        ReturnRequest {
            sku: sku.to_string(),
            size: Some(size.to_string()),
            quantity,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_return_of_sold_out_variant() {
        let db = test_db().await;
        let (remera, variants) =
            product_with_variants(&db, "Remera", "REM-001", 10_000, &[("S", 4), ("M", 0)]).await;

        let history = db
            .inventory()
            .process_return(&return_of("REM-001", "M", 2))
            .await
            .unwrap();

        assert_eq!(history.change_type, ChangeType::Return);
        assert_eq!(history.quantity_change, 2);
        assert_eq!(history.previous_stock, 0);
        assert_eq!(history.stock_after, 2);
        assert_eq!(history.variant_id.as_deref(), Some(variants[1].id.as_str()));

        assert_eq!(stock_of(&db, &remera.id, Some(&variants[1].id)).await, 2);
        assert_eq!(stock_of(&db, &remera.id, None).await, 6);

        let rows = db.inventory().history(&remera.id, 50).await.unwrap();
        let returns: Vec<_> = rows
            .iter()
            .filter(|h| h.change_type == ChangeType::Return)
            .collect();
        assert_eq!(returns.len(), 1);
    }

    #[tokio::test]
    async fn test_return_lookup_must_be_unique() {
        let db = test_db().await;
        product(&db, "Jean Azul", "JEA-001", Some("42"), 30_000, 1).await;
        product(&db, "Jean Azul (duplicado)", "JEA-001", Some("42"), 30_000, 1).await;

        let err = db
            .inventory()
            .process_return(&return_of("JEA-001", "42", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ReturnLookup { matches: 2, .. })
        ));

        let err = db
            .inventory()
            .process_return(&return_of("NOPE-1", "M", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ReturnLookup { matches: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_adjustment_rejects_negative_result() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 3).await;

        let err = db
            .inventory()
            .adjust_stock(&StockAdjustment {
                product_id: remera.id.clone(),
                variant_id: None,
                delta: -4,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NegativeStock {
                current: 3,
                resulting: -1,
                ..
            })
        ));
        assert_eq!(stock_of(&db, &remera.id, None).await, 3);

        let history = db
            .inventory()
            .adjust_stock(&StockAdjustment {
                product_id: remera.id.clone(),
                variant_id: None,
                delta: -3,
                reason: Some("  ".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(history.reason, DEFAULT_ADJUSTMENT_REASON);
        assert_eq!(history.stock_after, 0);
        assert_eq!(history.change_type, ChangeType::ManualAdjustment);
    }

    #[tokio::test]
    async fn test_adjustment_on_variant_updates_product_total() {
        let db = test_db().await;
        let (buzo, variants) =
            product_with_variants(&db, "Buzo", "BUZ-001", 20_000, &[("M", 1), ("L", 1)]).await;

        let err = db
            .inventory()
            .adjust_stock(&StockAdjustment {
                product_id: buzo.id.clone(),
                variant_id: None,
                delta: 5,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::VariantNotFound(_))));

        db.inventory()
            .adjust_stock(&StockAdjustment {
                product_id: buzo.id.clone(),
                variant_id: Some(variants[0].id.clone()),
                delta: 5,
                reason: Some("Recuento".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &buzo.id, Some(&variants[0].id)).await, 6);
        assert_eq!(stock_of(&db, &buzo.id, None).await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let gorra = product(&db, "Gorra", "GOR-001", None, 8_000, 0).await;

        let mut terminals = JoinSet::new();
        for _ in 0..16 {
            let inventory = db.inventory();
            let adjustment = StockAdjustment {
                product_id: gorra.id.clone(),
                variant_id: None,
                delta: 1,
                reason: None,
            };
            terminals.spawn(async move { inventory.adjust_stock(&adjustment).await });
        }

        let mut applied = 0;
        while let Some(result) = terminals.join_next().await {
            result.unwrap().unwrap();
            applied += 1;
        }

        assert_eq!(applied, 16);
        assert_eq!(stock_of(&db, &gorra.id, None).await, 16);
        let history = db.inventory().history(&gorra.id, 50).await.unwrap();
        assert_eq!(history.len(), 16);
    }
}
