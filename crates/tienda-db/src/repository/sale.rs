//! # Sale Repository
//!
//! Register (point-of-sale) sales.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  complete_pos_sale(request)                 ONE transaction             │
//! │                                                                         │
//! │  1. idempotency key seen?  ──► return the stored sale, write nothing    │
//! │  2. allocate V-000042                                                   │
//! │  3. per line:                                                           │
//! │       resolve variant (explicit id, or unique size match)               │
//! │       read live price, price the line                                   │
//! │       checked decrement + local_sale history row                        │
//! │  4. totals = Σ line subtotals − general %                               │
//! │  5. INSERT local_sales                                                  │
//! │  6. payment_method = account ──► ledger sale debit + receipt snapshot   │
//! │  7. COMMIT                                                              │
//! │                                                                         │
//! │  Any failure in 2-6 rolls everything back: no stock moved, no number    │
//! │  burned, no ledger row.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::ledger::{self, LedgerEntry};
use crate::repository::{product, sequences, stock};
use tienda_core::pricing::{compute_totals, price_line, validate_line_count, LineInput};
use tienda_core::receipt::{ReceiptData, StoreProfile};
use tienda_core::validation::validate_note;
use tienda_core::{
    ChangeType, CoreError, LocalSale, PaymentMethod, Percentage, SaleCustomer, SaleLine,
    TransactionType, ValidationError,
};

const SALE_COLUMNS: &str = r#"
    id, sale_number, customer_id, customer_name, customer_email, customer_phone,
    items, subtotal_cents, discount_cents, general_discount_bps, total_cents,
    payment_method, notes, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    sale_number: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    items: Json<Vec<SaleLine>>,
    subtotal_cents: i64,
    discount_cents: i64,
    general_discount_bps: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for LocalSale {
    type Error = DbError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let bps = u32::try_from(row.general_discount_bps)
            .map_err(|err| DbError::corrupt("general_discount_bps", err))?;

        Ok(LocalSale {
            id: row.id,
            sale_number: row.sale_number,
            customer: SaleCustomer {
                customer_id: row.customer_id,
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            items: row.items.0,
            subtotal_cents: row.subtotal_cents,
            discount_cents: row.discount_cents,
            general_discount: Percentage::from_bps(bps),
            total_cents: row.total_cents,
            payment_method: row.payment_method,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// One line as entered at the register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosLine {
    pub product_id: String,
    /// Explicit variant; otherwise the size picks one.
    pub variant_id: Option<String>,
    pub size: Option<String>,
    pub quantity: i64,
    /// Per-line discount.
    pub discount: Option<Percentage>,
}

/// A register sale as submitted by the cashier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosSaleRequest {
    pub lines: Vec<PosLine>,
    /// Applied to the sum of line subtotals.
    #[serde(default)]
    pub general_discount: Percentage,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer: SaleCustomer,
    pub notes: Option<String>,
    /// A repeated key returns the original sale.
    pub idempotency_key: Option<String>,
}

impl PosSaleRequest {
    fn validate(&self) -> Result<(), CoreError> {
        validate_line_count(self.lines.len())?;
        if self.general_discount > Percentage::FULL {
            return Err(ValidationError::OutOfRange {
                field: "general_discount".to_string(),
                min: 0,
                max: Percentage::FULL.bps() as i64,
            }
            .into());
        }
        validate_note("notes", self.notes.as_deref())?;
        if self.payment_method == PaymentMethod::Account && self.customer.customer_id.is_none() {
            return Err(CoreError::AccountSaleWithoutCustomer);
        }
        Ok(())
    }

    /// Whether `sale` is what this request would have produced, judged on
    /// what the cashier entered. Prices are not compared; they may have
    /// changed since.
    fn describes(&self, sale: &LocalSale) -> bool {
        let same_line = |line: &PosLine, stored: &SaleLine| {
            line.product_id == stored.product_id
                && line.quantity == stored.quantity
                && line.discount.filter(|rate| !rate.is_zero()) == stored.discount
                && line.variant_id.as_ref().map_or(true, |id| stored.variant_id.as_ref() == Some(id))
                && line.size.as_ref().map_or(true, |size| stored.size.as_ref() == Some(size))
        };

        self.payment_method == sale.payment_method
            && self.general_discount == sale.general_discount
            && self.customer.customer_id == sale.customer.customer_id
            && self.lines.len() == sale.items.len()
            && self.lines.iter().zip(&sale.items).all(|(line, stored)| same_line(line, stored))
    }
}

pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<LocalSale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM local_sales WHERE id = ?1");
    let row: Option<SaleRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(LocalSale::try_from).transpose()
}

async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> DbResult<Option<LocalSale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM local_sales WHERE idempotency_key = ?1");
    let row: Option<SaleRow> = sqlx::query_as(&sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(LocalSale::try_from).transpose()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for register sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Completes a register sale.
    ///
    /// ## Errors
    /// - `InsufficientStock` if any line asks for more than is on hand
    /// - `VariantNotFound` if a line on a product with variants names no
    ///   variant and its size matches none (or several)
    /// - `AccountSaleWithoutCustomer` for an account sale with no customer
    pub async fn complete_pos_sale(
        &self,
        request: &PosSaleRequest,
        store: &StoreProfile,
    ) -> DbResult<LocalSale> {
        request.validate()?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = find_by_idempotency_key(&mut *tx, key).await? {
                if !request.describes(&existing) {
                    warn!(key, sale_number = %existing.sale_number, "Idempotency key reused for a different sale");
                    return Err(DbError::duplicate("idempotency_key", key));
                }
                debug!(key, sale_number = %existing.sale_number, "Sale already completed");
                return Ok(existing);
            }
        }

        let mut customer = request.customer.clone();
        let registered = match customer.customer_id.as_deref() {
            Some(id) => {
                let registered = ledger::find_customer(&mut *tx, id).await?;
                customer.name.get_or_insert_with(|| registered.name.clone());
                if customer.email.is_none() {
                    customer.email = registered.email.clone();
                }
                if customer.phone.is_none() {
                    customer.phone = registered.phone.clone();
                }
                Some(registered)
            }
            None => None,
        };

        let number = sequences::next_value(&mut *tx, sequences::LOCAL_SALE).await?;
        let sale_number = sequences::format_number("V", number);
        let reason = format!("Venta {}", sale_number);

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let target = stock::resolve_target(
                &mut *tx,
                &line.product_id,
                line.variant_id.as_deref(),
                line.size.as_deref(),
            )
            .await?;
            let (name, unit_price) = product::live_price(&mut *tx, &line.product_id).await?;

            let priced = price_line(LineInput {
                product_id: target.product_id.clone(),
                variant_id: target.variant_id.clone(),
                name,
                size: target.size.clone(),
                quantity: line.quantity,
                unit_price,
                discount: line.discount,
            })?;

            stock::apply_delta(&mut *tx, &target, -line.quantity, ChangeType::LocalSale, &reason)
                .await?;
            items.push(priced);
        }

        let totals = compute_totals(&items, request.general_discount);
        let sale = LocalSale {
            id: Uuid::new_v4().to_string(),
            sale_number,
            customer,
            items,
            subtotal_cents: totals.gross_subtotal.cents(),
            discount_cents: totals.discount_total().cents(),
            general_discount: request.general_discount,
            total_cents: totals.total.cents(),
            payment_method: request.payment_method,
            notes: request.notes.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO local_sales (
                id, sale_number, customer_id, customer_name, customer_email, customer_phone,
                items, subtotal_cents, discount_cents, general_discount_bps, total_cents,
                payment_method, notes, idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.customer.customer_id)
        .bind(&sale.customer.name)
        .bind(&sale.customer.email)
        .bind(&sale.customer.phone)
        .bind(Json(&sale.items))
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.general_discount.bps() as i64)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(&sale.notes)
        .bind(request.idempotency_key.as_deref())
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        if let (PaymentMethod::Account, Some(registered)) = (sale.payment_method, &registered) {
            if sale.total().is_positive() {
                let receipt = ReceiptData::for_sale(&sale, store);
                ledger::insert_transaction(
                    &mut *tx,
                    LedgerEntry {
                        customer_id: &registered.id,
                        kind: TransactionType::Sale,
                        amount: sale.total(),
                        description: format!("Venta {}", sale.sale_number),
                        payment_method: Some(PaymentMethod::Account),
                        sale_id: Some(&sale.id),
                        idempotency_key: None,
                    },
                    |_| receipt,
                )
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            sale_number = %sale.sale_number,
            total = %sale.total(),
            lines = sale.items.len(),
            method = ?sale.payment_method,
            "Register sale completed"
        );
        Ok(sale)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<LocalSale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<LocalSale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM local_sales WHERE sale_number = ?1");
        let row: Option<SaleRow> = sqlx::query_as(&sql)
            .bind(sale_number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LocalSale::try_from).transpose()
    }

    /// Sales newest first, optionally only those of one customer.
    pub async fn list(&self, customer_id: Option<&str>, limit: u32) -> DbResult<Vec<LocalSale>> {
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS} FROM local_sales
            WHERE ?1 IS NULL OR customer_id = ?1
            ORDER BY created_at DESC, sale_number DESC
            LIMIT ?2
            "#
        );
        let rows: Vec<SaleRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .bind(limit.min(500) as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LocalSale::try_from).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
