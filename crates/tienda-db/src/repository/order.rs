//! # Order Repository
//!
//! Online checkout: pending orders, payment confirmation, cancellation and
//! the fulfillment status track.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_pending_order        live prices, availability check (no        │
//! │        │                     writes to stock), coupon evaluated         │
//! │        ▼                                                                │
//! │    pending ── processor approves ──► confirm_paid_order                 │
//! │        │                               ONE transaction:                 │
//! │        │                                 checked decrement per line     │
//! │        │                                 coupon used_count + 1          │
//! │        │                                 status = confirmed             │
//! │        │                                                                │
//! │        │      stock or coupon fails ──► ROLLBACK, then flag:            │
//! │        │                                 payment_status = approved      │
//! │        │                                 fulfillment_error = reason     │
//! │        │                                 (status stays pending, listed  │
//! │        │                                  as needing attention)         │
//! │        ▼                                                                │
//! │    cancelled ◄── cancel_order (stock restored only if it was taken)     │
//! │                                                                         │
//! │    confirmed ──► shipped ──► delivered        update_status             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Confirmation and cancellation are guarded by the current status, so a
//! repeated webhook or a double click is a no-op rather than a second stock
//! movement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::{coupon, product, sequences, stock};
use tienda_core::cart::CartItem;
use tienda_core::coupon::evaluate;
use tienda_core::pricing::{price_line, validate_line_count, LineInput, SaleTotals};
use tienda_core::validation::{validate_customer_name, validate_email, validate_note};
use tienda_core::{
    ChangeType, CoreError, Order, OrderCustomer, OrderStatus, PaymentStatus, SaleLine,
};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_name, customer_email, customer_phone,
    shipping_address, items, subtotal_cents, discount_cents, total_cents,
    coupon_code, status, payment_status, preference_id, payment_id,
    fulfillment_error, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    shipping_address: Option<String>,
    items: Json<Vec<SaleLine>>,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    coupon_code: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    preference_id: Option<String>,
    payment_id: Option<String>,
    fulfillment_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            order_number: row.order_number,
            customer: OrderCustomer {
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            shipping_address: row.shipping_address,
            items: row.items.0,
            subtotal_cents: row.subtotal_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            coupon_code: row.coupon_code,
            status: row.status,
            payment_status: row.payment_status,
            preference_id: row.preference_id,
            payment_id: row.payment_id,
            fulfillment_error: row.fulfillment_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Inputs and Outcomes
// =============================================================================

/// One line of a storefront checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub size: Option<String>,
    pub quantity: i64,
}

impl From<&CartItem> for CheckoutItem {
    fn from(item: &CartItem) -> Self {
        CheckoutItem {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            size: item.selected_size.clone(),
            quantity: item.quantity,
        }
    }
}

/// A storefront checkout. Prices are never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub customer: OrderCustomer,
    pub shipping_address: Option<String>,
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    fn validate(&self) -> Result<(), CoreError> {
        validate_line_count(self.items.len())?;
        validate_customer_name(&self.customer.name)?;
        validate_email(&self.customer.email)?;
        validate_note("shipping_address", self.shipping_address.as_deref())?;
        Ok(())
    }
}

/// Result of confirming a paid order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Stock was taken and the order confirmed by this call.
    Confirmed(Order),
    /// The order had already left `pending`; nothing was written.
    AlreadyProcessed(Order),
}

impl ConfirmOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ConfirmOutcome::Confirmed(order) | ConfirmOutcome::AlreadyProcessed(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            ConfirmOutcome::Confirmed(order) | ConfirmOutcome::AlreadyProcessed(order) => order,
        }
    }
}

/// Result of cancelling an order.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(Order),
    /// Already cancelled; nothing was written.
    AlreadyCancelled(Order),
}

impl CancelOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CancelOutcome::Cancelled(order) | CancelOutcome::AlreadyCancelled(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            CancelOutcome::Cancelled(order) | CancelOutcome::AlreadyCancelled(order) => order,
        }
    }
}

/// Admin order listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Only approved-but-unfulfilled orders.
    #[serde(default)]
    pub attention: bool,
    pub limit: Option<u32>,
}

// =============================================================================
// Connection-level helpers
// =============================================================================

const APPROVED_AFTER_CANCELLATION: &str = "Payment approved after the order was cancelled";

/// Whether an approval reported for `order` is one it has not recorded yet.
fn is_new_approval(order: &Order, payment_id: Option<&str>) -> bool {
    if order.payment_status != PaymentStatus::Approved {
        return true;
    }
    matches!((payment_id, order.payment_id.as_deref()), (Some(new), Some(old)) if new != old)
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Order::from)
        .ok_or_else(|| CoreError::OrderNotFound(id.to_string()).into())
}

/// Takes stock for every line and counts the coupon. Writes nothing to the
/// order row itself.
async fn take_stock(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    let reason = format!("Pedido {}", order.order_number);
    for item in &order.items {
        let target = stock::resolve_target(
            &mut *conn,
            &item.product_id,
            item.variant_id.as_deref(),
            item.size.as_deref(),
        )
        .await?;
        stock::apply_delta(&mut *conn, &target, -item.quantity, ChangeType::Sale, &reason).await?;
    }

    if let Some(code) = order.coupon_code.as_deref() {
        coupon::increment_usage(&mut *conn, code).await?;
    }
    Ok(())
}

async fn return_stock(conn: &mut SqliteConnection, order: &Order, reason: &str) -> DbResult<()> {
    for item in &order.items {
        let target = stock::resolve_target(
            &mut *conn,
            &item.product_id,
            item.variant_id.as_deref(),
            item.size.as_deref(),
        )
        .await?;
        stock::apply_delta(&mut *conn, &target, item.quantity, ChangeType::Cancellation, reason)
            .await?;
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for online orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Prices a checkout against the live catalog and records it as a
    /// pending order. Stock is checked but not taken.
    ///
    /// ## Errors
    /// - `InsufficientStock` if a line exceeds what is on hand right now
    /// - `CouponNotFound` / `CouponRejected` for an unusable code
    pub async fn create_pending_order(&self, request: &CheckoutRequest) -> DbResult<Order> {
        request.validate()?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let target = stock::resolve_target(
                &mut *tx,
                &item.product_id,
                item.variant_id.as_deref(),
                item.size.as_deref(),
            )
            .await?;
            let (name, unit_price) = product::live_price(&mut *tx, &item.product_id).await?;

            let line = price_line(LineInput {
                product_id: target.product_id.clone(),
                variant_id: target.variant_id.clone(),
                name,
                size: target.size.clone(),
                quantity: item.quantity,
                unit_price,
                discount: None,
            })?;

            let available = stock::current_stock(&mut *tx, &target).await?;
            if available < item.quantity {
                return Err(CoreError::InsufficientStock {
                    item: target.label,
                    available,
                    requested: item.quantity,
                }
                .into());
            }
            items.push(line);
        }

        let mut totals = SaleTotals::from_lines(&items);
        let mut coupon_code = None;
        if let Some(code) = request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
            let found = coupon::find_by_code(&mut *tx, code)
                .await?
                .ok_or_else(|| CoreError::CouponNotFound(code.trim().to_uppercase()))?;
            let discount = evaluate(&found, totals.net_subtotal, now)?;
            totals = totals.with_general_amount(discount);
            coupon_code = Some(found.code);
        }

        let number = sequences::next_value(&mut *tx, sequences::ORDER).await?;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: sequences::format_number("ORD", number),
            customer: OrderCustomer {
                name: request.customer.name.trim().to_string(),
                email: request.customer.email.trim().to_lowercase(),
                phone: request.customer.phone.clone(),
            },
            shipping_address: request.shipping_address.clone(),
            items,
            subtotal_cents: totals.gross_subtotal.cents(),
            discount_cents: totals.discount_total().cents(),
            total_cents: totals.total.cents(),
            coupon_code,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            preference_id: None,
            payment_id: None,
            fulfillment_error: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_name, customer_email, customer_phone,
                shipping_address, items, subtotal_cents, discount_cents, total_cents,
                coupon_code, status, payment_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(&order.shipping_address)
        .bind(Json(&order.items))
        .bind(order.subtotal_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.coupon_code)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            total_cents = order.total_cents,
            coupon = ?order.coupon_code,
            "Pending order created"
        );
        Ok(order)
    }

    /// Stores the processor's checkout preference for a pending order.
    pub async fn set_preference(&self, order_id: &str, preference_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET preference_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(preference_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        }
        Ok(())
    }

    /// Confirms an order whose payment the processor approved.
    ///
    /// Idempotent: an order that already left `pending` is returned as
    /// [`ConfirmOutcome::AlreadyProcessed`]. The one write on that path is a
    /// new approval landing on a cancelled order (the shopper retried with
    /// another card after a rejection): the payment is recorded and the
    /// order is flagged, since money was taken for goods nobody reserved.
    ///
    /// ## Errors
    /// If stock or the coupon cannot be taken, nothing is taken, the order is
    /// flagged as needing attention, and the business error is returned.
    pub async fn confirm_paid_order(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
    ) -> DbResult<ConfirmOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut *tx, order_id).await?;

        if order.status == OrderStatus::Cancelled && is_new_approval(&order, payment_id) {
            sqlx::query(
                r#"
                UPDATE orders SET
                    payment_status = 'approved', payment_id = COALESCE(?2, payment_id),
                    fulfillment_error = ?3, updated_at = ?4
                WHERE id = ?1 AND status = 'cancelled'
                "#,
            )
            .bind(order_id)
            .bind(payment_id)
            .bind(APPROVED_AFTER_CANCELLATION)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            let flagged = fetch_order(&mut *tx, order_id).await?;
            tx.commit().await?;

            error!(
                order_number = %flagged.order_number,
                payment_id = ?payment_id,
                "Payment approved for a cancelled order"
            );
            return Ok(ConfirmOutcome::AlreadyProcessed(flagged));
        }

        if order.status != OrderStatus::Pending {
            debug!(order_number = %order.order_number, status = %order.status, "Order already processed");
            return Ok(ConfirmOutcome::AlreadyProcessed(order));
        }

        match take_stock(&mut *tx, &order).await {
            Ok(()) => {}
            Err(DbError::Domain(err)) => {
                tx.rollback().await?;
                error!(
                    order_number = %order.order_number,
                    payment_id = ?payment_id,
                    error = %err,
                    "Payment approved but order could not be fulfilled"
                );
                self.flag_attention(order_id, payment_id, &err.to_string()).await?;
                return Err(DbError::Domain(err));
            }
            Err(err) => return Err(err),
        }

        sqlx::query(
            r#"
            UPDATE orders SET
                status = 'confirmed', payment_status = 'approved',
                payment_id = COALESCE(?2, payment_id), fulfillment_error = NULL,
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let confirmed = fetch_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        info!(
            order_number = %confirmed.order_number,
            payment_id = ?confirmed.payment_id,
            "Order confirmed"
        );
        Ok(ConfirmOutcome::Confirmed(confirmed))
    }

    /// Records an approved payment on an order that could not be fulfilled.
    async fn flag_attention(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        reason: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = 'approved', payment_id = COALESCE(?2, payment_id),
                fulfillment_error = ?3, updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reconciles an order with a payment status reported by the processor
    /// (webhook or return redirect).
    ///
    /// ```text
    /// approved            ──► confirm_paid_order
    /// rejected/cancelled  ──► cancel a pending order (no stock was taken)
    /// anything else       ──► record payment_status on a pending order
    /// ```
    pub async fn apply_payment_update(
        &self,
        order_id: &str,
        payment_id: &str,
        status: PaymentStatus,
    ) -> DbResult<Order> {
        if status == PaymentStatus::Approved {
            return Ok(self.confirm_paid_order(order_id, Some(payment_id)).await?.into_order());
        }

        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut *tx, order_id).await?;

        if order.status != OrderStatus::Pending || order.payment_status == PaymentStatus::Approved {
            warn!(
                order_number = %order.order_number,
                status = %order.status,
                payment_status = ?status,
                "Ignoring payment update for a settled order"
            );
            return Ok(order);
        }

        let next = if status.is_failed() {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Pending
        };

        sqlx::query(
            r#"
            UPDATE orders SET status = ?2, payment_status = ?3, payment_id = ?4, updated_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(next)
        .bind(status)
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let updated = fetch_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        info!(
            order_number = %updated.order_number,
            status = %updated.status,
            payment_status = ?updated.payment_status,
            "Payment update applied"
        );
        Ok(updated)
    }

    /// Cancels a pending or confirmed order, returning taken stock.
    ///
    /// ## Errors
    /// - `InvalidOrderStatus` for shipped and delivered orders
    pub async fn cancel_order(&self, order_id: &str, reason: Option<&str>) -> DbResult<CancelOutcome> {
        validate_note("reason", reason).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut *tx, order_id).await?;

        if order.status == OrderStatus::Cancelled {
            if !order.needs_attention() {
                debug!(order_number = %order.order_number, "Order already cancelled");
                return Ok(CancelOutcome::AlreadyCancelled(order));
            }
            // Cancelling again is how staff sign off a paid, unfulfilled order.
            sqlx::query("UPDATE orders SET fulfillment_error = NULL, updated_at = ?2 WHERE id = ?1")
                .bind(order_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            let settled = fetch_order(&mut *tx, order_id).await?;
            tx.commit().await?;
            info!(order_number = %settled.order_number, "Attention flag cleared");
            return Ok(CancelOutcome::AlreadyCancelled(settled));
        }
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(CoreError::InvalidOrderStatus {
                order_id: order.id,
                current: order.status.to_string(),
                requested: OrderStatus::Cancelled.to_string(),
            }
            .into());
        }

        if order.status.holds_stock() {
            let reason = match reason.map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => format!("Cancelación {}: {}", order.order_number, reason),
                None => format!("Cancelación {}", order.order_number),
            };
            return_stock(&mut *tx, &order, &reason).await?;
        }

        sqlx::query(
            r#"
            UPDATE orders SET status = 'cancelled', fulfillment_error = NULL, updated_at = ?3
            WHERE id = ?1 AND status = ?2
            "#,
        )
            .bind(order_id)
            .bind(order.status)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let cancelled = fetch_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        info!(
            order_number = %cancelled.order_number,
            restored = order.status.holds_stock(),
            "Order cancelled"
        );
        Ok(CancelOutcome::Cancelled(cancelled))
    }

    /// Moves an order along the fulfillment track. Cancellation goes through
    /// [`cancel_order`](Self::cancel_order); confirmation through payment.
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        if next == OrderStatus::Cancelled {
            return Ok(self.cancel_order(order_id, None).await?.into_order());
        }

        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut *tx, order_id).await?;

        if order.status == next {
            return Ok(order);
        }
        if next == OrderStatus::Confirmed || !order.status.can_transition_to(next) {
            return Err(CoreError::InvalidOrderStatus {
                order_id: order.id,
                current: order.status.to_string(),
                requested: next.to_string(),
            }
            .into());
        }

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(next)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let updated = fetch_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        info!(order_number = %updated.order_number, status = %updated.status, "Order status updated");
        Ok(updated)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Order::from))
    }

    /// Orders newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 = 0 OR (fulfillment_error IS NOT NULL
                              AND payment_status = 'approved'
                              AND status IN ('pending', 'cancelled')))
            ORDER BY created_at DESC, order_number DESC
            LIMIT ?3
            "#
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(filter.status)
            .bind(filter.attention)
            .bind(filter.limit.unwrap_or(100).min(500) as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::coupon::NewCoupon;
    use crate::repository::sale::{PosLine, PosSaleRequest};
    use crate::repository::test_support::{
        file_db, product, product_with_variants, stock_of, store, test_db,
    };
    use crate::Database;
    use tienda_core::error::CouponRejection;
    use tienda_core::{DiscountType, PaymentMethod, Percentage, SaleCustomer};

    fn checkout(items: Vec<CheckoutItem>, coupon_code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            customer: OrderCustomer {
                name: "Lucía Fernández".to_string(),
                email: "Lucia@Example.com".to_string(),
                phone: None,
            },
            shipping_address: Some("Av. Siempre Viva 742".to_string()),
            coupon_code: coupon_code.map(str::to_string),
        }
    }

    fn item(product_id: &str, size: Option<&str>, quantity: i64) -> CheckoutItem {
        CheckoutItem {
            product_id: product_id.to_string(),
            variant_id: None,
            size: size.map(str::to_string),
            quantity,
        }
    }

    async fn cancellation_rows(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_history WHERE change_type = 'cancellation'")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn single_use_coupon(db: &Database) {
        db.coupons()
            .create(&NewCoupon {
                code: "UNAVEZ".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: 1_000,
                min_purchase_cents: 0,
                max_discount_cents: None,
                valid_from: None,
                valid_until: None,
                max_uses: Some(1),
                is_active: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_order_uses_live_prices_and_takes_no_stock() {
        let db = test_db().await;
        let (buzo, variants) =
            product_with_variants(&db, "Buzo", "BUZ-001", 20_000, &[("M", 3), ("L", 1)]).await;

        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&buzo.id, Some("M"), 2)], None))
            .await
            .unwrap();

        assert_eq!(order.order_number, "ORD-000001");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_cents, 40_000);
        assert_eq!(order.customer.email, "lucia@example.com");
        assert_eq!(order.items[0].variant_id.as_deref(), Some(variants[0].id.as_str()));
        assert_eq!(stock_of(&db, &buzo.id, Some(&variants[0].id)).await, 3);

        let err = db
            .orders()
            .create_pending_order(&checkout(vec![item(&buzo.id, Some("L"), 2)], None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_confirm_takes_stock_once() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", Some("M"), 10_000, 5).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 2)], None))
            .await
            .unwrap();

        let first = db.orders().confirm_paid_order(&order.id, Some("pay-1")).await.unwrap();
        assert!(matches!(first, ConfirmOutcome::Confirmed(_)));
        assert_eq!(first.order().status, OrderStatus::Confirmed);
        assert_eq!(first.order().payment_status, PaymentStatus::Approved);
        assert_eq!(first.order().payment_id.as_deref(), Some("pay-1"));

        let second = db.orders().confirm_paid_order(&order.id, Some("pay-1")).await.unwrap();
        assert!(matches!(second, ConfirmOutcome::AlreadyProcessed(_)));
        assert_eq!(stock_of(&db, &remera.id, None).await, 3);
    }

    #[tokio::test]
    async fn test_stock_failure_after_approval_flags_order() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 2).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 2)], None))
            .await
            .unwrap();

        // The register sells one unit while the shopper is paying.
        db.sales()
            .complete_pos_sale(
                &PosSaleRequest {
                    lines: vec![PosLine {
                        product_id: remera.id.clone(),
                        variant_id: None,
                        size: None,
                        quantity: 1,
                        discount: None,
                    }],
                    general_discount: Percentage::zero(),
                    payment_method: PaymentMethod::Cash,
                    customer: SaleCustomer::default(),
                    notes: None,
                    idempotency_key: None,
                },
                &store(),
            )
            .await
            .unwrap();

        let err = db
            .orders()
            .confirm_paid_order(&order.id, Some("pay-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&db, &remera.id, None).await, 1);

        let flagged = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert!(flagged.needs_attention());
        assert_eq!(flagged.payment_id.as_deref(), Some("pay-9"));

        let attention = db
            .orders()
            .list(&OrderFilter {
                attention: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(attention.len(), 1);
        assert_eq!(attention[0].id, order.id);
    }

    #[tokio::test]
    async fn test_coupon_with_max_uses_rejected_at_next_confirmation() {
        let db = test_db().await;
        single_use_coupon(&db).await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 10).await;

        let first = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], Some("unavez")))
            .await
            .unwrap();
        let second = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], Some("UNAVEZ")))
            .await
            .unwrap();
        assert_eq!(first.discount_cents, 1_000);
        assert_eq!(first.total_cents, 9_000);
        assert_eq!(first.coupon_code.as_deref(), Some("UNAVEZ"));

        db.orders().confirm_paid_order(&first.id, Some("p1")).await.unwrap();
        let err = db
            .orders()
            .confirm_paid_order(&second.id, Some("p2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CouponRejected {
                reason: CouponRejection::Exhausted,
                ..
            })
        ));

        let coupon = db.coupons().get_by_code("UNAVEZ").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        assert_eq!(stock_of(&db, &remera.id, None).await, 9);

        let err = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], Some("UNAVEZ")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CouponRejected { .. })));
    }

    #[tokio::test]
    async fn test_double_cancellation_restores_stock_once() {
        let db = test_db().await;
        let (buzo, variants) =
            product_with_variants(&db, "Buzo", "BUZ-001", 20_000, &[("M", 3)]).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&buzo.id, Some("M"), 2)], None))
            .await
            .unwrap();
        db.orders().confirm_paid_order(&order.id, None).await.unwrap();
        assert_eq!(stock_of(&db, &buzo.id, Some(&variants[0].id)).await, 1);

        let first = db.orders().cancel_order(&order.id, Some("cliente")).await.unwrap();
        let second = db.orders().cancel_order(&order.id, Some("cliente")).await.unwrap();

        assert!(matches!(first, CancelOutcome::Cancelled(_)));
        assert!(matches!(second, CancelOutcome::AlreadyCancelled(_)));
        assert_eq!(stock_of(&db, &buzo.id, Some(&variants[0].id)).await, 3);
        assert_eq!(stock_of(&db, &buzo.id, None).await, 3);
        assert_eq!(cancellation_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn test_cancel_pending_returns_nothing_and_shipped_is_final() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 4).await;

        let pending = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], None))
            .await
            .unwrap();
        db.orders().cancel_order(&pending.id, None).await.unwrap();
        assert_eq!(stock_of(&db, &remera.id, None).await, 4);
        assert_eq!(cancellation_rows(&db).await, 0);

        let shipped = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], None))
            .await
            .unwrap();
        db.orders().confirm_paid_order(&shipped.id, None).await.unwrap();
        db.orders().update_status(&shipped.id, OrderStatus::Shipped).await.unwrap();

        let err = db.orders().cancel_order(&shipped.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOrderStatus { .. })));

        let delivered = db
            .orders()
            .update_status(&shipped.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(stock_of(&db, &remera.id, None).await, 3);
    }

    #[tokio::test]
    async fn test_payment_updates() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 4).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], None))
            .await
            .unwrap();

        let in_process = db
            .orders()
            .apply_payment_update(&order.id, "pay-1", PaymentStatus::InProcess)
            .await
            .unwrap();
        assert_eq!(in_process.status, OrderStatus::Pending);
        assert_eq!(in_process.payment_status, PaymentStatus::InProcess);

        let rejected = db
            .orders()
            .apply_payment_update(&order.id, "pay-1", PaymentStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.status, OrderStatus::Cancelled);
        assert_eq!(rejected.payment_status, PaymentStatus::Rejected);

        // A status update for a settled order is ignored.
        let stale = db
            .orders()
            .apply_payment_update(&order.id, "pay-1", PaymentStatus::InProcess)
            .await
            .unwrap();
        assert_eq!(stale.payment_status, PaymentStatus::Rejected);
    }

    #[tokio::test]
    async fn test_second_card_approved_after_rejection_is_flagged() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 4).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], None))
            .await
            .unwrap();

        db.orders()
            .apply_payment_update(&order.id, "pay-1", PaymentStatus::Rejected)
            .await
            .unwrap();
        let paid = db
            .orders()
            .apply_payment_update(&order.id, "pay-2", PaymentStatus::Approved)
            .await
            .unwrap();

        assert_eq!(paid.status, OrderStatus::Cancelled);
        assert_eq!(paid.payment_status, PaymentStatus::Approved);
        assert_eq!(paid.payment_id.as_deref(), Some("pay-2"));
        assert!(paid.fulfillment_error.is_some());
        assert!(paid.needs_attention());
        assert_eq!(stock_of(&db, &remera.id, None).await, 4);

        let attention = db
            .orders()
            .list(&OrderFilter {
                attention: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(attention.len(), 1);
        assert_eq!(attention[0].id, order.id);

        // The webhook repeats itself; nothing changes.
        let again = db.orders().confirm_paid_order(&order.id, Some("pay-2")).await.unwrap();
        assert!(matches!(again, ConfirmOutcome::AlreadyProcessed(_)));
        assert_eq!(again.order().updated_at, paid.updated_at);

        // Staff refund the shopper and sign the order off.
        let settled = db.orders().cancel_order(&order.id, None).await.unwrap();
        assert!(matches!(settled, CancelOutcome::AlreadyCancelled(_)));
        assert!(!settled.order().needs_attention());
        let attention = db
            .orders()
            .list(&OrderFilter {
                attention: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(attention.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_approval_after_staff_cancel_is_not_flagged() {
        let db = test_db().await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 4).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 1)], None))
            .await
            .unwrap();
        db.orders().confirm_paid_order(&order.id, Some("pay-1")).await.unwrap();
        db.orders().cancel_order(&order.id, None).await.unwrap();

        let late = db
            .orders()
            .apply_payment_update(&order.id, "pay-1", PaymentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(late.status, OrderStatus::Cancelled);
        assert!(late.fulfillment_error.is_none());
        assert_eq!(stock_of(&db, &remera.id, None).await, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_webhook_and_return_page_race_confirms_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let remera = product(&db, "Remera", "REM-001", None, 10_000, 5).await;
        let order = db
            .orders()
            .create_pending_order(&checkout(vec![item(&remera.id, None, 2)], None))
            .await
            .unwrap();

        let (webhook, return_page) = (db.orders(), db.orders());
        let (a, b) = (order.id.clone(), order.id.clone());
        let (first, second) = tokio::join!(
            tokio::spawn(async move { webhook.confirm_paid_order(&a, Some("pay-1")).await }),
            tokio::spawn(async move { return_page.confirm_paid_order(&b, Some("pay-1")).await }),
        );
        let outcomes = [first.unwrap().unwrap(), second.unwrap().unwrap()];

        let confirmed = outcomes
            .iter()
            .filter(|o| matches!(o, ConfirmOutcome::Confirmed(_)))
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(stock_of(&db, &remera.id, None).await, 3);
    }
}
