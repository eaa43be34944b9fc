//! # Domain Types
//!
//! Core domain types used throughout the store.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│ ProductVariant  │   │    Customer     │       │
//! │  │  stock (Σ var.) │   │  size / color   │   │  running tab    │       │
//! │  │  price_cents    │   │  stock          │   │  owner          │       │
//! │  └────────┬────────┘   └─────────────────┘   └────────┬────────┘       │
//! │           │ snapshot                                   │                │
//! │  ┌────────▼────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    SaleLine     │──►│ LocalSale (POS) │──►│AccountTransaction│      │
//! │  │  frozen price   │   │ Order (online)  │   │  signed amount  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │     Coupon      │   │InventoryHistory │  append-only audit          │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, sale_number, order_number, coupon code) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::receipt::ReceiptData;

// =============================================================================
// Percentage
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%, so 1000 bps = 10% and 1250 bps = 12.5%.
/// Staff type whole or half percentages at the register; basis points hold
/// both without floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct Percentage(u32);

impl Percentage {
    /// 100%.
    pub const FULL: Percentage = Percentage(10_000);

    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a percentage from a whole number of percent (10 → 10%).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Percentage(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

/// Prints `10%` or `12.5%` (trailing zeros dropped).
impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `stock` is the denormalized total. When the product has variants it is
/// always recomputed as the sum of variant stock in the same transaction that
/// changed a variant; otherwise it is the authoritative count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    /// Legacy single-variant fields, used when the product has no variants.
    pub sku: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,

    pub price_cents: i64,

    /// Display-only strike-through price.
    pub original_price_cents: Option<i64>,

    pub image_url: Option<String>,
    pub images: Vec<String>,

    pub stock: i64,
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True when a strike-through price above the current one is set.
    pub fn is_on_sale(&self) -> bool {
        self.original_price_cents
            .map(|original| original > self.price_cents)
            .unwrap_or(false)
    }

    /// Label used on sale snapshots and stock errors: `Remera Lisa (M)`.
    pub fn display_name(&self, size: Option<&str>) -> String {
        match size.or(self.size.as_deref()) {
            Some(size) => format!("{} ({})", self.name, size),
            None => self.name.clone(),
        }
    }
}

/// A specific size/color instance of a product with its own stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub sku: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product together with its variants (storefront detail, admin editor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer (running-tab owner, optional link on sales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Debit,
    Credit,
    Transfer,
    /// Paid through the online payment processor.
    Online,
    /// Charged to the customer's running tab.
    Account,
}

impl PaymentMethod {
    /// Label printed on receipts.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Debit => "Tarjeta de débito",
            PaymentMethod::Credit => "Tarjeta de crédito",
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::Online => "Pago online",
            PaymentMethod::Account => "Cuenta corriente",
        }
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// One line of a sale or order.
///
/// The single normalized item shape: every cart, register sale, order and
/// receipt carries lines in this form, frozen at sale time so historical
/// receipts stay stable when the product later changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub size: Option<String>,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Per-line discount, absent when none was applied.
    pub discount: Option<Percentage>,
    /// unit_price × quantity minus the line discount.
    pub subtotal_cents: i64,
}

impl SaleLine {
    /// unit_price × quantity, before any discount.
    pub fn gross(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Amount taken off by the line discount.
    pub fn discount_amount(&self) -> Money {
        self.gross() - self.subtotal()
    }
}

// =============================================================================
// Local Sale (POS)
// =============================================================================

/// Customer identity captured on a sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleCustomer {
    /// Registered customer, when the sale was linked to one.
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A completed in-store register sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LocalSale {
    pub id: String,
    /// Human-readable number, `V-000042`.
    pub sale_number: String,
    pub customer: SaleCustomer,
    pub items: Vec<SaleLine>,
    /// Σ unit_price × quantity, before any discount.
    pub subtotal_cents: i64,
    /// Line discounts plus the general discount.
    pub discount_cents: i64,
    pub general_discount: Percentage,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LocalSale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn is_account_sale(&self) -> bool {
        self.payment_method == PaymentMethod::Account
    }
}

// =============================================================================
// Online Orders
// =============================================================================

/// Fulfillment status of an online order.
///
/// ```text
/// pending ──► confirmed ──► shipped ──► delivered
///    │            │
///    └────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Whether stock has been taken for an order in this status.
    pub fn holds_stock(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    InProcess,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Maps a processor status string. Unknown values are treated as pending
    /// so a later notification can settle them.
    pub fn from_processor(status: &str) -> Self {
        match status {
            "approved" => PaymentStatus::Approved,
            "in_process" | "in_mediation" | "authorized" => PaymentStatus::InProcess,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" | "charged_back" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }

    /// Final failure states: the order can be released.
    pub fn is_failed(&self) -> bool {
        matches!(self, PaymentStatus::Rejected | PaymentStatus::Cancelled)
    }
}

/// Buyer and shipping contact for an online order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// An online storefront order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable number, `ORD-000042`.
    pub order_number: String,
    pub customer: OrderCustomer,
    pub shipping_address: Option<String>,
    pub items: Vec<SaleLine>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Processor checkout preference.
    pub preference_id: Option<String>,
    /// Processor payment reference.
    pub payment_id: Option<String>,
    /// Set when the payment was approved but the order could not be fulfilled.
    pub fulfillment_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Approved payment that still needs staff action.
    pub fn needs_attention(&self) -> bool {
        self.fulfillment_error.is_some()
            && self.payment_status == PaymentStatus::Approved
            && matches!(self.status, OrderStatus::Pending | OrderStatus::Cancelled)
    }
}

// =============================================================================
// Running-Tab Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Increases what the customer owes.
    Sale,
    /// Decreases what the customer owes.
    Payment,
}

/// One entry in a customer's running-tab ledger. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountTransaction {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Signed: positive for sales, negative for payments.
    pub amount_cents: i64,
    pub description: String,
    pub payment_method: Option<PaymentMethod>,
    /// Sale that produced this debit (lookup only).
    pub sale_id: Option<String>,
    /// Frozen receipt fields captured when the row was written.
    pub receipt_data: Option<ReceiptData>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl AccountTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Derived balance of a customer's running tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerBalance {
    pub customer_id: String,
    pub customer_name: String,
    /// Positive means the customer owes the store.
    pub balance_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_movement_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Coupons
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is in basis points.
    Percentage,
    /// `discount_value` is in cents.
    Fixed,
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Coupon {
    pub id: String,
    /// Always upper case.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_purchase_cents: i64,
    pub max_discount_cents: Option<i64>,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory History
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ManualAdjustment,
    /// Online order confirmed.
    Sale,
    /// Register sale.
    LocalSale,
    Return,
    /// Confirmed online order cancelled, stock put back.
    Cancellation,
}

/// Append-only stock audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryHistory {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub change_type: ChangeType,
    pub quantity_change: i64,
    pub previous_stock: i64,
    pub stock_after: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
