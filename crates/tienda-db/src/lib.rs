//! # tienda-db: Database Layer
//!
//! SQLite storage for the catalog, register sales, online orders, the
//! running-tab ledger, coupons and the stock audit log.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  axum handler (POST /admin/pos/sales)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tienda-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│  product      │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │  sale  order  │    │ 001_init.sql │  │   │
//! │  │   │               │    │  ledger coupon│    │              │  │   │
//! │  │   │               │    │  inventory    │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                         stock.rs (checked decrements and      │   │
//! │  │                         history rows, shared by workflows)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Workflows Are Transactions
//!
//! Every operation that touches more than one row runs inside a single
//! transaction: POS sale completion, paid-order confirmation, order
//! cancellation, stock adjustment, return processing and ledger payments.
//! A failure at any step drops the transaction, so no partial state persists.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tienda.db")).await?;
//! let products = db.products().list(&ProductFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::coupon::{CouponRepository, NewCoupon};
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::inventory::{InventoryRepository, ReturnRequest, StockAdjustment};
pub use repository::ledger::{LedgerRepository, NewPayment};
pub use repository::order::{
    CancelOutcome, CheckoutItem, CheckoutRequest, ConfirmOutcome, OrderFilter, OrderRepository,
};
pub use repository::product::{NewProduct, NewVariant, ProductFilter, ProductRepository};
pub use repository::receipt::ReceiptRepository;
pub use repository::sale::{PosLine, PosSaleRequest, SaleRepository};
