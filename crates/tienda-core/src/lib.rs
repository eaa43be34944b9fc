//! # tienda-core
//!
//! The store's rules with no I/O attached: catalog and order types, pricing,
//! the storefront cart, coupon eligibility, running-tab arithmetic and the
//! receipt view model. `tienda-db` runs these inside SQLite transactions and
//! `tienda-api` exposes them over HTTP.
//!
//! ```text
//! storefront / admin panel
//!          │ JSON
//!      tienda-api ──► tienda-receipt (PNG)
//!          │
//!      tienda-db  (SQLite workflows)
//!          │
//!      tienda-core  ◄── you are here
//! ```
//!
//! | Module | Holds |
//! |---|---|
//! | [`types`] | Product, LocalSale, Order, AccountTransaction, ... |
//! | [`money`] | Integer-cent [`Money`] |
//! | [`pricing`] | Line and general discounts, sale totals |
//! | [`cart`] | Cart and favorites with versioned storage |
//! | [`coupon`] | Coupon eligibility and discount |
//! | [`ledger`] | Balance arithmetic |
//! | [`receipt`] | Receipt view model |
//! | [`error`], [`validation`] | Errors and input checks |
//!
//! ```rust
//! use tienda_core::money::Money;
//! use tienda_core::types::Percentage;
//!
//! let discount = Money::from_cents(5000).percentage_of(Percentage::from_bps(1000));
//! assert_eq!(discount.cents(), 500);
//! ```

pub mod cart;
pub mod coupon;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod receipt;
pub mod types;
pub mod validation;

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

/// Maximum lines allowed in a single cart or register sale.
pub const MAX_CART_ITEMS: usize = 100;

/// Per-line cap; catches a mistyped quantity at the register.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Reason recorded on inventory history when staff leave it blank.
pub const DEFAULT_ADJUSTMENT_REASON: &str = "Manual adjustment";
