//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  axum handler                                                           │
//! │       │                                                                 │
//! │       │  db.sales().complete_pos_sale(request, &store)                  │
//! │       ▼                                                                 │
//! │  SaleRepository                                                         │
//! │  ├── complete_pos_sale  ──┐                                             │
//! │  ├── get_by_id            │  one transaction:                           │
//! │  └── list                 │   stock::apply_delta (per line)             │
//! │                           │   sequences::next_number                    │
//! │                           │   INSERT local_sales                        │
//! │                           │   ledger::insert_transaction (account sale) │
//! │                           ▼                                             │
//! │                      SQLite                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads and admin CRUD
//! - [`customer::CustomerRepository`] - Registered customers
//! - [`sale::SaleRepository`] - Register sales
//! - [`order::OrderRepository`] - Online orders
//! - [`ledger::LedgerRepository`] - Running-tab transactions and balances
//! - [`coupon::CouponRepository`] - Discount codes
//! - [`inventory::InventoryRepository`] - Adjustments, returns, history
//! - [`receipt::ReceiptRepository`] - Receipt data lookup

pub mod coupon;
pub mod customer;
pub mod inventory;
pub mod ledger;
pub mod order;
pub mod product;
pub mod receipt;
pub mod sale;

mod sequences;
mod stock;

#[cfg(test)]
pub(crate) mod test_support;
