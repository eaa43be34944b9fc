//! # Back-Office Routes
//!
//! Staff endpoints, mounted under `/admin`. Authentication is handled in
//! front of the service.
//!
//! ```text
//! /products[/{id}]                     catalog CRUD (soft delete)
//! /products/{id}/variants              add variant
//! /variants/{id}                       update variant
//! /categories                          distinct categories
//! /pos/sales                           register sale
//! /sales[/{id}[/receipt]]              sales history and receipts
//! /orders[/{id}]                       ?status= & ?attention=true
//! /orders/{id}/cancel | /status        order workflow
//! /customers[/{id}]                    customer records
//! /accounts[/{customer_id}]            running tabs
//! /accounts/{id}/payments | /charges   ledger postings
//! /accounts/transactions/{id}/receipt  ledger receipt
//! /inventory/adjustments | /returns    stock movements
//! /inventory/{product_id}/history      movement history
//! /coupons[/{id}[/active]]             coupon CRUD
//! ```

mod accounts;
mod catalog;
mod coupons;
mod customers;
mod inventory;
mod orders;
mod sales;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(catalog::list).post(catalog::create))
        .route(
            "/products/{id}",
            get(catalog::detail).put(catalog::update).delete(catalog::remove),
        )
        .route("/products/{id}/variants", post(catalog::add_variant))
        .route("/variants/{id}", put(catalog::update_variant))
        .route("/categories", get(catalog::categories))
        // Register
        .route("/pos/sales", post(sales::complete))
        .route("/sales", get(sales::list))
        .route("/sales/{id}", get(sales::detail))
        .route("/sales/{id}/receipt", get(sales::receipt))
        // Online orders
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::detail))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/status", put(orders::update_status))
        // Customers and tabs
        .route("/customers", get(customers::list).post(customers::create))
        .route("/customers/{id}", get(customers::detail).put(customers::update))
        .route("/accounts", get(accounts::balances))
        .route("/accounts/{customer_id}", get(accounts::detail))
        .route("/accounts/{customer_id}/payments", post(accounts::register_payment))
        .route("/accounts/{customer_id}/charges", post(accounts::register_charge))
        .route(
            "/accounts/transactions/{transaction_id}/receipt",
            get(accounts::receipt),
        )
        // Inventory
        .route("/inventory/adjustments", post(inventory::adjust))
        .route("/inventory/returns", post(inventory::process_return))
        .route("/inventory/{product_id}/history", get(inventory::history))
        // Coupons
        .route("/coupons", get(coupons::list).post(coupons::create))
        .route("/coupons/{id}", put(coupons::update).delete(coupons::remove))
        .route("/coupons/{id}/active", put(coupons::set_active))
}
