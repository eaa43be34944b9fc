//! # Tienda API
//!
//! HTTP service for the clothing store: the storefront checkout, payment
//! notifications, and the back-office used at the counter.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tienda API Routes                              │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  /api          │  │  /api/webhooks │  │  /admin                    ││
//! │  │                │  │                │  │                            ││
//! │  │ • products     │  │ • payments     │  │ • products / variants      ││
//! │  │ • coupons      │  │   (always 200) │  │ • pos sales + receipts     ││
//! │  │ • checkout     │  │                │  │ • orders (attention list)  ││
//! │  │ • account      │  │                │  │ • customers / accounts     ││
//! │  │   receipts     │  │                │  │ • inventory / coupons      ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  AppState: Database · StoreProfile · PaymentProcessor            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then `tienda.toml`, then `TIENDA_*` variables.
//! The processor access token is read from `TIENDA_PROCESSOR_ACCESS_TOKEN`.

pub mod config;
pub mod error;
pub mod processor;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ErrorCode};
pub use processor::{HttpProcessorClient, PaymentProcessor};
pub use state::AppState;

/// Default `EnvFilter` directives when neither `RUST_LOG` nor the config
/// file set one.
pub const DEFAULT_LOG_FILTER: &str = "info,tienda=debug,sqlx=warn";

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
