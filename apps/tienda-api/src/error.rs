//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tienda                                 │
//! │                                                                         │
//! │  Handler ──► Result<T, ApiError>                                        │
//! │                 │                                                       │
//! │                 ├── DbError::QueryFailed ──────► DATABASE_ERROR  500    │
//! │                 ├── DbError::Domain(CoreError) ─┐                       │
//! │                 ├── CoreError ──────────────────┴► NOT_FOUND      404   │
//! │                 │                                 INSUFFICIENT_STOCK 409│
//! │                 │                                 COUPON_REJECTED 422   │
//! │                 │                                 ...                   │
//! │                 └── ProcessorError ────────────► PAYMENT_ERROR   502    │
//! │                                                                         │
//! │  Response body: { "code": "INSUFFICIENT_STOCK", "message": "..." }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal details (SQL errors, processor bodies) are logged and replaced
//! with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::processor::ProcessorError;
use tienda_core::CoreError;
use tienda_db::DbError;
use tienda_receipt::ReceiptError;

/// API error returned from handlers.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: 1a2b..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Duplicate value (409)
    Conflict,

    /// Not enough units on hand (409)
    InsufficientStock,

    /// Order status does not allow the operation (409)
    InvalidState,

    /// Stored cart written by another release (409)
    StaleCart,

    /// Cart is empty or too large (422)
    CartError,

    /// Coupon cannot be applied (422)
    CouponRejected,

    /// Other business rule rejection (422)
    BusinessLogic,

    /// Payment processor failed (502)
    PaymentError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict
            | ErrorCode::InsufficientStock
            | ErrorCode::InvalidState
            | ErrorCode::StaleCart => StatusCode::CONFLICT,
            ErrorCode::CartError | ErrorCode::CouponRejected | ErrorCode::BusinessLogic => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::PaymentError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => ApiError::from(e),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                error!("Constraint violation: {}", message);
                ApiError::validation("Invalid value")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::CorruptData { column, message } => {
                error!(column = %column, "Corrupt stored data: {}", message);
                ApiError::internal("Stored data could not be read")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match &err {
            CoreError::ProductNotFound(_)
            | CoreError::VariantNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::SaleNotFound(_) => ErrorCode::NotFound,
            CoreError::CouponNotFound(_) | CoreError::CouponRejected { .. } => {
                ErrorCode::CouponRejected
            }
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InvalidOrderStatus { .. } => ErrorCode::InvalidState,
            CoreError::EmptyCart | CoreError::CartTooLarge { .. } => ErrorCode::CartError,
            CoreError::StorageVersionMismatch { .. } | CoreError::StorageCorrupt(_) => {
                ErrorCode::StaleCart
            }
            CoreError::NegativeStock { .. } | CoreError::ReturnLookup { .. } => {
                ErrorCode::BusinessLogic
            }
            CoreError::QuantityTooLarge { .. }
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::AccountSaleWithoutCustomer
            | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, message)
    }
}

impl From<ProcessorError> for ApiError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::NotFound(id) => ApiError::not_found("Payment", &id),
            other => {
                error!(error = %other, "Payment processor error");
                ApiError::new(ErrorCode::PaymentError, "Payment processor unavailable")
            }
        }
    }
}

impl From<ReceiptError> for ApiError {
    fn from(err: ReceiptError) -> Self {
        error!(error = %err, "Receipt rendering failed");
        ApiError::internal("Receipt could not be rendered")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
