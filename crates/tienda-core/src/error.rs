//! Domain errors.
//!
//! Two layers sit above this crate. `DbError` wraps [`CoreError`] when a
//! rule fails inside a transaction, and the HTTP layer turns either into a
//! JSON body with a stable code. [`ValidationError`] covers malformed input
//! and always converts into [`CoreError::Validation`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// A business rule said no.
///
/// Raised before any write lands; inside a transaction the caller drops the
/// transaction and nothing persists.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    /// The variant holds fewer units than a line asks for. Also raised when
    /// a concurrent sale wins the race and the guarded decrement
    /// (`... WHERE stock >= ?`) touches no row.
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    #[error("Adjustment of {delta} would leave stock at {resulting} (current {current})")]
    NegativeStock {
        current: i64,
        delta: i64,
        resulting: i64,
    },

    /// Not an edge of the order state machine, e.g. cancelling a shipped
    /// order or confirming one that was already confirmed.
    #[error("Order {order_id} is {current}, cannot move to {requested}")]
    InvalidOrderStatus {
        order_id: String,
        current: String,
        requested: String,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Account sales require a registered customer")]
    AccountSaleWithoutCustomer,

    #[error("Coupon {code} rejected: {reason}")]
    CouponRejected {
        code: String,
        reason: CouponRejection,
    },

    /// SKU + size resolved to zero rows or to several. Stock is untouched.
    #[error("Return lookup for SKU {sku} size {size} matched {matches} items, expected exactly one")]
    ReturnLookup {
        sku: String,
        size: String,
        matches: usize,
    },

    /// A persisted cart or favorites blob from an incompatible release.
    #[error("Stored data version {found} is not supported (expected {expected})")]
    StorageVersionMismatch { found: u32, expected: u32 },

    #[error("Stored data is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Why a coupon code was turned down. Serialized into the error body so the
/// storefront can word its own message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Error)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum CouponRejection {
    #[error("coupon is inactive")]
    Inactive,

    #[error("coupon is not valid yet")]
    NotYetValid,

    #[error("coupon has expired")]
    Expired,

    #[error("purchase must be at least {min_purchase_cents} cents")]
    BelowMinimum { min_purchase_cents: i64 },

    #[error("coupon has reached its usage limit")]
    Exhausted,
}

/// Malformed input, caught before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_message_names_the_item() {
        let err = CoreError::InsufficientStock {
            item: "Remera Lisa (M)".into(),
            available: 2,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Remera Lisa (M): available 2, requested 3"
        );
    }

    #[test]
    fn test_rejection_reason_in_message() {
        let err = CoreError::CouponRejected {
            code: "VERANO10".into(),
            reason: CouponRejection::Exhausted,
        };
        assert!(err.to_string().ends_with("coupon has reached its usage limit"));
    }

    #[test]
    fn test_rejection_serializes_tagged() {
        let json = serde_json::to_value(CouponRejection::BelowMinimum {
            min_purchase_cents: 10_000,
        })
        .unwrap();
        assert_eq!(json["reason"], "below_minimum");
        assert_eq!(json["min_purchase_cents"], 10_000);
    }

    #[test]
    fn test_validation_lifts_into_core() {
        let core: CoreError = ValidationError::Required { field: "sku".into() }.into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
