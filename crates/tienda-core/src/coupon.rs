//! # Coupons
//!
//! Eligibility and discount computation for discount codes.
//!
//! ## Checks (in order)
//! ```text
//! active? ──► valid_from <= now? ──► now <= valid_until? ──►
//!     subtotal >= min_purchase? ──► used_count < max_uses? ──► discount
//! ```
//!
//! The usage counter itself is incremented by the database layer, inside the
//! transaction that confirms the paid order, guarded by the same
//! `used_count < max_uses` predicate.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, CouponRejection, ValidationError};
use crate::money::Money;
use crate::types::{Coupon, DiscountType, Percentage};

/// Normalizes a code as typed by a shopper: trimmed, upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validates a code before it is stored.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    if code.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 32,
        });
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

/// Validates the discount definition of a coupon.
pub fn validate_discount(discount_type: DiscountType, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "discount_value".to_string(),
        });
    }
    if discount_type == DiscountType::Percentage && value > Percentage::FULL.bps() as i64 {
        return Err(ValidationError::OutOfRange {
            field: "discount_value".to_string(),
            min: 1,
            max: Percentage::FULL.bps() as i64,
        });
    }
    Ok(())
}

/// Checks every eligibility rule, returning the first one that fails.
pub fn check_eligibility(
    coupon: &Coupon,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if now < coupon.valid_from {
        return Err(CouponRejection::NotYetValid);
    }
    if let Some(until) = coupon.valid_until {
        if now > until {
            return Err(CouponRejection::Expired);
        }
    }
    if subtotal.cents() < coupon.min_purchase_cents {
        return Err(CouponRejection::BelowMinimum {
            min_purchase_cents: coupon.min_purchase_cents,
        });
    }
    if let Some(max_uses) = coupon.max_uses {
        if coupon.used_count >= max_uses {
            return Err(CouponRejection::Exhausted);
        }
    }
    Ok(())
}

/// Discount a coupon grants on `subtotal`, ignoring eligibility.
///
/// - Percentage: `min(value% × subtotal, max_discount)`
/// - Fixed: `min(value, subtotal)`
pub fn discount_for(coupon: &Coupon, subtotal: Money) -> Money {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let bps = coupon.discount_value.clamp(0, Percentage::FULL.bps() as i64) as u32;
            let amount = subtotal.percentage_of(Percentage::from_bps(bps));
            match coupon.max_discount_cents {
                Some(cap) => amount.min(Money::from_cents(cap)),
                None => amount,
            }
        }
        DiscountType::Fixed => Money::from_cents(coupon.discount_value),
    };
    raw.min(subtotal)
}

/// Eligibility plus discount, as a domain error naming the code.
pub fn evaluate(coupon: &Coupon, subtotal: Money, now: DateTime<Utc>) -> CoreResult<Money> {
    check_eligibility(coupon, subtotal, now).map_err(|reason| CoreError::CouponRejected {
        code: coupon.code.clone(),
        reason,
    })?;
    Ok(discount_for(coupon, subtotal))
}

// =============================================================================
// Unit Tests
// =============================================================================
