//! # Pricing
//!
//! Line discounts, the general (whole-sale) discount, and sale totals.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per line:   gross    = unit_price × quantity                           │
//! │              discount = round(gross × line%)                            │
//! │              subtotal = gross − discount                                │
//! │                                                                         │
//! │  per sale:   net      = Σ line subtotals                                │
//! │              general  = round(net × general%)   (or a coupon amount)    │
//! │              total    = net − general                                   │
//! │                                                                         │
//! │  Rounding is half away from zero, to a whole cent, at each step.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Worked example: 3 × $100.00 (no discount) and 1 × $50.00 at 10% with a 5%
//! general discount. Lines net $300.00 + $45.00 = $345.00; general discount
//! $17.25; total $327.75; discount on the receipt $5.00 + $17.25 = $22.25.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Percentage, SaleLine};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line as requested, before pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub name: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Option<Percentage>,
}

/// Prices one line, freezing name and unit price into a [`SaleLine`].
pub fn price_line(input: LineInput) -> CoreResult<SaleLine> {
    validate_line_quantity(input.quantity)?;

    let discount = match input.discount {
        Some(rate) if rate > Percentage::FULL => {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: Percentage::FULL.bps() as i64,
            }
            .into())
        }
        Some(rate) if rate.is_zero() => None,
        other => other,
    };

    let gross = input.unit_price.multiply_quantity(input.quantity);
    let subtotal = match discount {
        Some(rate) => gross.apply_percentage_discount(rate),
        None => gross,
    };

    Ok(SaleLine {
        product_id: input.product_id,
        variant_id: input.variant_id,
        name: input.name,
        size: input.size,
        quantity: input.quantity,
        unit_price_cents: input.unit_price.cents(),
        discount,
        subtotal_cents: subtotal.cents(),
    })
}

/// Rejects zero, negative and runaway quantities.
pub fn validate_line_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Rejects empty and oversized carts.
pub fn validate_line_count(count: usize) -> CoreResult<()> {
    if count == 0 {
        return Err(CoreError::EmptyCart);
    }
    if count > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }
    Ok(())
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Totals of a sale or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    /// Σ unit_price × quantity.
    pub gross_subtotal: Money,
    /// Σ per-line discounts.
    pub line_discount: Money,
    /// Σ line subtotals after per-line discounts.
    pub net_subtotal: Money,
    /// Whole-sale discount (general percentage or coupon).
    pub general_discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Totals with no general discount.
    pub fn from_lines(lines: &[SaleLine]) -> Self {
        let gross_subtotal: Money = lines.iter().map(SaleLine::gross).sum();
        let net_subtotal: Money = lines.iter().map(SaleLine::subtotal).sum();
        SaleTotals {
            gross_subtotal,
            line_discount: gross_subtotal - net_subtotal,
            net_subtotal,
            general_discount: Money::zero(),
            total: net_subtotal,
        }
    }

    /// Applies a general percentage to the net subtotal.
    pub fn with_general_percentage(self, rate: Percentage) -> Self {
        let general = self.net_subtotal.percentage_of(rate.min(Percentage::FULL));
        self.with_general_amount(general)
    }

    /// Applies a fixed whole-sale discount, capped at the net subtotal.
    pub fn with_general_amount(self, amount: Money) -> Self {
        let general = if amount.is_negative() {
            Money::zero()
        } else {
            amount.min(self.net_subtotal)
        };
        SaleTotals {
            general_discount: general,
            total: self.net_subtotal - general,
            ..self
        }
    }

    /// Discount shown on the sale: line discounts plus the general discount.
    pub fn discount_total(&self) -> Money {
        self.line_discount + self.general_discount
    }
}

/// Totals for a register sale: lines plus a general percentage.
pub fn compute_totals(lines: &[SaleLine], general: Percentage) -> SaleTotals {
    SaleTotals::from_lines(lines).with_general_percentage(general)
}

// =============================================================================
// Unit Tests
// =============================================================================
