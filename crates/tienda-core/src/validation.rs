//! # Validation Module
//!
//! Input validation for admin forms and checkout requests.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Web client        basic format checks, immediate feedback     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE       business rules before any mutation          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite            NOT NULL, UNIQUE, CHECK (stock >= 0)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a SKU as printed on tags.
///
/// ## Example
/// ```rust
/// use tienda_core::validation::validate_sku;
///
/// assert!(validate_sku("REM-001").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    required("sku", sku, 50)?;
    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required("name", name, 200)
}

pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required("customer_name", name, 120)
}

/// Prices are whole cents, strictly positive.
pub fn validate_price_cents(price_cents: i64) -> ValidationResult<()> {
    if price_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Minimal e-mail shape check: one `@` with text on both sides and a dot in the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    required("email", email, 254)?;
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "not a valid e-mail address".to_string(),
        });
    }
    Ok(())
}

/// Free-text reasons and descriptions are optional but bounded.
pub fn validate_note(field: &str, text: Option<&str>) -> ValidationResult<()> {
    match text {
        Some(text) if text.chars().count() > 500 => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 500,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
