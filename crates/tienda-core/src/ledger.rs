//! # Running-Tab Ledger Arithmetic
//!
//! A customer's balance is never stored: it is the sum of the signed amounts
//! of their transactions. Sales are positive (the customer owes more),
//! payments are negative.
//!
//! ```text
//!   +$500.00  sale     V-000012
//!   -$200.00  payment  efectivo
//!   ────────
//!   +$300.00  balance (owed to the store)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{AccountTransaction, TransactionType};

/// Signed ledger amount for a positive `amount` of the given kind.
pub fn signed_amount(kind: TransactionType, amount: Money) -> Money {
    match kind {
        TransactionType::Sale => amount.abs(),
        TransactionType::Payment => -amount.abs(),
    }
}

/// Balance of a set of transactions.
pub fn balance_of(transactions: &[AccountTransaction]) -> Money {
    transactions.iter().map(AccountTransaction::amount).sum()
}

/// Rejects zero and negative amounts posted to the ledger.
pub fn validate_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("amount must be greater than zero, got {}", amount),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(kind: TransactionType, cents: i64) -> AccountTransaction {
        AccountTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: "c1".to_string(),
            kind,
            amount_cents: signed_amount(kind, Money::from_cents(cents)).cents(),
            description: String::new(),
            payment_method: None,
            sale_id: None,
            receipt_data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_then_partial_payment() {
        let txs = vec![
            tx(TransactionType::Sale, 50_000),
            tx(TransactionType::Payment, 20_000),
        ];
        assert_eq!(balance_of(&txs).cents(), 30_000);
    }

    #[test]
    fn test_signs() {
        assert_eq!(signed_amount(TransactionType::Sale, Money::from_cents(100)).cents(), 100);
        assert_eq!(signed_amount(TransactionType::Payment, Money::from_cents(100)).cents(), -100);
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        assert!(validate_amount(Money::zero()).is_err());
        assert!(validate_amount(Money::from_cents(-1)).is_err());
        assert!(validate_amount(Money::from_cents(1)).is_ok());
    }

    #[test]
    fn test_empty_ledger_is_zero() {
        assert!(balance_of(&[]).is_zero());
    }
}
