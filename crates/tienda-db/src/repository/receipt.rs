//! # Receipt Repository
//!
//! Finds the data a receipt is drawn from.
//!
//! ```text
//! ledger transaction ──► receipt_data snapshot? ──yes──► use it as stored
//!                                    │
//!                                    no (rows written before snapshots)
//!                                    ▼
//!                        rebuild from the linked sale, or from
//!                        transaction + customer when there is none
//!
//! register sale ──► rebuild from the stored sale (lines are frozen on it)
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{customer::CustomerRepository, ledger::LedgerRepository, sale::SaleRepository};
use tienda_core::receipt::{ReceiptData, StoreProfile};
use tienda_core::{AccountTransaction, CoreError};

/// Repository for receipt lookups.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Receipt of a register sale.
    pub async fn for_sale(&self, sale_id: &str, store: &StoreProfile) -> DbResult<ReceiptData> {
        let sale = SaleRepository::new(self.pool.clone())
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        Ok(ReceiptData::for_sale(&sale, store))
    }

    /// Receipt of a ledger transaction: the stored snapshot when present.
    pub async fn for_transaction(&self, transaction_id: &str, store: &StoreProfile) -> DbResult<ReceiptData> {
        let transaction = LedgerRepository::new(self.pool.clone())
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;
        self.for_loaded_transaction(transaction, store).await
    }

    /// Same as [`for_transaction`](Self::for_transaction) for an already
    /// loaded (and ownership-checked) transaction.
    pub async fn for_loaded_transaction(
        &self,
        transaction: AccountTransaction,
        store: &StoreProfile,
    ) -> DbResult<ReceiptData> {
        if let Some(snapshot) = transaction.receipt_data {
            return Ok(snapshot);
        }

        debug!(id = %transaction.id, "No receipt snapshot, rebuilding from live rows");
        let customer = CustomerRepository::new(self.pool.clone())
            .get_by_id(&transaction.customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(transaction.customer_id.clone()))?;

        let sale = match transaction.sale_id.as_deref() {
            Some(sale_id) => SaleRepository::new(self.pool.clone()).get_by_id(sale_id).await?,
            None => None,
        };
        Ok(match sale {
            Some(sale) => ReceiptData::for_account_sale(&sale, &customer, store),
            None => ReceiptData::for_transaction(&transaction, &customer, store),
        })
    }
}
