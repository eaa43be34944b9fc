//! # Ledger Repository
//!
//! Append-only running-tab transactions for registered customers.
//!
//! ## Balance Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  account_transactions (never updated, never deleted)                    │
//! │                                                                         │
//! │   type     amount_cents   description                                   │
//! │   sale        +50000      Venta V-000012                                │
//! │   payment     -20000      Pago en efectivo                              │
//! │                                                                         │
//! │  customer_balances view:  SUM(amount_cents) = +30000 (owed)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each row carries a frozen `receipt_data` snapshot written in the same
//! INSERT, so a receipt reprinted months later shows exactly what was
//! handed to the customer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::sale;
use tienda_core::ledger::{signed_amount, validate_amount};
use tienda_core::receipt::{ReceiptData, StoreProfile};
use tienda_core::validation::validate_note;
use tienda_core::{
    AccountTransaction, CoreError, Customer, CustomerBalance, Money, PaymentMethod,
    TransactionType,
};

const TRANSACTION_COLUMNS: &str = r#"
    id, customer_id, type, amount_cents, description, payment_method,
    sale_id, receipt_data, created_at
"#;

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    customer_id: String,
    #[sqlx(rename = "type")]
    kind: TransactionType,
    amount_cents: i64,
    description: String,
    payment_method: Option<PaymentMethod>,
    sale_id: Option<String>,
    receipt_data: Option<Json<ReceiptData>>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for AccountTransaction {
    fn from(row: TransactionRow) -> Self {
        AccountTransaction {
            id: row.id,
            customer_id: row.customer_id,
            kind: row.kind,
            amount_cents: row.amount_cents,
            description: row.description,
            payment_method: row.payment_method,
            sale_id: row.sale_id,
            receipt_data: row.receipt_data.map(|json| json.0),
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// A payment received from a customer against their tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub customer_id: String,
    /// Positive amount received; stored negated.
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub description: Option<String>,
    /// Repeated keys return the original transaction.
    pub idempotency_key: Option<String>,
}

/// Everything needed to append one ledger row.
pub(crate) struct LedgerEntry<'a> {
    pub customer_id: &'a str,
    pub kind: TransactionType,
    /// Unsigned amount; the sign comes from `kind`.
    pub amount: Money,
    pub description: String,
    pub payment_method: Option<PaymentMethod>,
    pub sale_id: Option<&'a str>,
    pub idempotency_key: Option<&'a str>,
}

// =============================================================================
// Connection-level helpers (shared with the sale workflow)
// =============================================================================

pub(crate) async fn find_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    customer.ok_or_else(|| CoreError::CustomerNotFound(id.to_string()).into())
}

/// Appends one row to the ledger on the caller's connection.
///
/// `receipt` builds the snapshot from the transaction about to be stored;
/// it runs before the INSERT so the snapshot is part of the same row.
pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    entry: LedgerEntry<'_>,
    receipt: impl FnOnce(&AccountTransaction) -> ReceiptData,
) -> DbResult<AccountTransaction> {
    validate_amount(entry.amount)?;

    let mut transaction = AccountTransaction {
        id: Uuid::new_v4().to_string(),
        customer_id: entry.customer_id.to_string(),
        kind: entry.kind,
        amount_cents: signed_amount(entry.kind, entry.amount).cents(),
        description: entry.description,
        payment_method: entry.payment_method,
        sale_id: entry.sale_id.map(str::to_string),
        receipt_data: None,
        created_at: Utc::now(),
    };
    let snapshot = receipt(&transaction);

    sqlx::query(
        r#"
        INSERT INTO account_transactions (
            id, customer_id, type, amount_cents, description, payment_method,
            sale_id, receipt_data, idempotency_key, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&transaction.id)
    .bind(&transaction.customer_id)
    .bind(transaction.kind)
    .bind(transaction.amount_cents)
    .bind(&transaction.description)
    .bind(transaction.payment_method)
    .bind(&transaction.sale_id)
    .bind(Json(&snapshot))
    .bind(entry.idempotency_key)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        id = %transaction.id,
        customer_id = %transaction.customer_id,
        amount_cents = transaction.amount_cents,
        "Ledger transaction appended"
    );

    transaction.receipt_data = Some(snapshot);
    Ok(transaction)
}

async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> DbResult<Option<AccountTransaction>> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM account_transactions WHERE idempotency_key = ?1");
    let row: Option<TransactionRow> = sqlx::query_as(&sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(AccountTransaction::from))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for running-tab operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a payment against a customer's tab.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` for zero or negative amounts
    /// - `CustomerNotFound` for an unknown customer
    pub async fn register_payment(
        &self,
        payment: &NewPayment,
        store: &StoreProfile,
    ) -> DbResult<AccountTransaction> {
        let amount = Money::from_cents(payment.amount_cents);
        validate_amount(amount)?;
        validate_note("description", payment.description.as_deref()).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(key) = payment.idempotency_key.as_deref() {
            if let Some(existing) = find_by_idempotency_key(&mut *tx, key).await? {
                let same = existing.kind == TransactionType::Payment
                    && existing.customer_id == payment.customer_id
                    && existing.amount_cents == -amount.cents()
                    && existing.payment_method == Some(payment.payment_method);
                if !same {
                    warn!(key, id = %existing.id, "Idempotency key reused for a different payment");
                    return Err(DbError::duplicate("idempotency_key", key));
                }
                debug!(key, id = %existing.id, "Payment already registered");
                return Ok(existing);
            }
        }

        let customer = find_customer(&mut *tx, &payment.customer_id).await?;
        let description = payment
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Pago - {}", payment.payment_method.label()));

        let transaction = insert_transaction(
            &mut *tx,
            LedgerEntry {
                customer_id: &customer.id,
                kind: TransactionType::Payment,
                amount,
                description,
                payment_method: Some(payment.payment_method),
                sale_id: None,
                idempotency_key: payment.idempotency_key.as_deref(),
            },
            |transaction| ReceiptData::for_transaction(transaction, &customer, store),
        )
        .await?;

        tx.commit().await?;

        info!(
            customer_id = %customer.id,
            amount = %amount,
            method = ?payment.payment_method,
            "Payment registered"
        );
        Ok(transaction)
    }

    /// Charges an amount to a customer's tab outside the register workflow.
    ///
    /// The register posts its own debit inside the sale transaction; this is
    /// for charges recorded after the fact.
    pub async fn register_sale_to_account(
        &self,
        customer_id: &str,
        sale_id: Option<&str>,
        amount: Money,
        description: &str,
        receipt: Option<ReceiptData>,
        store: &StoreProfile,
    ) -> DbResult<AccountTransaction> {
        validate_amount(amount)?;

        let mut tx = begin_write(&self.pool).await?;
        let customer = find_customer(&mut *tx, customer_id).await?;

        let receipt = match (receipt, sale_id) {
            (Some(receipt), _) => Some(receipt),
            (None, Some(id)) => {
                let sale = sale::fetch_sale(&mut *tx, id)
                    .await?
                    .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;
                Some(ReceiptData::for_account_sale(&sale, &customer, store))
            }
            (None, None) => None,
        };

        let transaction = insert_transaction(
            &mut *tx,
            LedgerEntry {
                customer_id: &customer.id,
                kind: TransactionType::Sale,
                amount,
                description: description.to_string(),
                payment_method: Some(PaymentMethod::Account),
                sale_id,
                idempotency_key: None,
            },
            |transaction| {
                receipt.unwrap_or_else(|| ReceiptData::for_transaction(transaction, &customer, store))
            },
        )
        .await?;

        tx.commit().await?;

        info!(customer_id = %customer.id, amount = %amount, "Sale charged to account");
        Ok(transaction)
    }

    /// Current balance of one customer. Positive means the customer owes.
    pub async fn balance(&self, customer_id: &str) -> DbResult<CustomerBalance> {
        let balance = sqlx::query_as::<_, CustomerBalance>(
            r#"
            SELECT customer_id, customer_name, balance_cents, last_movement_at
            FROM customer_balances
            WHERE customer_id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        balance.ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()).into())
    }

    /// Balances of every customer, largest debt first.
    pub async fn balances(&self) -> DbResult<Vec<CustomerBalance>> {
        let balances = sqlx::query_as::<_, CustomerBalance>(
            r#"
            SELECT customer_id, customer_name, balance_cents, last_movement_at
            FROM customer_balances
            ORDER BY balance_cents DESC, customer_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(balances)
    }

    /// Transactions of one customer, newest first.
    pub async fn transactions(&self, customer_id: &str) -> DbResult<Vec<AccountTransaction>> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM account_transactions
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AccountTransaction::from).collect())
    }

    pub async fn get_transaction(&self, id: &str) -> DbResult<Option<AccountTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM account_transactions WHERE id = ?1");
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AccountTransaction::from))
    }

    /// Like [`get_transaction`](Self::get_transaction), but only if it
    /// belongs to `customer_id`.
    pub async fn get_customer_transaction(
        &self,
        customer_id: &str,
        id: &str,
    ) -> DbResult<AccountTransaction> {
        self.get_transaction(id)
            .await?
            .filter(|transaction| transaction.customer_id == customer_id)
            .ok_or_else(|| DbError::not_found("Transaction", id))
    }
}

// =============================================================================
// Tests
// =============================================================================
