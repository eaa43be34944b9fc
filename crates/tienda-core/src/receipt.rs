//! # Receipt View Model
//!
//! [`ReceiptData`] is the one normalized shape every receipt is drawn from.
//! It is built once per record by the caller and doubles as the frozen
//! snapshot stored on ledger rows, so a receipt printed today and one
//! regenerated next year from the snapshot are identical.
//!
//! ## Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LocalSale ──────────────┐                                              │
//! │                          ├──► ReceiptData ──► tienda-receipt ──► PNG    │
//! │  AccountTransaction ─────┤        ▲                                     │
//! │    + Customer            │        │                                     │
//! │                          │   stored snapshot (preferred when present)   │
//! │  StoreProfile ───────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All text, including the formatted local date, is resolved here so the
//! renderer never looks at clocks, time zones or store settings.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{AccountTransaction, Customer, LocalSale, Percentage, TransactionType};

/// Length of the id prefix used in receipt titles and file names.
pub const SHORT_ID_LEN: usize = 8;

// =============================================================================
// Store Profile
// =============================================================================

/// Store details printed on every receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub name: String,
    pub site_url: String,
    pub thank_you: String,
    /// Offset from UTC used to print local dates, in minutes.
    pub utc_offset_minutes: i32,
}

impl StoreProfile {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// `19/10/2026 14:05` in the store's local time.
    pub fn format_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset())
            .format("%d/%m/%Y %H:%M")
            .to_string()
    }
}

// =============================================================================
// Receipt Data
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    Sale,
    Payment,
}

impl ReceiptKind {
    /// Word used in the download file name.
    pub fn file_tag(&self) -> &'static str {
        match self {
            ReceiptKind::Sale => "venta",
            ReceiptKind::Payment => "pago",
        }
    }

    /// Document type printed under the store name.
    pub fn document_label(&self) -> &'static str {
        match self {
            ReceiptKind::Sale => "COMPROBANTE DE VENTA",
            ReceiptKind::Payment => "COMPROBANTE DE PAGO",
        }
    }
}

/// One printed sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLine {
    /// `Remera Lisa (M) x3`
    pub description: String,
    pub amount_cents: i64,
    /// Present only when the line carried a discount.
    pub discount: Option<ReceiptLineDiscount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLineDiscount {
    pub rate: Percentage,
    pub amount_cents: i64,
}

/// Record-specific body of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReceiptBody {
    Sale {
        lines: Vec<ReceiptLine>,
        subtotal_cents: i64,
        discount_cents: i64,
        payment_method: String,
    },
    Payment {
        payment_method: String,
        description: String,
    },
}

/// Everything needed to draw a receipt, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptData {
    pub kind: ReceiptKind,
    pub record_id: String,
    /// Sale number or short id, printed in the header.
    pub reference: String,
    pub store_name: String,
    pub site_url: String,
    pub thank_you: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    /// Local date, already formatted.
    pub date: String,
    pub body: ReceiptBody,
    pub total_cents: i64,
}

impl ReceiptData {
    /// Builds the receipt for a register sale.
    pub fn for_sale(sale: &LocalSale, store: &StoreProfile) -> Self {
        let lines = sale
            .items
            .iter()
            .map(|line| {
                let label = match &line.size {
                    Some(size) => format!("{} ({})", line.name, size),
                    None => line.name.clone(),
                };
                ReceiptLine {
                    description: format!("{} x{}", label, line.quantity),
                    amount_cents: line.subtotal_cents,
                    discount: line.discount.map(|rate| ReceiptLineDiscount {
                        rate,
                        amount_cents: line.discount_amount().cents(),
                    }),
                }
            })
            .collect();

        ReceiptData {
            kind: ReceiptKind::Sale,
            record_id: sale.id.clone(),
            reference: sale.sale_number.clone(),
            store_name: store.name.clone(),
            site_url: store.site_url.clone(),
            thank_you: store.thank_you.clone(),
            customer_name: sale.customer.name.clone(),
            customer_email: sale.customer.email.clone(),
            date: store.format_date(sale.created_at),
            body: ReceiptBody::Sale {
                lines,
                subtotal_cents: sale.subtotal_cents,
                discount_cents: sale.discount_cents,
                payment_method: sale.payment_method.label().to_string(),
            },
            total_cents: sale.total_cents,
        }
    }

    /// Receipt for an account charge that points at a register sale: the
    /// sale's own receipt, with the account holder filled in where the
    /// sale left the customer blank.
    pub fn for_account_sale(sale: &LocalSale, customer: &Customer, store: &StoreProfile) -> Self {
        let mut data = Self::for_sale(sale, store);
        if data.customer_name.is_none() {
            data.customer_name = Some(customer.name.clone());
        }
        if data.customer_email.is_none() {
            data.customer_email = customer.email.clone();
        }
        data
    }

    /// Builds the receipt for a running-tab transaction with no sale lines
    /// behind it. Charges are titled as sales, payments as payments.
    pub fn for_transaction(
        tx: &AccountTransaction,
        customer: &Customer,
        store: &StoreProfile,
    ) -> Self {
        let method = tx
            .payment_method
            .map(|m| m.label().to_string())
            .unwrap_or_else(|| "Cuenta corriente".to_string());

        let kind = match tx.kind {
            TransactionType::Sale => ReceiptKind::Sale,
            TransactionType::Payment => ReceiptKind::Payment,
        };

        ReceiptData {
            kind,
            record_id: tx.id.clone(),
            reference: short_id(&tx.id).to_string(),
            store_name: store.name.clone(),
            site_url: store.site_url.clone(),
            thank_you: store.thank_you.clone(),
            customer_name: Some(customer.name.clone()),
            customer_email: customer.email.clone(),
            date: store.format_date(tx.created_at),
            body: ReceiptBody::Payment {
                payment_method: method,
                description: tx.description.clone(),
            },
            total_cents: tx.amount_cents.abs(),
        }
    }

    /// Number of sale lines (zero for payments).
    pub fn line_count(&self) -> usize {
        match &self.body {
            ReceiptBody::Sale { lines, .. } => lines.len(),
            ReceiptBody::Payment { .. } => 0,
        }
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Download name: `comprobante-venta-1a2b3c4d.png`.
    pub fn file_name(&self) -> String {
        format!(
            "comprobante-{}-{}.png",
            self.kind.file_tag(),
            short_id(&self.record_id)
        )
    }
}

/// First [`SHORT_ID_LEN`] characters of an id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
