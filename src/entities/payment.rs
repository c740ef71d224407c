use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;
use crate::money::Money;

store_enum! {
    PaymentMethod {
        Cash => "cash",
        Card => "card",
        BankTransfer => "bank_transfer",
        Other => "other",
    }
}

store_enum! {
    /// Payments enter `pending`; only a manager moves them to
    /// `approved`/`rejected`. Only approved money settles a bill.
    PaymentStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub bill_id: i64,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    /// Generated uuid; external transaction reference.
    pub reference: String,
    pub notes: String,
    /// Opaque file-store reference for a proof-of-payment screenshot.
    pub screenshot: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get("id")?,
            bill_id: row.get("bill_id")?,
            amount: row.get("amount_cents")?,
            paid_on: row.get("paid_on")?,
            method: row.get("method")?,
            reference: row.get("reference")?,
            notes: row.get("notes")?,
            screenshot: row.get("screenshot")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
