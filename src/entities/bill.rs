use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;
use crate::money::Money;

store_enum! {
    /// What a bill (or shared bill) is for. Shared-expense fan-out reuses
    /// the expense category, so the two sets overlap.
    BillCategory {
        Rent => "rent",
        Utilities => "utilities",
        Maintenance => "maintenance",
        Salaries => "salaries",
        Marketing => "marketing",
        Insurance => "insurance",
        Taxes => "taxes",
        SharedExpense => "shared_expense",
        Other => "other",
    }
}

store_enum! {
    /// Settlement state, derived exclusively from the approved-payment sum.
    BillStatus {
        Pending => "pending",
        PartiallyPaid => "partially_paid",
        Paid => "paid",
    }
}

/// A billed amount owed by one resident. Created by a manager, by monthly
/// rent generation, or by distribution of a shared bill/expense. Never
/// deleted; only its status and penalty move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub resident_id: i64,
    /// Set when this bill was fanned out from a shared bill.
    pub shared_bill_id: Option<i64>,
    /// Total currently due, penalty included once accrued.
    pub amount: Money,
    /// One-time late fee; zero until accrual, the accrual guard itself.
    pub penalty: Money,
    pub due_date: NaiveDate,
    pub category: BillCategory,
    pub status: BillStatus,
    pub description: String,
    /// Manager user id responsible for this bill.
    pub jurisdiction: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Amount before the late fee.
    pub fn original_amount(&self) -> Money {
        self.amount - self.penalty
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Bill {
            id: row.get("id")?,
            resident_id: row.get("resident_id")?,
            shared_bill_id: row.get("shared_bill_id")?,
            amount: row.get("amount_cents")?,
            penalty: row.get("penalty_cents")?,
            due_date: row.get("due_date")?,
            category: row.get("category")?,
            status: row.get("status")?,
            description: row.get("description")?,
            jurisdiction: row.get("jurisdiction")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A single amount to be split across the eligible resident cohort.
/// `distributed` flips exactly once, atomically with the child inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedBill {
    pub id: i64,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub category: BillCategory,
    pub description: String,
    pub distributed: bool,
    pub jurisdiction: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedBill {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SharedBill {
            id: row.get("id")?,
            amount: row.get("amount_cents")?,
            due_date: row.get("due_date")?,
            category: row.get("category")?,
            description: row.get("description")?,
            distributed: row.get("distributed")?,
            jurisdiction: row.get("jurisdiction")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
