use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;
use super::BillCategory;
use crate::money::Money;

store_enum! {
    ExpenseCategory {
        Utilities => "utilities",
        Maintenance => "maintenance",
        Salaries => "salaries",
        Marketing => "marketing",
        Insurance => "insurance",
        Taxes => "taxes",
        Other => "other",
    }
}

impl ExpenseCategory {
    /// Bills generated from an expense carry the expense's category.
    pub fn as_bill_category(&self) -> BillCategory {
        match self {
            ExpenseCategory::Utilities => BillCategory::Utilities,
            ExpenseCategory::Maintenance => BillCategory::Maintenance,
            ExpenseCategory::Salaries => BillCategory::Salaries,
            ExpenseCategory::Marketing => BillCategory::Marketing,
            ExpenseCategory::Insurance => BillCategory::Insurance,
            ExpenseCategory::Taxes => BillCategory::Taxes,
            ExpenseCategory::Other => BillCategory::Other,
        }
    }
}

store_enum! {
    ExpenseStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// A community expense. Shared expenses, once approved, are distributed
/// across the active resident cohort; personal expenses belong to one
/// resident and are never fanned out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub amount: Money,
    pub spent_on: NaiveDate,
    pub category: ExpenseCategory,
    pub shared: bool,
    /// Set exactly once, by the distribution engine.
    pub distributed: bool,
    pub status: ExpenseStatus,
    pub resident_id: Option<i64>,
    pub created_by: i64,
    pub approved_by: Option<i64>,
    /// Opaque file-store reference for the receipt.
    pub receipt: Option<String>,
    pub description: String,
    pub jurisdiction: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Expense {
            id: row.get("id")?,
            amount: row.get("amount_cents")?,
            spent_on: row.get("spent_on")?,
            category: row.get("category")?,
            shared: row.get("shared")?,
            distributed: row.get("distributed")?,
            status: row.get("status")?,
            resident_id: row.get("resident_id")?,
            created_by: row.get("created_by")?,
            approved_by: row.get("approved_by")?,
            receipt: row.get("receipt")?,
            description: row.get("description")?,
            jurisdiction: row.get("jurisdiction")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// One resident's slice of a distributed expense, unique per
/// (expense, resident), linked to the bill it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub id: i64,
    pub expense_id: i64,
    pub resident_id: i64,
    pub amount: Money,
    pub bill_id: i64,
    pub created_at: DateTime<Utc>,
}

impl ExpenseShare {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ExpenseShare {
            id: row.get("id")?,
            expense_id: row.get("expense_id")?,
            resident_id: row.get("resident_id")?,
            amount: row.get("share_cents")?,
            bill_id: row.get("bill_id")?,
            created_at: row.get("created_at")?,
        })
    }
}
