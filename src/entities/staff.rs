use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A staff member on the community roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub contact: String,
    pub active: bool,
    pub joined_on: NaiveDate,
    pub salary: Money,
    pub jurisdiction: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Staff {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            role: row.get("role")?,
            contact: row.get("contact")?,
            active: row.get("active")?,
            joined_on: row.get("joined_on")?,
            salary: row.get("salary_cents")?,
            jurisdiction: row.get("jurisdiction")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// One scheduled shift. Overlapping shifts for the same staff member and
/// date are rejected at insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub staff_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Shift {
            id: row.get("id")?,
            staff_id: row.get("staff_id")?,
            date: row.get("date")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }
}
