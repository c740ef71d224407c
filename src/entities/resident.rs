use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A resident record, linked one-to-one with an auth user id and optionally
/// to a home. Eligibility for distribution = `active` and same jurisdiction
/// as the parent obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    pub id: i64,
    pub user_id: i64,
    pub home_id: Option<i64>,
    pub unit: Option<String>,
    pub contact: Option<String>,
    pub lease_start: NaiveDate,
    pub lease_end: NaiveDate,
    pub active: bool,
    /// Manager user id responsible for this resident.
    pub jurisdiction: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resident {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Resident {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            home_id: row.get("home_id")?,
            unit: row.get("unit")?,
            contact: row.get("contact")?,
            lease_start: row.get("lease_start")?,
            lease_end: row.get("lease_end")?,
            active: row.get("active")?,
            jurisdiction: row.get("jurisdiction")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
