use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;
use crate::money::Money;

store_enum! {
    HomeStatus {
        Vacant => "vacant",
        Occupied => "occupied",
        Maintenance => "maintenance",
    }
}

/// A unit in the community. `rent` drives monthly rent bill generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Home {
    pub id: i64,
    pub block: String,
    pub floor: i64,
    pub number: String,
    pub status: HomeStatus,
    pub rent: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Home {
    /// Human label, e.g. "A-3-101".
    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.block, self.floor, self.number)
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Home {
            id: row.get("id")?,
            block: row.get("block")?,
            floor: row.get("floor")?,
            number: row.get("number")?,
            status: row.get("status")?,
            rent: row.get("rent_cents")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
