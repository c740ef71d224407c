use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;

store_enum! {
    DocumentKind {
        Lease => "lease",
        Id => "id",
        Income => "income",
        Insurance => "insurance",
        Other => "other",
    }
}

/// A resident-supplied document. The file itself lives in the file store;
/// only its opaque reference is persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub resident_id: i64,
    pub title: String,
    pub kind: DocumentKind,
    pub file_ref: String,
    pub description: String,
    pub verified: bool,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Document {
            id: row.get("id")?,
            resident_id: row.get("resident_id")?,
            title: row.get("title")?,
            kind: row.get("kind")?,
            file_ref: row.get("file_ref")?,
            description: row.get("description")?,
            verified: row.get("verified")?,
            verified_by: row.get("verified_by")?,
            verified_at: row.get("verified_at")?,
            expiry_date: row.get("expiry_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
