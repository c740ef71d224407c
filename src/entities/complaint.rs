use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::store_enum;

store_enum! {
    ComplaintCategory {
        Maintenance => "maintenance",
        Noise => "noise",
        Security => "security",
        Cleanliness => "cleanliness",
        Other => "other",
    }
}

store_enum! {
    ComplaintPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

store_enum! {
    ComplaintStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub resident_id: i64,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub status: ComplaintStatus,
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Complaint {
            id: row.get("id")?,
            resident_id: row.get("resident_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            category: row.get("category")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            assigned_to: row.get("assigned_to")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Trail entry written on every complaint status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintUpdate {
    pub id: i64,
    pub complaint_id: i64,
    pub updated_by: i64,
    pub comment: String,
    pub new_status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
}

impl ComplaintUpdate {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ComplaintUpdate {
            id: row.get("id")?,
            complaint_id: row.get("complaint_id")?,
            updated_by: row.get("updated_by")?,
            comment: row.get("comment")?,
            new_status: row.get("new_status")?,
            created_at: row.get("created_at")?,
        })
    }
}
