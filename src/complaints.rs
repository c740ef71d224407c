//! Complaints: residents file them, managers move them through the
//! open → in_progress → resolved/closed lifecycle. Every transition is
//! recorded in the `complaint_updates` trail.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db;
use crate::entities::{Complaint, ComplaintCategory, ComplaintPriority, ComplaintStatus,
    ComplaintUpdate};
use crate::error::{Error, Result};
use crate::identity::{AuthUser, Role};
use crate::residents;

const COMPLAINT_COLS: &str = "id, resident_id, title, description, category, priority, \
     status, assigned_to, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
}

/// File a complaint on the caller's own resident record.
pub fn file_complaint(conn: &Connection, user: &AuthUser, new: &NewComplaint) -> Result<Complaint> {
    if user.role != Role::Resident {
        return Err(Error::Authorization("only residents file complaints".into()));
    }
    if new.title.trim().is_empty() {
        return Err(Error::Validation("complaint title must not be empty".into()));
    }
    let resident = residents::resident_by_user(conn, user.id)?;

    let now = db::now();
    conn.execute(
        "INSERT INTO complaints (
            resident_id, title, description, category, priority, status,
            assigned_to, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, 'open', NULL, ?6, ?7)",
        params![resident.id, new.title, new.description, new.category, new.priority, now, now],
    )?;
    let complaint = complaint_by_id(conn, conn.last_insert_rowid())?;
    info!(complaint = complaint.id, resident = resident.id, "complaint filed");
    Ok(complaint)
}

pub fn complaint_by_id(conn: &Connection, id: i64) -> Result<Complaint> {
    conn.query_row(
        &format!("SELECT {COMPLAINT_COLS} FROM complaints WHERE id = ?1"),
        [id],
        |row| Complaint::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("complaint {id}")))
}

fn complaint_in_jurisdiction(conn: &Connection, user: &AuthUser, id: i64) -> Result<Complaint> {
    let complaint = complaint_by_id(conn, id)?;
    let resident = residents::resident_by_id(conn, complaint.resident_id)?;
    if resident.jurisdiction != user.id {
        return Err(Error::NotFound(format!("complaint {id}")));
    }
    Ok(complaint)
}

/// Move a complaint to a new status, appending a trail entry in the same
/// transaction. Closed complaints are terminal.
pub fn update_complaint(
    conn: &mut Connection,
    user: &AuthUser,
    id: i64,
    new_status: ComplaintStatus,
    comment: &str,
    assigned_to: Option<i64>,
) -> Result<Complaint> {
    user.require_manager("update complaints")?;
    let complaint = complaint_in_jurisdiction(conn, user, id)?;
    if complaint.status == ComplaintStatus::Closed {
        return Err(Error::Conflict(format!("complaint {id} is closed")));
    }

    let tx = conn.transaction()?;
    let now = db::now();
    tx.execute(
        "UPDATE complaints
         SET status = ?1, assigned_to = COALESCE(?2, assigned_to), updated_at = ?3
         WHERE id = ?4",
        params![new_status, assigned_to, now, id],
    )?;
    tx.execute(
        "INSERT INTO complaint_updates (complaint_id, updated_by, comment, new_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user.id, comment, new_status, now],
    )?;
    tx.commit()?;

    complaint_by_id(conn, id)
}

/// Trail entries, newest first. Residents may read their own trail,
/// managers the trails under their jurisdiction.
pub fn complaint_trail(
    conn: &Connection,
    user: &AuthUser,
    complaint_id: i64,
) -> Result<Vec<ComplaintUpdate>> {
    let complaint = complaint_by_id(conn, complaint_id)?;
    let resident = residents::resident_by_id(conn, complaint.resident_id)?;
    let visible = match user.role {
        Role::Manager => resident.jurisdiction == user.id,
        Role::Resident => resident.user_id == user.id,
    };
    if !visible {
        return Err(Error::NotFound(format!("complaint {complaint_id}")));
    }

    let mut stmt = conn.prepare(
        "SELECT id, complaint_id, updated_by, comment, new_status, created_at
         FROM complaint_updates
         WHERE complaint_id = ?1
         ORDER BY id DESC",
    )?;
    let updates = stmt
        .query_map([complaint_id], |row| ComplaintUpdate::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::residents::fixtures::community;

    fn leak(conn: &Connection, user: &AuthUser) -> Complaint {
        file_complaint(
            conn,
            user,
            &NewComplaint {
                title: "Water leak in kitchen".into(),
                description: "Dripping since Monday".into(),
                category: ComplaintCategory::Maintenance,
                priority: ComplaintPriority::High,
            },
        )
        .unwrap()
    }

    #[test]
    fn lifecycle_with_trail() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 1);
        let me = AuthUser::resident(100, manager.id);

        let complaint = leak(&conn, &me);
        assert_eq!(complaint.status, ComplaintStatus::Open);

        update_complaint(
            &mut conn,
            &manager,
            complaint.id,
            ComplaintStatus::InProgress,
            "plumber scheduled",
            Some(55),
        )
        .unwrap();
        let resolved = update_complaint(
            &mut conn,
            &manager,
            complaint.id,
            ComplaintStatus::Resolved,
            "fixed",
            None,
        )
        .unwrap();
        assert_eq!(resolved.status, ComplaintStatus::Resolved);
        assert_eq!(resolved.assigned_to, Some(55));

        let trail = complaint_trail(&conn, &me, complaint.id).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].new_status, ComplaintStatus::Resolved);
        assert_eq!(trail[1].comment, "plumber scheduled");
    }

    #[test]
    fn closed_is_terminal() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 1);
        let me = AuthUser::resident(100, manager.id);
        let complaint = leak(&conn, &me);

        update_complaint(&mut conn, &manager, complaint.id, ComplaintStatus::Closed, "", None)
            .unwrap();
        let err = update_complaint(
            &mut conn,
            &manager,
            complaint.id,
            ComplaintStatus::Open,
            "reopen",
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "conflict_error");
    }

    #[test]
    fn managers_cannot_file_and_outsiders_cannot_update() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 1);
        let me = AuthUser::resident(100, manager.id);

        let err = file_complaint(
            &conn,
            &manager,
            &NewComplaint {
                title: "x".into(),
                description: String::new(),
                category: ComplaintCategory::Other,
                priority: ComplaintPriority::Low,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "authorization_error");

        let complaint = leak(&conn, &me);
        let outsider = AuthUser::manager(2);
        let err = update_complaint(
            &mut conn,
            &outsider,
            complaint.id,
            ComplaintStatus::Resolved,
            "",
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "not_found_error");
    }
}
