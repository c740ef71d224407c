//! Staff roster and shift scheduling.
//!
//! Shifts for one staff member on one date must not overlap; two shifts
//! collide when one starts before the other ends and vice versa.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db;
use crate::entities::{Shift, Staff};
use crate::error::{Error, Result};
use crate::identity::AuthUser;
use crate::money::Money;

const STAFF_COLS: &str = "id, first_name, last_name, role, contact, active, joined_on, \
     salary_cents, jurisdiction, created_at, updated_at";

const SHIFT_COLS: &str = "id, staff_id, date, start_time, end_time, notes, created_at";

#[derive(Debug, Clone)]
pub struct NewStaff {
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub contact: String,
    pub joined_on: NaiveDate,
    pub salary: Money,
}

pub fn add_staff(conn: &Connection, user: &AuthUser, new: &NewStaff) -> Result<Staff> {
    user.require_manager("manage staff")?;
    if new.first_name.trim().is_empty() || new.last_name.trim().is_empty() {
        return Err(Error::Validation("staff name must not be empty".into()));
    }
    if new.salary.cents() < 0 {
        return Err(Error::Validation("salary must not be negative".into()));
    }

    let now = db::now();
    conn.execute(
        "INSERT INTO staff (
            first_name, last_name, role, contact, active, joined_on,
            salary_cents, jurisdiction, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.first_name,
            new.last_name,
            new.role,
            new.contact,
            new.joined_on,
            new.salary,
            user.id,
            now,
            now,
        ],
    )?;
    let staff = staff_by_id(conn, conn.last_insert_rowid())?;
    info!(staff = staff.id, role = %staff.role, "staff member added");
    Ok(staff)
}

pub fn staff_by_id(conn: &Connection, id: i64) -> Result<Staff> {
    conn.query_row(
        &format!("SELECT {STAFF_COLS} FROM staff WHERE id = ?1"),
        [id],
        |row| Staff::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("staff {id}")))
}

pub fn list_staff(conn: &Connection, user: &AuthUser) -> Result<Vec<Staff>> {
    user.require_manager("view the staff roster")?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAFF_COLS} FROM staff WHERE jurisdiction = ?1 ORDER BY last_name, first_name"
    ))?;
    let staff = stmt
        .query_map([user.id], |row| Staff::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(staff)
}

fn staff_in_jurisdiction(conn: &Connection, user: &AuthUser, id: i64) -> Result<Staff> {
    let staff = staff_by_id(conn, id)?;
    if staff.jurisdiction != user.id {
        return Err(Error::NotFound(format!("staff {id}")));
    }
    Ok(staff)
}

/// Schedule a shift. Rejects inverted time ranges and any overlap with an
/// existing shift for the same staff member on the same date.
pub fn add_shift(
    conn: &mut Connection,
    user: &AuthUser,
    staff_id: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    notes: &str,
) -> Result<Shift> {
    user.require_manager("schedule shifts")?;
    if end_time <= start_time {
        return Err(Error::Validation(format!(
            "shift must end after it starts ({start_time}..{end_time})"
        )));
    }
    let staff = staff_in_jurisdiction(conn, user, staff_id)?;
    if !staff.active {
        return Err(Error::Conflict(format!("staff {staff_id} is inactive")));
    }

    // The overlap check and insert must see the same schedule.
    let tx = conn.transaction()?;
    let clash: Option<i64> = tx
        .query_row(
            "SELECT id FROM shifts
             WHERE staff_id = ?1 AND date = ?2 AND start_time < ?3 AND end_time > ?4
             LIMIT 1",
            params![staff_id, date, end_time, start_time],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing) = clash {
        return Err(Error::Conflict(format!(
            "shift overlaps existing shift {existing} for staff {staff_id} on {date}"
        )));
    }
    tx.execute(
        "INSERT INTO shifts (staff_id, date, start_time, end_time, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![staff_id, date, start_time, end_time, notes, db::now()],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    shift_by_id(conn, id)
}

pub fn shift_by_id(conn: &Connection, id: i64) -> Result<Shift> {
    conn.query_row(
        &format!("SELECT {SHIFT_COLS} FROM shifts WHERE id = ?1"),
        [id],
        |row| Shift::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("shift {id}")))
}

/// Shifts for one date across the caller's roster, ordered by start time.
pub fn list_shifts(conn: &Connection, user: &AuthUser, date: NaiveDate) -> Result<Vec<Shift>> {
    user.require_manager("view the schedule")?;
    let mut stmt = conn.prepare(
        "SELECT s.id, s.staff_id, s.date, s.start_time, s.end_time, s.notes, s.created_at
         FROM shifts s
         JOIN staff ON staff.id = s.staff_id
         WHERE s.date = ?1 AND staff.jurisdiction = ?2
         ORDER BY s.start_time, s.id",
    )?;
    let shifts = stmt
        .query_map(params![date, user.id], |row| Shift::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(shifts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn guard(conn: &Connection, manager: &AuthUser) -> Staff {
        add_staff(
            conn,
            manager,
            &NewStaff {
                first_name: "Pat".into(),
                last_name: "Serrano".into(),
                role: "security".into(),
                contact: "pat@example.com".into(),
                joined_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                salary: Money::parse("1200.00").unwrap(),
            },
        )
        .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn overlapping_shifts_rejected() {
        let mut conn = test_conn();
        let manager = AuthUser::manager(1);
        let staff = guard(&conn, &manager);
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        add_shift(&mut conn, &manager, staff.id, day, t(8, 0), t(16, 0), "").unwrap();

        let err = add_shift(&mut conn, &manager, staff.id, day, t(15, 0), t(23, 0), "")
            .unwrap_err();
        assert_eq!(err.kind(), "conflict_error");

        // Back to back is fine, as is the same window on another day.
        add_shift(&mut conn, &manager, staff.id, day, t(16, 0), t(23, 0), "").unwrap();
        let next = day.succ_opt().unwrap();
        add_shift(&mut conn, &manager, staff.id, next, t(8, 0), t(16, 0), "").unwrap();

        let shifts = list_shifts(&conn, &manager, day).unwrap();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].start_time, t(8, 0));
    }

    #[test]
    fn inverted_range_rejected() {
        let mut conn = test_conn();
        let manager = AuthUser::manager(1);
        let staff = guard(&conn, &manager);
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let err =
            add_shift(&mut conn, &manager, staff.id, day, t(16, 0), t(8, 0), "").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn roster_scoped_to_jurisdiction() {
        let mut conn = test_conn();
        let manager = AuthUser::manager(1);
        let staff = guard(&conn, &manager);

        let outsider = AuthUser::manager(2);
        assert!(list_staff(&conn, &outsider).unwrap().is_empty());
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let err = add_shift(&mut conn, &outsider, staff.id, day, t(8, 0), t(12, 0), "")
            .unwrap_err();
        assert_eq!(err.kind(), "not_found_error");

        let resident = AuthUser::resident(100, manager.id);
        let err = list_staff(&conn, &resident).unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }
}
