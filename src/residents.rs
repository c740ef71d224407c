//! Homes and resident records: the roster the billing engines run against.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db;
use crate::entities::{Home, HomeStatus, Resident};
use crate::error::{Error, Result};
use crate::identity::AuthUser;
use crate::money::Money;

const HOME_COLS: &str = "id, block, floor, number, status, rent_cents, created_at, updated_at";
const RESIDENT_COLS: &str = "id, user_id, home_id, unit, contact, lease_start, lease_end, \
     active, jurisdiction, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewHome {
    pub block: String,
    pub floor: i64,
    pub number: String,
    pub status: HomeStatus,
    pub rent: Money,
}

#[derive(Debug, Clone)]
pub struct NewResident {
    pub user_id: i64,
    pub home_id: Option<i64>,
    pub unit: Option<String>,
    pub contact: Option<String>,
    pub lease_start: NaiveDate,
    pub lease_end: NaiveDate,
}

pub fn add_home(conn: &Connection, user: &AuthUser, new: &NewHome) -> Result<Home> {
    user.require_manager("register homes")?;
    let now = db::now();
    conn.execute(
        "INSERT INTO homes (block, floor, number, status, rent_cents, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![new.block, new.floor, new.number, new.status, new.rent, now, now],
    )?;
    home_by_id(conn, conn.last_insert_rowid())
}

pub fn home_by_id(conn: &Connection, id: i64) -> Result<Home> {
    conn.query_row(
        &format!("SELECT {HOME_COLS} FROM homes WHERE id = ?1"),
        [id],
        |row| Home::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("home {id}")))
}

/// Register a resident under the calling manager's jurisdiction.
pub fn add_resident(conn: &Connection, user: &AuthUser, new: &NewResident) -> Result<Resident> {
    user.require_manager("register residents")?;
    if new.lease_end < new.lease_start {
        return Err(Error::Validation(
            "lease_end precedes lease_start".to_string(),
        ));
    }
    if let Some(home_id) = new.home_id {
        // Fails early with NotFound instead of a raw FK violation.
        home_by_id(conn, home_id)?;
    }
    let now = db::now();
    conn.execute(
        "INSERT INTO residents (
            user_id, home_id, unit, contact, lease_start, lease_end,
            active, jurisdiction, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9)",
        params![
            new.user_id,
            new.home_id,
            new.unit,
            new.contact,
            new.lease_start,
            new.lease_end,
            user.id,
            now,
            now,
        ],
    )?;
    let resident = resident_by_id(conn, conn.last_insert_rowid())?;
    info!(resident = resident.id, jurisdiction = user.id, "resident registered");
    Ok(resident)
}

pub fn resident_by_id(conn: &Connection, id: i64) -> Result<Resident> {
    conn.query_row(
        &format!("SELECT {RESIDENT_COLS} FROM residents WHERE id = ?1"),
        [id],
        |row| Resident::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("resident {id}")))
}

pub fn resident_by_user(conn: &Connection, user_id: i64) -> Result<Resident> {
    conn.query_row(
        &format!("SELECT {RESIDENT_COLS} FROM residents WHERE user_id = ?1"),
        [user_id],
        |row| Resident::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("resident for user {user_id}")))
}

/// Deactivated residents keep their history but drop out of every future
/// distribution cohort.
pub fn deactivate_resident(conn: &Connection, user: &AuthUser, id: i64) -> Result<Resident> {
    user.require_manager("deactivate residents")?;
    let changed = conn.execute(
        "UPDATE residents SET active = 0, updated_at = ?1
         WHERE id = ?2 AND jurisdiction = ?3",
        params![db::now(), id, user.id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("resident {id}")));
    }
    resident_by_id(conn, id)
}

pub fn list_residents(conn: &Connection, user: &AuthUser) -> Result<Vec<Resident>> {
    user.require_manager("list the resident roster")?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESIDENT_COLS} FROM residents WHERE jurisdiction = ?1 ORDER BY id"
    ))?;
    let residents = stmt
        .query_map([user.id], |row| Resident::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(residents)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    #[test]
    fn register_and_fetch_resident() {
        let conn = test_conn();
        let (manager, residents) = fixtures::community(&conn, 2);
        assert_eq!(residents.len(), 2);

        let found = resident_by_user(&conn, 100).unwrap();
        assert_eq!(found.id, residents[0].id);
        assert!(found.active);
        assert_eq!(found.jurisdiction, manager.id);
    }

    #[test]
    fn resident_cannot_register_residents() {
        let conn = test_conn();
        let user = AuthUser::resident(5, 1);
        let err = add_resident(
            &conn,
            &user,
            &NewResident {
                user_id: 6,
                home_id: None,
                unit: None,
                contact: None,
                lease_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                lease_end: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }

    #[test]
    fn lease_dates_validated() {
        let conn = test_conn();
        let manager = AuthUser::manager(1);
        let err = add_resident(
            &conn,
            &manager,
            &NewResident {
                user_id: 7,
                home_id: None,
                unit: None,
                contact: None,
                lease_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                lease_end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn deactivation_scoped_to_jurisdiction() {
        let conn = test_conn();
        let (_, residents) = fixtures::community(&conn, 1);
        let other_manager = AuthUser::manager(2);
        let err = deactivate_resident(&conn, &other_manager, residents[0].id).unwrap_err();
        assert_eq!(err.kind(), "not_found_error");

        let manager = AuthUser::manager(1);
        let updated = deactivate_resident(&conn, &manager, residents[0].id).unwrap();
        assert!(!updated.active);
    }
}
