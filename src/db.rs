//! Schema setup and the append-only audit trail.
//!
//! All state lives in SQLite; operations take a `&mut Connection` so that
//! multi-write paths can open a real transaction. Money columns are integer
//! cents (`*_cents`), dates are ISO-8601 text.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Create all tables and indexes. Idempotent; safe to call on every open.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS homes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            block       TEXT NOT NULL,
            floor       INTEGER NOT NULL,
            number      TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'vacant',
            rent_cents  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS residents (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL UNIQUE,
            home_id       INTEGER REFERENCES homes(id),
            unit          TEXT,
            contact       TEXT,
            lease_start   TEXT NOT NULL,
            lease_end     TEXT NOT NULL,
            active        INTEGER NOT NULL DEFAULT 1,
            jurisdiction  INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shared_bills (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            amount_cents  INTEGER NOT NULL,
            due_date      TEXT NOT NULL,
            category      TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            distributed   INTEGER NOT NULL DEFAULT 0,
            jurisdiction  INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bills (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            resident_id    INTEGER NOT NULL REFERENCES residents(id),
            shared_bill_id INTEGER REFERENCES shared_bills(id),
            amount_cents   INTEGER NOT NULL,
            penalty_cents  INTEGER NOT NULL DEFAULT 0,
            due_date       TEXT NOT NULL,
            category       TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'pending',
            description    TEXT NOT NULL DEFAULT '',
            jurisdiction   INTEGER NOT NULL,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payments (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id      INTEGER NOT NULL REFERENCES bills(id),
            amount_cents INTEGER NOT NULL,
            paid_on      TEXT NOT NULL,
            method       TEXT NOT NULL,
            reference    TEXT NOT NULL,
            notes        TEXT NOT NULL DEFAULT '',
            screenshot   TEXT,
            status       TEXT NOT NULL DEFAULT 'pending',
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            amount_cents  INTEGER NOT NULL,
            spent_on      TEXT NOT NULL,
            category      TEXT NOT NULL,
            shared        INTEGER NOT NULL DEFAULT 1,
            distributed   INTEGER NOT NULL DEFAULT 0,
            status        TEXT NOT NULL DEFAULT 'pending',
            resident_id   INTEGER REFERENCES residents(id),
            created_by    INTEGER NOT NULL,
            approved_by   INTEGER,
            receipt       TEXT,
            description   TEXT NOT NULL DEFAULT '',
            jurisdiction  INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expense_shares (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            expense_id   INTEGER NOT NULL REFERENCES expenses(id),
            resident_id  INTEGER NOT NULL REFERENCES residents(id),
            share_cents  INTEGER NOT NULL,
            bill_id      INTEGER NOT NULL REFERENCES bills(id),
            created_at   TEXT NOT NULL,
            UNIQUE (expense_id, resident_id)
        );

        CREATE TABLE IF NOT EXISTS complaints (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            resident_id  INTEGER NOT NULL REFERENCES residents(id),
            title        TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            category     TEXT NOT NULL,
            priority     TEXT NOT NULL DEFAULT 'medium',
            status       TEXT NOT NULL DEFAULT 'open',
            assigned_to  INTEGER,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS complaint_updates (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            complaint_id INTEGER NOT NULL REFERENCES complaints(id),
            updated_by   INTEGER NOT NULL,
            comment      TEXT NOT NULL DEFAULT '',
            new_status   TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            resident_id  INTEGER NOT NULL REFERENCES residents(id),
            title        TEXT NOT NULL,
            kind         TEXT NOT NULL,
            file_ref     TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            verified     INTEGER NOT NULL DEFAULT 0,
            verified_by  INTEGER,
            verified_at  TEXT,
            expiry_date  TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS staff (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name    TEXT NOT NULL,
            last_name     TEXT NOT NULL,
            role          TEXT NOT NULL,
            contact       TEXT NOT NULL DEFAULT '',
            active        INTEGER NOT NULL DEFAULT 1,
            joined_on     TEXT NOT NULL,
            salary_cents  INTEGER NOT NULL DEFAULT 0,
            jurisdiction  INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shifts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_id    INTEGER NOT NULL REFERENCES staff(id),
            date        TEXT NOT NULL,
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            notes       TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id    TEXT UNIQUE NOT NULL,
            timestamp   TEXT NOT NULL,
            event_type  TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id   INTEGER NOT NULL,
            data        TEXT NOT NULL,
            actor       INTEGER NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_residents_jurisdiction
            ON residents(jurisdiction, active);
        CREATE INDEX IF NOT EXISTS idx_bills_resident ON bills(resident_id);
        CREATE INDEX IF NOT EXISTS idx_bills_overdue
            ON bills(status, due_date, penalty_cents);
        CREATE INDEX IF NOT EXISTS idx_payments_bill ON payments(bill_id);
        CREATE INDEX IF NOT EXISTS idx_expense_shares_resident
            ON expense_shares(resident_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity
            ON events(entity_type, entity_id);",
    )?;

    Ok(())
}

/// Current timestamp for `created_at`/`updated_at` columns.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Audit-trail entry. State-changing operations record one inside their own
/// transaction, so the trail can never disagree with the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub data: serde_json::Value,
    pub actor: i64,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        data: serde_json::Value,
        actor: i64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            data,
            actor,
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();
    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.timestamp,
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
            now(),
        ],
    )?;
    Ok(())
}

pub fn events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: i64,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;
            Ok(Event {
                event_id: row.get(0)?,
                timestamp: row.get(1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).unwrap_or(serde_json::Value::Null),
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_is_idempotent() {
        let conn = test_conn();
        setup_database(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'bills'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn event_log_round_trip() {
        let conn = test_conn();
        let event = Event::new(
            "bill_distributed",
            "shared_bill",
            7,
            serde_json::json!({ "children": 3 }),
            1,
        );
        insert_event(&conn, &event).unwrap();

        let events = events_for_entity(&conn, "shared_bill", 7).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "bill_distributed");
        assert_eq!(events[0].actor, 1);
        assert_eq!(events[0].data["children"], 3);
    }
}
