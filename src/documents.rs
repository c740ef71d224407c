//! Resident documents: upload via the file store, manager verification.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::{self, insert_event, Event};
use crate::entities::{Document, DocumentKind};
use crate::error::{Error, Result};
use crate::files::FileStore;
use crate::identity::{AuthUser, Role};
use crate::residents;

const DOCUMENT_COLS: &str = "id, resident_id, title, kind, file_ref, description, \
     verified, verified_by, verified_at, expiry_date, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Required when a manager uploads on a resident's behalf; residents
    /// always upload to their own record.
    pub resident_id: Option<i64>,
    pub title: String,
    pub kind: DocumentKind,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub description: String,
    pub expiry_date: Option<NaiveDate>,
}

pub fn upload_document(
    conn: &Connection,
    user: &AuthUser,
    store: &dyn FileStore,
    new: &NewDocument,
) -> Result<Document> {
    if new.title.trim().is_empty() {
        return Err(Error::Validation("document title must not be empty".into()));
    }

    let resident = match user.role {
        Role::Resident => residents::resident_by_user(conn, user.id)?,
        Role::Manager => {
            let resident_id = new.resident_id.ok_or_else(|| {
                Error::Validation("manager upload requires a resident".into())
            })?;
            let resident = residents::resident_by_id(conn, resident_id)?;
            if resident.jurisdiction != user.id {
                return Err(Error::NotFound(format!("resident {resident_id}")));
            }
            resident
        }
    };

    let file_ref = store.store(&new.filename, &new.bytes)?;
    let now = db::now();
    conn.execute(
        "INSERT INTO documents (
            resident_id, title, kind, file_ref, description, verified,
            verified_by, verified_at, expiry_date, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, NULL, ?6, ?7, ?8)",
        params![
            resident.id,
            new.title,
            new.kind,
            file_ref,
            new.description,
            new.expiry_date,
            now,
            now,
        ],
    )?;
    document_by_id(conn, conn.last_insert_rowid())
}

pub fn document_by_id(conn: &Connection, id: i64) -> Result<Document> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLS} FROM documents WHERE id = ?1"),
        [id],
        |row| Document::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("document {id}")))
}

/// Mark a document verified. Records who verified it and when, plus an
/// audit event, in one transaction.
pub fn verify_document(conn: &mut Connection, user: &AuthUser, id: i64) -> Result<Document> {
    user.require_manager("verify documents")?;
    let document = document_by_id(conn, id)?;
    let resident = residents::resident_by_id(conn, document.resident_id)?;
    if resident.jurisdiction != user.id {
        return Err(Error::NotFound(format!("document {id}")));
    }
    if document.verified {
        return Err(Error::Conflict(format!("document {id} already verified")));
    }

    let tx = conn.transaction()?;
    let now = db::now();
    tx.execute(
        "UPDATE documents SET verified = 1, verified_by = ?1, verified_at = ?2, updated_at = ?2
         WHERE id = ?3",
        params![user.id, now, id],
    )?;
    insert_event(
        &tx,
        &Event::new(
            "document_verified",
            "document",
            id,
            serde_json::json!({ "resident_id": document.resident_id }),
            user.id,
        ),
    )?;
    tx.commit()?;

    info!(document = id, "document verified");
    document_by_id(conn, id)
}
