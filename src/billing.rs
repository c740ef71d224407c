//! Bill, shared-bill, and expense lifecycle operations.
//!
//! Distribution is always an explicit call (see [`crate::distribution`]);
//! nothing here fans out writes from a save path.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::{self, insert_event, Event};
use crate::distribution::{self, DistributionOutcome};
use crate::entities::{
    Bill, BillCategory, Expense, ExpenseCategory, ExpenseStatus, SharedBill,
};
use crate::error::{Error, Result};
use crate::identity::{AuthUser, Role};
use crate::money::Money;
use crate::residents;

pub(crate) const BILL_COLS: &str = "id, resident_id, shared_bill_id, amount_cents, \
     penalty_cents, due_date, category, status, description, jurisdiction, \
     created_at, updated_at";
const SHARED_BILL_COLS: &str =
    "id, amount_cents, due_date, category, description, distributed, jurisdiction, \
     created_at, updated_at";
pub(crate) const EXPENSE_COLS: &str = "id, amount_cents, spent_on, category, shared, \
     distributed, status, resident_id, created_by, approved_by, receipt, description, \
     jurisdiction, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewSharedBill {
    pub amount: Money,
    pub due_date: NaiveDate,
    pub category: BillCategory,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewBill {
    pub resident_id: i64,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub category: BillCategory,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: Money,
    pub spent_on: NaiveDate,
    pub category: ExpenseCategory,
    pub shared: bool,
    /// Required for personal expenses, ignored for shared ones.
    pub resident_id: Option<i64>,
    pub receipt: Option<String>,
    pub description: String,
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "amount must be positive, got {amount}"
        )))
    }
}

/// Create a shared bill under the calling manager's jurisdiction. The bill
/// is not distributed here; call
/// [`distribute_shared_bill`](crate::distribution::distribute_shared_bill)
/// when the cohort should be charged.
pub fn create_shared_bill(
    conn: &Connection,
    user: &AuthUser,
    new: &NewSharedBill,
) -> Result<SharedBill> {
    user.require_manager("create shared bills")?;
    require_positive(new.amount)?;
    let now = db::now();
    conn.execute(
        "INSERT INTO shared_bills (
            amount_cents, due_date, category, description, distributed,
            jurisdiction, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        params![new.amount, new.due_date, new.category, new.description, user.id, now, now],
    )?;
    shared_bill_by_id(conn, conn.last_insert_rowid())
}

pub fn shared_bill_by_id(conn: &Connection, id: i64) -> Result<SharedBill> {
    conn.query_row(
        &format!("SELECT {SHARED_BILL_COLS} FROM shared_bills WHERE id = ?1"),
        [id],
        |row| SharedBill::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("shared bill {id}")))
}

/// Create a single bill for one resident in the caller's jurisdiction.
pub fn create_bill(conn: &Connection, user: &AuthUser, new: &NewBill) -> Result<Bill> {
    user.require_manager("create bills")?;
    require_positive(new.amount)?;
    let resident = residents::resident_by_id(conn, new.resident_id)?;
    if resident.jurisdiction != user.id {
        return Err(Error::NotFound(format!("resident {}", new.resident_id)));
    }
    let id = insert_bill(
        conn,
        resident.id,
        None,
        new.amount,
        new.due_date,
        new.category,
        &new.description,
        user.id,
    )?;
    bill_by_id(conn, id)
}

/// Raw bill insert shared by creation, distribution, and rent generation.
/// Status always starts `pending`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_bill(
    conn: &Connection,
    resident_id: i64,
    shared_bill_id: Option<i64>,
    amount: Money,
    due_date: NaiveDate,
    category: BillCategory,
    description: &str,
    jurisdiction: i64,
) -> rusqlite::Result<i64> {
    let now = db::now();
    conn.execute(
        "INSERT INTO bills (
            resident_id, shared_bill_id, amount_cents, penalty_cents, due_date,
            category, status, description, jurisdiction, created_at, updated_at
         ) VALUES (?1, ?2, ?3, 0, ?4, ?5, 'pending', ?6, ?7, ?8, ?9)",
        params![
            resident_id,
            shared_bill_id,
            amount,
            due_date,
            category,
            description,
            jurisdiction,
            now,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn bill_by_id(conn: &Connection, id: i64) -> Result<Bill> {
    conn.query_row(
        &format!("SELECT {BILL_COLS} FROM bills WHERE id = ?1"),
        [id],
        |row| Bill::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("bill {id}")))
}

/// Like [`bill_by_id`], but a record outside the caller's scope reads as
/// absent rather than forbidden.
pub fn bill_for_user(conn: &Connection, user: &AuthUser, id: i64) -> Result<Bill> {
    let bill = bill_by_id(conn, id)?;
    let visible = match user.role {
        Role::Manager => bill.jurisdiction == user.id,
        Role::Resident => residents::resident_by_user(conn, user.id)
            .map(|r| r.id == bill.resident_id)
            .unwrap_or(false),
    };
    if visible {
        Ok(bill)
    } else {
        Err(Error::NotFound(format!("bill {id}")))
    }
}

/// Generate next month's rent bills: one per active resident with a home
/// whose rent is positive. Idempotent per (resident, due date); with
/// `force`, an existing pending rent bill is re-priced to the current home
/// rent instead of being skipped. Bills are never deleted.
pub fn generate_monthly_rent(
    conn: &mut Connection,
    user: &AuthUser,
    due_date: NaiveDate,
    force: bool,
) -> Result<Vec<Bill>> {
    user.require_manager("generate rent bills")?;
    let tx = conn.transaction()?;

    let mut created = Vec::new();
    let cohort = distribution::eligible_residents(&tx, user.id)?;
    for resident in &cohort {
        let Some(home_id) = resident.home_id else {
            continue;
        };
        let home = residents::home_by_id(&tx, home_id)?;
        if !home.rent.is_positive() {
            continue;
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM bills
                 WHERE resident_id = ?1 AND category = 'rent' AND due_date = ?2",
                params![resident.id, due_date],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(bill_id) if force => {
                tx.execute(
                    "UPDATE bills SET amount_cents = ?1 + penalty_cents, updated_at = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    params![home.rent, db::now(), bill_id],
                )?;
            }
            Some(_) => {}
            None => {
                let description = format!(
                    "Monthly rent for {} - {}",
                    home.label(),
                    due_date.format("%B %Y")
                );
                let bill_id = insert_bill(
                    &tx,
                    resident.id,
                    None,
                    home.rent,
                    due_date,
                    BillCategory::Rent,
                    &description,
                    user.id,
                )?;
                created.push(bill_by_id(&tx, bill_id)?);
            }
        }
    }

    if !created.is_empty() {
        insert_event(
            &tx,
            &Event::new(
                "rent_bills_generated",
                "jurisdiction",
                user.id,
                serde_json::json!({
                    "due_date": due_date.to_string(),
                    "bills": created.len(),
                }),
                user.id,
            ),
        )?;
    }
    tx.commit()?;

    info!(bills = created.len(), %due_date, "monthly rent generation finished");
    Ok(created)
}

/// Record an expense. Shared expenses belong to the whole cohort; personal
/// expenses must name their resident. Residents may only file personal
/// expenses against their own record.
pub fn create_expense(conn: &Connection, user: &AuthUser, new: &NewExpense) -> Result<Expense> {
    require_positive(new.amount)?;

    let resident_id = if new.shared {
        user.require_manager("create shared expenses")?;
        None
    } else {
        let resident_id = new
            .resident_id
            .ok_or_else(|| Error::Validation("personal expense requires a resident".into()))?;
        let resident = residents::resident_by_id(conn, resident_id)?;
        match user.role {
            Role::Manager if resident.jurisdiction == user.id => {}
            Role::Resident if resident.user_id == user.id => {}
            _ => return Err(Error::Authorization(
                "expenses may only be filed for your own record".into(),
            )),
        }
        Some(resident_id)
    };

    let now = db::now();
    conn.execute(
        "INSERT INTO expenses (
            amount_cents, spent_on, category, shared, distributed, status,
            resident_id, created_by, approved_by, receipt, description,
            jurisdiction, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, 0, 'pending', ?5, ?6, NULL, ?7, ?8, ?9, ?10, ?11)",
        params![
            new.amount,
            new.spent_on,
            new.category,
            new.shared,
            resident_id,
            user.id,
            new.receipt,
            new.description,
            user.jurisdiction,
            now,
            now,
        ],
    )?;
    expense_by_id(conn, conn.last_insert_rowid())
}

pub fn expense_by_id(conn: &Connection, id: i64) -> Result<Expense> {
    conn.query_row(
        &format!("SELECT {EXPENSE_COLS} FROM expenses WHERE id = ?1"),
        [id],
        |row| Expense::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("expense {id}")))
}

/// Approve a pending expense. Approval of a shared expense explicitly
/// triggers distribution; the outcome is returned alongside the expense.
pub fn approve_expense(
    conn: &mut Connection,
    user: &AuthUser,
    id: i64,
) -> Result<(Expense, Option<DistributionOutcome>)> {
    let expense = set_expense_status(conn, user, id, ExpenseStatus::Approved)?;
    let outcome = if expense.shared {
        Some(distribution::distribute_expense(conn, user, id)?)
    } else {
        None
    };
    Ok((expense_by_id(conn, id)?, outcome))
}

pub fn reject_expense(conn: &mut Connection, user: &AuthUser, id: i64) -> Result<Expense> {
    set_expense_status(conn, user, id, ExpenseStatus::Rejected)
}

fn set_expense_status(
    conn: &Connection,
    user: &AuthUser,
    id: i64,
    status: ExpenseStatus,
) -> Result<Expense> {
    user.require_manager("review expenses")?;
    let expense = expense_by_id(conn, id)?;
    if expense.jurisdiction != user.id {
        return Err(Error::NotFound(format!("expense {id}")));
    }
    if expense.status != ExpenseStatus::Pending {
        return Err(Error::Conflict(format!(
            "expense {id} already {}",
            expense.status
        )));
    }
    conn.execute(
        "UPDATE expenses SET status = ?1, approved_by = ?2, updated_at = ?3 WHERE id = ?4",
        params![status, user.id, db::now(), id],
    )?;
    expense_by_id(conn, id)
}
