//! Listing operations: visibility scope first, request filters second.
//!
//! Every query here starts from the caller's [`VisibilityPolicy`]
//! predicate; filters only ever narrow that scope further.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::billing::{BILL_COLS, EXPENSE_COLS};
use crate::entities::{
    Bill, BillCategory, BillStatus, Complaint, ComplaintCategory, ComplaintPriority,
    ComplaintStatus, Document, DocumentKind, Expense, ExpenseCategory, ExpenseShare,
    ExpenseStatus, Payment, PaymentMethod, PaymentStatus,
};
use crate::error::{Error, Result};
use crate::identity::{AuthUser, Role};
use crate::payments::PAYMENT_COLS;
use crate::penalty;
use crate::visibility::policy_for;

#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub category: Option<BillCategory>,
    pub status: Option<BillStatus>,
    pub shared_bill_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub paid_from: Option<NaiveDate>,
    pub paid_to: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    pub bill_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub spent_from: Option<NaiveDate>,
    pub spent_to: Option<NaiveDate>,
    pub category: Option<ExpenseCategory>,
    pub status: Option<ExpenseStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub category: Option<ComplaintCategory>,
    pub priority: Option<ComplaintPriority>,
    pub status: Option<ComplaintStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub verified: Option<bool>,
}

fn date_param(date: NaiveDate) -> Value {
    // Matches chrono's rusqlite storage format for NaiveDate.
    Value::Text(date.format("%Y-%m-%d").to_string())
}

fn text_param(s: &str) -> Value {
    Value::Text(s.to_string())
}

struct QueryBuilder {
    sql: String,
    params: Vec<Value>,
}

impl QueryBuilder {
    fn scoped(select: &str, clause: &str, scope_params: &[i64]) -> Self {
        QueryBuilder {
            sql: format!("{select} WHERE {clause}"),
            params: scope_params.iter().map(|&p| Value::Integer(p)).collect(),
        }
    }

    fn filter(&mut self, fragment: &str, value: Value) {
        self.sql.push_str(" AND ");
        self.sql.push_str(fragment);
        self.params.push(value);
    }

    fn order(mut self, clause: &str) -> Self {
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(clause);
        self
    }

    fn run<T, F>(self, conn: &Connection, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = conn.prepare(&self.sql)?;
        let rows = stmt
            .query_map(params_from_iter(self.params), map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// List bills visible to the caller. The penalty-accrual pass (one-time
/// late fees on overdue pending bills) runs first, matching the contract
/// that overdue fees appear on read.
pub fn list_bills(
    conn: &mut Connection,
    user: &AuthUser,
    filter: &BillFilter,
    today: NaiveDate,
) -> Result<Vec<Bill>> {
    penalty::accrue_penalties(conn, today)?;

    let scope = policy_for(user.role).bills(user);
    let mut q = QueryBuilder::scoped(
        &format!("SELECT {BILL_COLS} FROM bills b"),
        scope.clause,
        &scope.params,
    );
    if let Some(from) = filter.due_from {
        q.filter("b.due_date >= ?", date_param(from));
    }
    if let Some(to) = filter.due_to {
        q.filter("b.due_date <= ?", date_param(to));
    }
    if let Some(category) = filter.category {
        q.filter("b.category = ?", text_param(category.as_str()));
    }
    if let Some(status) = filter.status {
        q.filter("b.status = ?", text_param(status.as_str()));
    }
    if let Some(id) = filter.shared_bill_id {
        q.filter("b.shared_bill_id = ?", Value::Integer(id));
    }
    q.order("b.created_at DESC, b.id DESC")
        .run(conn, |row| Bill::from_row(row))
}

pub fn list_payments(
    conn: &Connection,
    user: &AuthUser,
    filter: &PaymentFilter,
) -> Result<Vec<Payment>> {
    let scope = policy_for(user.role).payments(user);
    let mut q = QueryBuilder::scoped(
        &format!("SELECT {PAYMENT_COLS} FROM payments p"),
        scope.clause,
        &scope.params,
    );
    if let Some(from) = filter.paid_from {
        q.filter("p.paid_on >= ?", date_param(from));
    }
    if let Some(to) = filter.paid_to {
        q.filter("p.paid_on <= ?", date_param(to));
    }
    if let Some(method) = filter.method {
        q.filter("p.method = ?", text_param(method.as_str()));
    }
    if let Some(status) = filter.status {
        q.filter("p.status = ?", text_param(status.as_str()));
    }
    if let Some(bill_id) = filter.bill_id {
        q.filter("p.bill_id = ?", Value::Integer(bill_id));
    }
    q.order("p.paid_on DESC, p.id DESC")
        .run(conn, |row| Payment::from_row(row))
}

pub fn list_expenses(
    conn: &Connection,
    user: &AuthUser,
    filter: &ExpenseFilter,
) -> Result<Vec<Expense>> {
    let scope = policy_for(user.role).expenses(user);
    let mut q = QueryBuilder::scoped(
        &format!("SELECT {EXPENSE_COLS} FROM expenses e"),
        scope.clause,
        &scope.params,
    );
    if let Some(from) = filter.spent_from {
        q.filter("e.spent_on >= ?", date_param(from));
    }
    if let Some(to) = filter.spent_to {
        q.filter("e.spent_on <= ?", date_param(to));
    }
    if let Some(category) = filter.category {
        q.filter("e.category = ?", text_param(category.as_str()));
    }
    if let Some(status) = filter.status {
        q.filter("e.status = ?", text_param(status.as_str()));
    }
    q.order("e.spent_on DESC, e.id DESC")
        .run(conn, |row| Expense::from_row(row))
}

pub fn list_complaints(
    conn: &Connection,
    user: &AuthUser,
    filter: &ComplaintFilter,
) -> Result<Vec<Complaint>> {
    let scope = policy_for(user.role).complaints(user);
    let mut q = QueryBuilder::scoped(
        "SELECT id, resident_id, title, description, category, priority, status, \
         assigned_to, created_at, updated_at FROM complaints c",
        scope.clause,
        &scope.params,
    );
    if let Some(category) = filter.category {
        q.filter("c.category = ?", text_param(category.as_str()));
    }
    if let Some(priority) = filter.priority {
        q.filter("c.priority = ?", text_param(priority.as_str()));
    }
    if let Some(status) = filter.status {
        q.filter("c.status = ?", text_param(status.as_str()));
    }
    q.order("c.created_at DESC, c.id DESC")
        .run(conn, |row| Complaint::from_row(row))
}

pub fn list_documents(
    conn: &Connection,
    user: &AuthUser,
    filter: &DocumentFilter,
) -> Result<Vec<Document>> {
    let scope = policy_for(user.role).documents(user);
    let mut q = QueryBuilder::scoped(
        "SELECT id, resident_id, title, kind, file_ref, description, verified, \
         verified_by, verified_at, expiry_date, created_at, updated_at FROM documents d",
        scope.clause,
        &scope.params,
    );
    if let Some(kind) = filter.kind {
        q.filter("d.kind = ?", text_param(kind.as_str()));
    }
    if let Some(verified) = filter.verified {
        q.filter("d.verified = ?", Value::Integer(verified as i64));
    }
    q.order("d.created_at DESC, d.id DESC")
        .run(conn, |row| Document::from_row(row))
}

/// A resident's own slices of distributed shared expenses.
pub fn my_expense_shares(conn: &Connection, user: &AuthUser) -> Result<Vec<ExpenseShare>> {
    if user.role != Role::Resident {
        return Err(Error::Authorization(
            "expense shares are a resident view".to_string(),
        ));
    }
    let mut stmt = conn.prepare(
        "SELECT s.id, s.expense_id, s.resident_id, s.share_cents, s.bill_id, s.created_at
         FROM expense_shares s
         JOIN residents r ON r.id = s.resident_id
         WHERE r.user_id = ?1
         ORDER BY s.id",
    )?;
    let shares = stmt
        .query_map([user.id], |row| ExpenseShare::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(shares)
}
