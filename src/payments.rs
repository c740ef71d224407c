//! Payment reconciliation.
//!
//! Payments enter `pending` and hold a slice of the bill's remaining
//! balance; only a manager approval moves money into the settlement sum.
//! Bill status is derived from exactly one rule ([`settle_status`]): the
//! approved-payment total against the bill amount. Pending money never
//! changes a bill's status.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::billing;
use crate::db::{self, insert_event, Event};
use crate::entities::{Bill, BillStatus, Payment, PaymentMethod, PaymentStatus};
use crate::error::{Error, Result};
use crate::identity::AuthUser;
use crate::money::Money;

pub(crate) const PAYMENT_COLS: &str = "id, bill_id, amount_cents, paid_on, method, \
     reference, notes, screenshot, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub bill_id: i64,
    pub amount: Money,
    /// Defaults to today when absent.
    pub paid_on: Option<NaiveDate>,
    pub method: PaymentMethod,
    pub notes: String,
    pub screenshot: Option<String>,
}

/// The single settlement rule: approved money against the bill amount.
pub fn settle_status(bill_amount: Money, approved_total: Money) -> BillStatus {
    if approved_total >= bill_amount {
        BillStatus::Paid
    } else if approved_total.is_positive() {
        BillStatus::PartiallyPaid
    } else {
        BillStatus::Pending
    }
}

/// Sum of non-rejected payments. Pending payments hold their slice of the
/// balance until rejected, so two half-payments cannot both be accepted
/// and later both approved.
pub fn committed_total(conn: &Connection, bill_id: i64) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE bill_id = ?1 AND status != 'rejected'",
        [bill_id],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

pub fn approved_total(conn: &Connection, bill_id: i64) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE bill_id = ?1 AND status = 'approved'",
        [bill_id],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// What the bill can still accept.
pub fn remaining_balance(conn: &Connection, bill: &Bill) -> Result<Money> {
    Ok(bill.amount - committed_total(conn, bill.id)?)
}

/// Record a payment against a bill visible to the caller. The payment is
/// persisted `pending`; the bill's status does not move until approval.
pub fn record_payment(conn: &mut Connection, user: &AuthUser, new: &NewPayment) -> Result<Payment> {
    if !new.amount.is_positive() {
        return Err(Error::Validation(format!(
            "payment amount must be positive, got {}",
            new.amount
        )));
    }

    let tx = conn.transaction()?;

    let bill = billing::bill_for_user(&tx, user, new.bill_id)?;
    let remaining = bill.amount - committed_total(&tx, bill.id)?;
    if new.amount > remaining {
        return Err(Error::Conflict(format!(
            "payment amount ({}) exceeds remaining balance ({remaining})",
            new.amount
        )));
    }

    let paid_on = new
        .paid_on
        .unwrap_or_else(|| db::now().date_naive());
    let reference = Uuid::new_v4().to_string();
    let now = db::now();
    tx.execute(
        "INSERT INTO payments (
            bill_id, amount_cents, paid_on, method, reference, notes,
            screenshot, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9)",
        params![
            bill.id,
            new.amount,
            paid_on,
            new.method,
            reference,
            new.notes,
            new.screenshot,
            now,
            now,
        ],
    )?;
    let payment_id = tx.last_insert_rowid();

    insert_event(
        &tx,
        &Event::new(
            "payment_recorded",
            "bill",
            bill.id,
            serde_json::json!({
                "payment_id": payment_id,
                "amount_cents": new.amount.cents(),
            }),
            user.id,
        ),
    )?;
    tx.commit()?;

    info!(payment = payment_id, bill = bill.id, amount = %new.amount, "payment recorded");
    payment_by_id(conn, payment_id)
}

pub fn payment_by_id(conn: &Connection, id: i64) -> Result<Payment> {
    conn.query_row(
        &format!("SELECT {PAYMENT_COLS} FROM payments WHERE id = ?1"),
        [id],
        |row| Payment::from_row(row),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("payment {id}")))
}

/// Approve a pending payment and re-derive the bill's settlement status.
pub fn approve_payment(conn: &mut Connection, user: &AuthUser, payment_id: i64) -> Result<Payment> {
    review_payment(conn, user, payment_id, PaymentStatus::Approved)
}

/// Reject a pending payment, freeing its slice of the remaining balance.
pub fn reject_payment(conn: &mut Connection, user: &AuthUser, payment_id: i64) -> Result<Payment> {
    review_payment(conn, user, payment_id, PaymentStatus::Rejected)
}

fn review_payment(
    conn: &mut Connection,
    user: &AuthUser,
    payment_id: i64,
    verdict: PaymentStatus,
) -> Result<Payment> {
    user.require_manager("review payments")?;

    let tx = conn.transaction()?;

    let payment = tx
        .query_row(
            &format!("SELECT {PAYMENT_COLS} FROM payments WHERE id = ?1"),
            [payment_id],
            |row| Payment::from_row(row),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("payment {payment_id}")))?;
    let bill = billing::bill_by_id(&tx, payment.bill_id)?;
    if bill.jurisdiction != user.id {
        return Err(Error::NotFound(format!("payment {payment_id}")));
    }
    if payment.status != PaymentStatus::Pending {
        return Err(Error::Conflict(format!(
            "payment {payment_id} already {}",
            payment.status
        )));
    }

    tx.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![verdict, db::now(), payment_id],
    )?;

    // Settlement status follows the approved sum, in the same transaction.
    let approved = approved_total(&tx, bill.id)?;
    let status = settle_status(bill.amount, approved);
    tx.execute(
        "UPDATE bills SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, db::now(), bill.id],
    )?;

    insert_event(
        &tx,
        &Event::new(
            match verdict {
                PaymentStatus::Approved => "payment_approved",
                _ => "payment_rejected",
            },
            "bill",
            bill.id,
            serde_json::json!({
                "payment_id": payment_id,
                "approved_total_cents": approved.cents(),
                "bill_status": status.as_str(),
            }),
            user.id,
        ),
    )?;
    tx.commit()?;

    payment_by_id(conn, payment_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{bill_by_id, create_bill, NewBill};
    use crate::db::test_conn;
    use crate::entities::BillCategory;
    use crate::residents::fixtures::community;

    fn bill_of(conn: &Connection, manager: &AuthUser, resident_id: i64, amount: &str) -> Bill {
        create_bill(
            conn,
            manager,
            &NewBill {
                resident_id,
                amount: Money::parse(amount).unwrap(),
                due_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                category: BillCategory::Utilities,
                description: String::new(),
            },
        )
        .unwrap()
    }

    fn pay(bill_id: i64, amount: &str) -> NewPayment {
        NewPayment {
            bill_id,
            amount: Money::parse(amount).unwrap(),
            paid_on: None,
            method: PaymentMethod::BankTransfer,
            notes: String::new(),
            screenshot: None,
        }
    }

    #[test]
    fn overpayment_rejected_with_remaining_balance() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "50.00");
        let me = AuthUser::resident(100, manager.id);

        let err = record_payment(&mut conn, &me, &pay(bill.id, "60.00")).unwrap_err();
        assert_eq!(err.kind(), "conflict_error");
        assert!(err.to_string().contains("50.00"), "message: {err}");
    }

    #[test]
    fn pending_money_holds_balance_but_not_status() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "100.00");
        let me = AuthUser::resident(100, manager.id);

        record_payment(&mut conn, &me, &pay(bill.id, "70.00")).unwrap();
        assert_eq!(bill_by_id(&conn, bill.id).unwrap().status, BillStatus::Pending);

        // 70 is held even though unapproved.
        let err = record_payment(&mut conn, &me, &pay(bill.id, "40.00")).unwrap_err();
        assert_eq!(err.kind(), "conflict_error");
        assert!(err.to_string().contains("30.00"), "message: {err}");
    }

    #[test]
    fn approval_drives_the_status_machine() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "100.00");
        let me = AuthUser::resident(100, manager.id);

        let first = record_payment(&mut conn, &me, &pay(bill.id, "40.00")).unwrap();
        approve_payment(&mut conn, &manager, first.id).unwrap();
        assert_eq!(
            bill_by_id(&conn, bill.id).unwrap().status,
            BillStatus::PartiallyPaid
        );

        let second = record_payment(&mut conn, &me, &pay(bill.id, "60.00")).unwrap();
        approve_payment(&mut conn, &manager, second.id).unwrap();
        assert_eq!(bill_by_id(&conn, bill.id).unwrap().status, BillStatus::Paid);
    }

    #[test]
    fn rejection_frees_the_held_slice() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "100.00");
        let me = AuthUser::resident(100, manager.id);

        let payment = record_payment(&mut conn, &me, &pay(bill.id, "100.00")).unwrap();
        reject_payment(&mut conn, &manager, payment.id).unwrap();
        assert_eq!(bill_by_id(&conn, bill.id).unwrap().status, BillStatus::Pending);

        // The full balance is available again.
        record_payment(&mut conn, &me, &pay(bill.id, "100.00")).unwrap();
    }

    #[test]
    fn residents_cannot_pay_other_residents_bills() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 2);
        let bill = bill_of(&conn, &manager, residents[1].id, "30.00");

        let me = AuthUser::resident(100, manager.id);
        let err = record_payment(&mut conn, &me, &pay(bill.id, "30.00")).unwrap_err();
        assert_eq!(err.kind(), "not_found_error");
    }

    #[test]
    fn residents_cannot_approve_payments() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "20.00");
        let me = AuthUser::resident(100, manager.id);

        let payment = record_payment(&mut conn, &me, &pay(bill.id, "20.00")).unwrap();
        let err = approve_payment(&mut conn, &me, payment.id).unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }

    #[test]
    fn double_review_conflicts() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "20.00");
        let me = AuthUser::resident(100, manager.id);

        let payment = record_payment(&mut conn, &me, &pay(bill.id, "20.00")).unwrap();
        approve_payment(&mut conn, &manager, payment.id).unwrap();
        let err = reject_payment(&mut conn, &manager, payment.id).unwrap_err();
        assert_eq!(err.kind(), "conflict_error");
    }

    #[test]
    fn zero_amount_is_invalid() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill = bill_of(&conn, &manager, residents[0].id, "20.00");
        let me = AuthUser::resident(100, manager.id);

        let err = record_payment(&mut conn, &me, &pay(bill.id, "0.00")).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
