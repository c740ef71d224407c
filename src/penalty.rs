//! One-time late-fee accrual on overdue unpaid bills.
//!
//! Runs as a side effect of the bill list path. The guard is the
//! `penalty_cents = 0` column itself: each row's update is conditional on
//! it, so overlapping read requests cannot charge a bill twice.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::db;
use crate::error::Result;
use crate::money::{Money, PENALTY_RATE_PERCENT};

/// Apply the 10% late fee to every pending bill past its due date that has
/// not been charged yet. Returns how many bills were charged.
pub fn accrue_penalties(conn: &mut Connection, today: NaiveDate) -> Result<usize> {
    let tx = conn.transaction()?;

    let candidates: Vec<(i64, Money)> = {
        let mut stmt = tx.prepare(
            "SELECT id, amount_cents FROM bills
             WHERE status = 'pending' AND due_date < ?1 AND penalty_cents = 0",
        )?;
        let rows = stmt
            .query_map([today], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut charged = 0;
    for (bill_id, amount) in candidates {
        let penalty = amount.percent(PENALTY_RATE_PERCENT);
        // Compare-and-set: a concurrent accrual pass loses the race here
        // and changes nothing.
        let changed = tx.execute(
            "UPDATE bills
             SET penalty_cents = ?1, amount_cents = amount_cents + ?1, updated_at = ?2
             WHERE id = ?3 AND penalty_cents = 0",
            params![penalty, db::now(), bill_id],
        )?;
        if changed > 0 {
            debug!(bill = bill_id, penalty = %penalty, "late fee accrued");
            charged += 1;
        }
    }
    tx.commit()?;

    if charged > 0 {
        info!(bills = charged, "penalty accrual pass charged overdue bills");
    }
    Ok(charged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{bill_by_id, create_bill, NewBill};
    use crate::db::test_conn;
    use crate::entities::{BillCategory, BillStatus};
    use crate::identity::AuthUser;
    use crate::residents::fixtures::community;

    fn overdue_bill(conn: &Connection, manager: &AuthUser, resident_id: i64, amount: &str) -> i64 {
        create_bill(
            conn,
            manager,
            &NewBill {
                resident_id,
                amount: Money::parse(amount).unwrap(),
                due_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
                category: BillCategory::Utilities,
                description: String::new(),
            },
        )
        .unwrap()
        .id
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[test]
    fn overdue_bill_charged_ten_percent_once() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill_id = overdue_bill(&conn, &manager, residents[0].id, "100.00");

        assert_eq!(accrue_penalties(&mut conn, today()).unwrap(), 1);
        let bill = bill_by_id(&conn, bill_id).unwrap();
        assert_eq!(bill.penalty, Money::parse("10.00").unwrap());
        assert_eq!(bill.amount, Money::parse("110.00").unwrap());
        assert_eq!(bill.original_amount(), Money::parse("100.00").unwrap());

        // Second pass is a no-op; the fee never compounds.
        assert_eq!(accrue_penalties(&mut conn, today()).unwrap(), 0);
        let bill = bill_by_id(&conn, bill_id).unwrap();
        assert_eq!(bill.amount, Money::parse("110.00").unwrap());
    }

    #[test]
    fn future_and_settled_bills_untouched() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);

        let future_id = create_bill(
            &conn,
            &manager,
            &NewBill {
                resident_id: residents[0].id,
                amount: Money::parse("50.00").unwrap(),
                due_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                category: BillCategory::Utilities,
                description: String::new(),
            },
        )
        .unwrap()
        .id;

        let paid_id = overdue_bill(&conn, &manager, residents[0].id, "80.00");
        conn.execute(
            "UPDATE bills SET status = ?1 WHERE id = ?2",
            params![BillStatus::Paid, paid_id],
        )
        .unwrap();

        assert_eq!(accrue_penalties(&mut conn, today()).unwrap(), 0);
        assert!(bill_by_id(&conn, future_id).unwrap().penalty.is_zero());
        assert!(bill_by_id(&conn, paid_id).unwrap().penalty.is_zero());
    }

    #[test]
    fn fee_rounds_half_up_to_cent() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 1);
        let bill_id = overdue_bill(&conn, &manager, residents[0].id, "33.33");

        accrue_penalties(&mut conn, today()).unwrap();
        let bill = bill_by_id(&conn, bill_id).unwrap();
        assert_eq!(bill.penalty.cents(), 333);
        assert_eq!(bill.amount.cents(), 3666);
    }
}
