//! Distribution engine: fan a shared bill or approved shared expense out
//! across the eligible resident cohort, exactly once.
//!
//! Eligibility = active resident in the parent's jurisdiction. The share is
//! a largest-remainder even split, so the children always sum back to the
//! parent amount to the cent. Child inserts and the parent `distributed`
//! flag commit in one transaction; the flag update itself is conditional
//! (`WHERE distributed = 0`), which makes a second call a no-op even under
//! concurrent requests.

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::billing;
use crate::db::{self, insert_event, Event};
use crate::entities::{Bill, Resident};
use crate::error::{Error, Result};
use crate::identity::AuthUser;

/// What a distribution call did. `AlreadyDistributed` leaves everything
/// untouched; `NoEligibleResidents` leaves the flag clear so a retry can
/// succeed once residents become eligible.
#[derive(Debug, Clone, Serialize)]
pub enum DistributionOutcome {
    Distributed(Vec<Bill>),
    AlreadyDistributed,
    NoEligibleResidents,
}

impl DistributionOutcome {
    pub fn bills(&self) -> &[Bill] {
        match self {
            DistributionOutcome::Distributed(bills) => bills,
            _ => &[],
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self, DistributionOutcome::Distributed(_))
    }
}

/// Active residents in a jurisdiction, ordered by id. The ordering decides
/// who carries the extra remainder cents, so it must be deterministic.
pub fn eligible_residents(conn: &Connection, jurisdiction: i64) -> Result<Vec<Resident>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, home_id, unit, contact, lease_start, lease_end,
                active, jurisdiction, created_at, updated_at
         FROM residents
         WHERE active = 1 AND jurisdiction = ?1
         ORDER BY id",
    )?;
    let residents = stmt
        .query_map([jurisdiction], |row| Resident::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(residents)
}

/// Split a shared bill into one child bill per eligible resident.
pub fn distribute_shared_bill(
    conn: &mut Connection,
    user: &AuthUser,
    shared_bill_id: i64,
) -> Result<DistributionOutcome> {
    user.require_manager("distribute shared bills")?;
    let parent = billing::shared_bill_by_id(conn, shared_bill_id)?;
    if parent.jurisdiction != user.id {
        return Err(Error::NotFound(format!("shared bill {shared_bill_id}")));
    }

    let tx = conn.transaction()?;

    let cohort = eligible_residents(&tx, parent.jurisdiction)?;
    if cohort.is_empty() {
        debug!(shared_bill = parent.id, "no eligible residents; distribution deferred");
        return Ok(DistributionOutcome::NoEligibleResidents);
    }

    // Conditional flip doubles as the idempotence guard.
    let flipped = tx.execute(
        "UPDATE shared_bills SET distributed = 1, updated_at = ?1
         WHERE id = ?2 AND distributed = 0",
        params![db::now(), parent.id],
    )?;
    if flipped == 0 {
        return Ok(DistributionOutcome::AlreadyDistributed);
    }

    let shares = parent.amount.split_even(cohort.len());
    let mut children = Vec::with_capacity(cohort.len());
    for (resident, share) in cohort.iter().zip(shares) {
        let bill_id = billing::insert_bill(
            &tx,
            resident.id,
            Some(parent.id),
            share,
            parent.due_date,
            parent.category,
            &parent.description,
            parent.jurisdiction,
        )?;
        children.push(billing::bill_by_id(&tx, bill_id)?);
    }

    insert_event(
        &tx,
        &Event::new(
            "shared_bill_distributed",
            "shared_bill",
            parent.id,
            serde_json::json!({
                "amount_cents": parent.amount.cents(),
                "children": children.len(),
            }),
            user.id,
        ),
    )?;
    tx.commit()?;

    info!(
        shared_bill = parent.id,
        children = children.len(),
        "shared bill distributed"
    );
    Ok(DistributionOutcome::Distributed(children))
}

/// Split an approved shared expense into per-resident bills, recording one
/// [`ExpenseShare`](crate::entities::ExpenseShare) per child.
pub fn distribute_expense(
    conn: &mut Connection,
    user: &AuthUser,
    expense_id: i64,
) -> Result<DistributionOutcome> {
    user.require_manager("distribute expenses")?;
    let expense = billing::expense_by_id(conn, expense_id)?;
    if expense.jurisdiction != user.id {
        return Err(Error::NotFound(format!("expense {expense_id}")));
    }
    if !expense.shared {
        return Err(Error::Validation(format!(
            "expense {expense_id} is personal, not shared"
        )));
    }
    if expense.status != crate::entities::ExpenseStatus::Approved {
        return Err(Error::Conflict(format!(
            "expense {expense_id} is {}, only approved expenses distribute",
            expense.status
        )));
    }

    let tx = conn.transaction()?;

    let cohort = eligible_residents(&tx, expense.jurisdiction)?;
    if cohort.is_empty() {
        debug!(expense = expense.id, "no eligible residents; distribution deferred");
        return Ok(DistributionOutcome::NoEligibleResidents);
    }

    let flipped = tx.execute(
        "UPDATE expenses SET distributed = 1, updated_at = ?1
         WHERE id = ?2 AND distributed = 0",
        params![db::now(), expense.id],
    )?;
    if flipped == 0 {
        return Ok(DistributionOutcome::AlreadyDistributed);
    }

    let description = format!("Shared expense: {} - {}", expense.category, expense.description);
    let shares = expense.amount.split_even(cohort.len());
    let mut children = Vec::with_capacity(cohort.len());
    for (resident, share) in cohort.iter().zip(shares) {
        let bill_id = billing::insert_bill(
            &tx,
            resident.id,
            None,
            share,
            expense.spent_on,
            expense.category.as_bill_category(),
            &description,
            expense.jurisdiction,
        )?;
        tx.execute(
            "INSERT INTO expense_shares (expense_id, resident_id, share_cents, bill_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![expense.id, resident.id, share, bill_id, db::now()],
        )?;
        children.push(billing::bill_by_id(&tx, bill_id)?);
    }

    insert_event(
        &tx,
        &Event::new(
            "expense_distributed",
            "expense",
            expense.id,
            serde_json::json!({
                "amount_cents": expense.amount.cents(),
                "children": children.len(),
            }),
            user.id,
        ),
    )?;
    tx.commit()?;

    info!(expense = expense.id, children = children.len(), "expense distributed");
    Ok(DistributionOutcome::Distributed(children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{create_shared_bill, NewSharedBill};
    use crate::db::test_conn;
    use crate::entities::BillCategory;
    use crate::money::Money;
    use crate::residents::fixtures::community;
    use chrono::NaiveDate;

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn shared_bill(conn: &Connection, user: &AuthUser, amount: &str) -> i64 {
        create_shared_bill(
            conn,
            user,
            &NewSharedBill {
                amount: Money::parse(amount).unwrap(),
                due_date: due(),
                category: BillCategory::Maintenance,
                description: "quarterly maintenance".into(),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn even_split_across_cohort() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 3);
        let id = shared_bill(&conn, &manager, "300.00");

        let outcome = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        let children = outcome.bills();
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|b| b.amount == Money::parse("100.00").unwrap()));
        assert!(children.iter().all(|b| b.shared_bill_id == Some(id)));
        assert_eq!(
            children.iter().map(|b| b.resident_id).collect::<Vec<_>>(),
            residents.iter().map(|r| r.id).collect::<Vec<_>>()
        );

        let parent = billing::shared_bill_by_id(&conn, id).unwrap();
        assert!(parent.distributed);
    }

    #[test]
    fn residual_cents_conserved() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 3);
        let id = shared_bill(&conn, &manager, "100.00");

        let outcome = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        let total: Money = outcome.bills().iter().map(|b| b.amount).sum();
        assert_eq!(total, Money::parse("100.00").unwrap());
        // First resident carries the extra cent.
        assert_eq!(outcome.bills()[0].amount.cents(), 3334);
        assert_eq!(outcome.bills()[1].amount.cents(), 3333);
    }

    #[test]
    fn second_distribution_is_a_noop() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 3);
        let id = shared_bill(&conn, &manager, "300.00");

        assert!(distribute_shared_bill(&mut conn, &manager, id).unwrap().is_distributed());
        let again = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        assert!(matches!(again, DistributionOutcome::AlreadyDistributed));

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bills WHERE shared_bill_id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_cohort_defers_distribution() {
        let mut conn = test_conn();
        let manager = AuthUser::manager(1);
        let id = shared_bill(&conn, &manager, "90.00");

        let outcome = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        assert!(matches!(outcome, DistributionOutcome::NoEligibleResidents));

        // Flag stays clear, so a retry succeeds once residents exist.
        assert!(!billing::shared_bill_by_id(&conn, id).unwrap().distributed);
        community(&conn, 2);
        let outcome = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        assert_eq!(outcome.bills().len(), 2);
    }

    #[test]
    fn inactive_residents_excluded() {
        let mut conn = test_conn();
        let (manager, residents) = community(&conn, 3);
        crate::residents::deactivate_resident(&conn, &manager, residents[2].id).unwrap();

        let id = shared_bill(&conn, &manager, "300.00");
        let outcome = distribute_shared_bill(&mut conn, &manager, id).unwrap();
        assert_eq!(outcome.bills().len(), 2);
        assert!(outcome
            .bills()
            .iter()
            .all(|b| b.amount == Money::parse("150.00").unwrap()));
    }

    #[test]
    fn other_jurisdiction_cannot_distribute() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 2);
        let id = shared_bill(&conn, &manager, "80.00");

        let outsider = AuthUser::manager(99);
        let err = distribute_shared_bill(&mut conn, &outsider, id).unwrap_err();
        assert_eq!(err.kind(), "not_found_error");

        let resident = AuthUser::resident(100, manager.id);
        let err = distribute_shared_bill(&mut conn, &resident, id).unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }

    #[test]
    fn distribution_leaves_audit_event() {
        let mut conn = test_conn();
        let (manager, _) = community(&conn, 2);
        let id = shared_bill(&conn, &manager, "60.00");
        distribute_shared_bill(&mut conn, &manager, id).unwrap();

        let events = crate::db::events_for_entity(&conn, "shared_bill", id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "shared_bill_distributed");
        assert_eq!(events[0].data["children"], 2);
    }
}
