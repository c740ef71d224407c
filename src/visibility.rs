//! Role-scoped visibility.
//!
//! Every listing and lookup goes through a [`VisibilityPolicy`] before any
//! other filter or engine runs. This is a security invariant, not a
//! convenience: no role may ever see a record outside its predicate.
//! Policies are capability objects keyed by role; there are no role `if`
//! chains at call sites.

use crate::identity::{AuthUser, Role};

/// A SQL predicate fragment plus its bound parameters. The fragment refers
/// to the aliased tables each listing query establishes (`b` bills,
/// `p` payments, `e` expenses, `c` complaints, `d` documents, `r` residents).
#[derive(Debug, Clone)]
pub struct Predicate {
    pub clause: &'static str,
    pub params: Vec<i64>,
}

impl Predicate {
    fn new(clause: &'static str, params: Vec<i64>) -> Self {
        Predicate { clause, params }
    }
}

/// Per-role scoping rules, one method per record family.
pub trait VisibilityPolicy {
    fn bills(&self, user: &AuthUser) -> Predicate;
    fn payments(&self, user: &AuthUser) -> Predicate;
    fn expenses(&self, user: &AuthUser) -> Predicate;
    fn complaints(&self, user: &AuthUser) -> Predicate;
    fn documents(&self, user: &AuthUser) -> Predicate;
}

/// Residents see exactly the records attached to their own resident row.
struct ResidentVisibility;

impl VisibilityPolicy for ResidentVisibility {
    fn bills(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "b.resident_id IN (SELECT id FROM residents WHERE user_id = ?)",
            vec![user.id],
        )
    }

    fn payments(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "p.bill_id IN (SELECT b.id FROM bills b
                JOIN residents r ON r.id = b.resident_id WHERE r.user_id = ?)",
            vec![user.id],
        )
    }

    fn expenses(&self, user: &AuthUser) -> Predicate {
        // Personal expenses, plus shared expenses the resident holds a
        // share of.
        Predicate::new(
            "(e.resident_id IN (SELECT id FROM residents WHERE user_id = ?)
              OR e.id IN (SELECT s.expense_id FROM expense_shares s
                  JOIN residents r ON r.id = s.resident_id WHERE r.user_id = ?))",
            vec![user.id, user.id],
        )
    }

    fn complaints(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "c.resident_id IN (SELECT id FROM residents WHERE user_id = ?)",
            vec![user.id],
        )
    }

    fn documents(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "d.resident_id IN (SELECT id FROM residents WHERE user_id = ?)",
            vec![user.id],
        )
    }
}

/// Managers see every record under their jurisdiction and nothing else.
struct ManagerVisibility;

impl VisibilityPolicy for ManagerVisibility {
    fn bills(&self, user: &AuthUser) -> Predicate {
        Predicate::new("b.jurisdiction = ?", vec![user.id])
    }

    fn payments(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "p.bill_id IN (SELECT id FROM bills WHERE jurisdiction = ?)",
            vec![user.id],
        )
    }

    fn expenses(&self, user: &AuthUser) -> Predicate {
        Predicate::new("e.jurisdiction = ?", vec![user.id])
    }

    fn complaints(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "c.resident_id IN (SELECT id FROM residents WHERE jurisdiction = ?)",
            vec![user.id],
        )
    }

    fn documents(&self, user: &AuthUser) -> Predicate {
        Predicate::new(
            "d.resident_id IN (SELECT id FROM residents WHERE jurisdiction = ?)",
            vec![user.id],
        )
    }
}

/// Resolve the policy for a role.
pub fn policy_for(role: Role) -> &'static dyn VisibilityPolicy {
    match role {
        Role::Resident => &ResidentVisibility,
        Role::Manager => &ManagerVisibility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthUser;

    #[test]
    fn resident_predicate_binds_own_user() {
        let user = AuthUser::resident(42, 1);
        let pred = policy_for(user.role).bills(&user);
        assert!(pred.clause.contains("user_id"));
        assert_eq!(pred.params, vec![42]);
    }

    #[test]
    fn manager_predicate_binds_jurisdiction() {
        let user = AuthUser::manager(9);
        let pred = policy_for(user.role).bills(&user);
        assert_eq!(pred.clause, "b.jurisdiction = ?");
        assert_eq!(pred.params, vec![9]);
    }
}
