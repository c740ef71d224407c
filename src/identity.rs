//! Authenticated identity as supplied by the external auth provider.
//!
//! The core trusts `{id, role, jurisdiction}` without revalidation; token
//! issuance and verification live outside this crate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A resident of the community; sees only their own records.
    Resident,
    /// A manager ("union leader"); sees records under their jurisdiction.
    Manager,
}

/// Per-request identity. For managers, `jurisdiction` equals their own
/// user id; for residents it is the id of the manager responsible for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
    pub jurisdiction: i64,
}

impl AuthUser {
    pub fn manager(id: i64) -> Self {
        AuthUser {
            id,
            role: Role::Manager,
            jurisdiction: id,
        }
    }

    pub fn resident(id: i64, jurisdiction: i64) -> Self {
        AuthUser {
            id,
            role: Role::Resident,
            jurisdiction,
        }
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// Guard for manager-only operations.
    pub fn require_manager(&self, action: &str) -> Result<()> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "only a manager may {action}"
            )))
        }
    }
}
