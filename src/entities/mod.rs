//! Stored entities: plain structs mapped to SQLite rows, plus the
//! closed string enums the store persists them with.

mod bill;
mod complaint;
mod document;
mod expense;
mod home;
mod payment;
mod resident;
mod staff;

pub use bill::{Bill, BillCategory, BillStatus, SharedBill};
pub use complaint::{
    Complaint, ComplaintCategory, ComplaintPriority, ComplaintStatus, ComplaintUpdate,
};
pub use document::{Document, DocumentKind};
pub use expense::{Expense, ExpenseCategory, ExpenseShare, ExpenseStatus};
pub use home::{Home, HomeStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use resident::Resident;
pub use staff::{Shift, Staff};

/// Defines a closed enum stored as text: `as_str`/`parse`, `Display`,
/// and the rusqlite `ToSql`/`FromSql` impls in one place.
macro_rules! store_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                Self::parse(s).ok_or(rusqlite::types::FromSqlError::InvalidType)
            }
        }
    };
}

pub(crate) use store_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips_through_text() {
        assert_eq!(BillStatus::PartiallyPaid.as_str(), "partially_paid");
        assert_eq!(
            BillStatus::parse("partially_paid"),
            Some(BillStatus::PartiallyPaid)
        );
        assert_eq!(BillStatus::parse("bogus"), None);
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "bank_transfer");
    }
}
