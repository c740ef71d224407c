// Condominio - residential community management core
// Exposes all modules for use in the CLI and tests

pub mod billing;
pub mod complaints;
pub mod db;
pub mod distribution;
pub mod documents;
pub mod entities;
pub mod error;
pub mod files;
pub mod identity;
pub mod money;
pub mod payments;
pub mod penalty;
pub mod query;
pub mod residents;
pub mod scheduling;
pub mod visibility;

// Re-export commonly used types
pub use billing::{
    approve_expense, bill_by_id, bill_for_user, create_bill, create_expense, create_shared_bill,
    expense_by_id, generate_monthly_rent, reject_expense, shared_bill_by_id, NewBill, NewExpense,
    NewSharedBill,
};
pub use complaints::{complaint_by_id, complaint_trail, file_complaint, update_complaint,
    NewComplaint};
pub use db::{events_for_entity, insert_event, setup_database, Event};
pub use distribution::{distribute_expense, distribute_shared_bill, DistributionOutcome};
pub use documents::{document_by_id, upload_document, verify_document, NewDocument};
pub use entities::{
    Bill, BillCategory, BillStatus, Complaint, ComplaintCategory, ComplaintPriority,
    ComplaintStatus, ComplaintUpdate, Document, DocumentKind, Expense, ExpenseCategory,
    ExpenseShare, ExpenseStatus, Home, HomeStatus, Payment, PaymentMethod, PaymentStatus,
    Resident, SharedBill, Shift, Staff,
};
pub use error::{Error, Result};
pub use files::{DiskFileStore, FileStore};
pub use identity::{AuthUser, Role};
pub use money::{Money, PENALTY_RATE_PERCENT};
pub use payments::{
    approve_payment, payment_by_id, record_payment, reject_payment, remaining_balance,
    NewPayment,
};
pub use penalty::accrue_penalties;
pub use query::{
    list_bills, list_complaints, list_documents, list_expenses, list_payments,
    my_expense_shares, BillFilter, ComplaintFilter, DocumentFilter, ExpenseFilter, PaymentFilter,
};
pub use residents::{
    add_home, add_resident, deactivate_resident, home_by_id, list_residents, resident_by_id,
    resident_by_user, NewHome, NewResident,
};
pub use scheduling::{add_shift, add_staff, list_shifts, list_staff, NewStaff};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
