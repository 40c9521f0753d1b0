mod loan_service;
mod overdue_detection;
mod projector;

pub use loan_service::{
    LoanDetail, ReturnOutcome, assess_loan_fine, borrow_book, get_loan, list_loans, renew_loan,
    return_book,
};
pub(crate) use loan_service::open_loan;
pub use overdue_detection::detect_overdue_loans;
pub use projector::{build_loan_view, project_loan_events, rebuild_loan_views};
