mod admin;
mod fines;
mod loans;
mod members;
mod reservations;

pub use admin::{get_config, rebuild_views, run_sweep, update_config};
pub use fines::{pay_fine, waive_fine};
pub use loans::{assess_fine, borrow_book, get_loan, list_loans, renew_loan, return_book};
pub use members::{get_envelope, get_member_fines};
pub use reservations::{
    act_on_reservation, add_copies, get_reservation, list_reservations, place_reservation,
};

use crate::application::ServiceDependencies;

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}
