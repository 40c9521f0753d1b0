mod queue;
mod reservation_service;

pub use queue::{SettleOutcome, settle_book_queue};
pub use reservation_service::{
    CopiesAdded, ReservationDetail, ReservationOutcome, act_on_reservation, add_copies,
    get_reservation, list_reservations, place_reservation,
};
