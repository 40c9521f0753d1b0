pub mod book_service;
pub mod event_store;
pub mod fine_repository;
pub mod loan_read_model;
pub mod member_service;
pub mod notification_service;
pub mod reservation_repository;
pub mod settings_store;

pub use book_service::{BookAvailability, BookService};
pub use event_store::{EventStore, VersionConflict};
pub use fine_repository::FineRepository;
pub use loan_read_model::{LoanReadModel, LoanView};
pub use member_service::MemberService;
pub use notification_service::NotificationService;
pub use reservation_repository::{DuplicateReservation, ReservationRepository};
pub use settings_store::SettingsStore;
