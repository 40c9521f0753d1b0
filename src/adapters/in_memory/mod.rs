//! インメモリのアダプター
//!
//! テストとローカル実行用。各ストアはMutexで保護され、
//! 条件付き更新は1回のロック内で判定と書き込みを行う。

pub mod event_store;
pub mod fine_repository;
pub mod loan_read_model;
pub mod reservation_repository;
pub mod settings_store;

pub use event_store::EventStore as InMemoryEventStore;
pub use fine_repository::FineRepository as InMemoryFineRepository;
pub use loan_read_model::LoanReadModel as InMemoryLoanReadModel;
pub use reservation_repository::ReservationRepository as InMemoryReservationRepository;
pub use settings_store::SettingsStore as InMemorySettingsStore;
