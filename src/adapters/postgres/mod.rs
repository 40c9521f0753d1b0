pub mod book_inventory;
pub mod event_store;
pub mod fine_repository;
pub mod loan_read_model;
pub mod member_directory;
pub mod reservation_repository;
pub mod settings_store;

// パブリックに型を再エクスポート
pub use book_inventory::BookInventory as PostgresBookInventory;
pub use event_store::EventStore as PostgresEventStore;
pub use fine_repository::FineRepository as PostgresFineRepository;
pub use loan_read_model::LoanReadModel as PostgresLoanReadModel;
pub use member_directory::MemberDirectory as PostgresMemberDirectory;
pub use reservation_repository::ReservationRepository as PostgresReservationRepository;
pub use settings_store::SettingsStore as PostgresSettingsStore;

/// 不正な行データをポートのエラー型に変換する
pub(crate) fn invalid_data(message: impl Into<String>) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.into(),
    ))
}
