use crate::domain::{
    BorrowDenial, FineError, InvalidTransition, PolicyValidationError, RenewalDenial,
    ReservationDenial, ReservationError, ReturnBookError,
};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LibraryApplicationError {
    /// 会員が存在しない
    #[error("Member not found")]
    MemberNotFound,

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出が見つからない
    #[error("Loan not found")]
    LoanNotFound,

    #[error("Reservation not found")]
    ReservationNotFound,

    #[error("Fine not found")]
    FineNotFound,

    /// 貸出の判定で拒否された
    #[error(transparent)]
    BorrowDenied(#[from] BorrowDenial),

    /// 延長の判定で拒否された
    #[error(transparent)]
    RenewalDenied(#[from] RenewalDenial),

    /// 予約の受付で拒否された
    #[error(transparent)]
    ReservationDenied(#[from] ReservationDenial),

    #[error(transparent)]
    ReturnRejected(#[from] ReturnBookError),

    /// 予約の状態遷移が不正
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    /// 罰金の状態遷移が不正
    #[error(transparent)]
    Fine(#[from] FineError),

    /// 管理設定の値が不正
    #[error(transparent)]
    InvalidPolicy(#[from] PolicyValidationError),

    /// 貸出の状態が不正（例: 未返却の貸出に罰金を確定しようとした）
    #[error("Invalid loan state: {0}")]
    InvalidLoanState(String),

    /// この貸出の罰金は確定済み
    #[error("Fine has already been assessed for this loan")]
    FineAlreadyAssessed,

    /// 期限内に返却されたため罰金は発生しない
    #[error("Loan was returned on time, no fine is due")]
    NoFineDue,

    /// 別のリクエストが先に同じ対象を更新した
    #[error("Concurrent modification, retry the request")]
    ConcurrentModification,

    /// イベント列から集約を復元できない
    #[error("Corrupted event stream")]
    CorruptedEventStream(#[from] InvalidTransition),

    /// EventStoreのエラー
    #[error("Event store error")]
    EventStoreError(#[source] BoxError),

    /// ReadModelのエラー
    #[error("Read model error")]
    ReadModelError(#[source] BoxError),

    /// MemberServiceのエラー
    #[error("Member service error")]
    MemberServiceError(#[source] BoxError),

    /// BookServiceのエラー
    #[error("Book service error")]
    BookServiceError(#[source] BoxError),

    #[error("Reservation store error")]
    ReservationStoreError(#[source] BoxError),

    #[error("Fine store error")]
    FineStoreError(#[source] BoxError),

    #[error("Settings store error")]
    SettingsStoreError(#[source] BoxError),
}

impl LibraryApplicationError {
    /// インフラ障害か（業務ルールによる拒否ではない）
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::CorruptedEventStream(_)
                | Self::EventStoreError(_)
                | Self::ReadModelError(_)
                | Self::MemberServiceError(_)
                | Self::BookServiceError(_)
                | Self::ReservationStoreError(_)
                | Self::FineStoreError(_)
                | Self::SettingsStoreError(_)
        )
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LibraryApplicationError>;
