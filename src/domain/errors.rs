use rust_decimal::Decimal;
use thiserror::Error;

use super::{FineStatus, RenewalCountError, ReservationStatus, MAX_RENEWALS};

/// 貸出の拒否理由
///
/// 例外ではなくポリシー判定の結果。
/// 呼び出し側（HTTPハンドラー）が4xxレスポンスに変換する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BorrowDenial {
    /// 貸出可能な在庫がない（予約を案内する）
    #[error("No copy of this book is available; place a reservation instead")]
    NoCopyAvailable,

    /// 同時貸出上限に達している
    #[error("Loan limit reached (max {limit} concurrent loans)")]
    LoanLimitReached { limit: u32 },

    /// 未払い罰金が閾値を超えている
    #[error("Outstanding fines of {outstanding} exceed the allowed {threshold}")]
    OutstandingFineBlock {
        outstanding: Decimal,
        threshold: Decimal,
    },

    /// 延滞中の貸出がある
    #[error("Member has an overdue loan")]
    OverdueLoanBlock,
}

/// 延長の拒否理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalDenial {
    /// 延滞中のため延長不可
    #[error("Overdue loans cannot be renewed")]
    LoanOverdueCannotRenew,

    /// 延長回数の上限に達している
    #[error("Renewal limit reached (max {limit} renewals)")]
    RenewalLimitReached { limit: u8 },

    /// 既に返却済み
    #[error("Loan has already been returned")]
    AlreadyReturned,
}

impl From<RenewalCountError> for RenewalDenial {
    fn from(err: RenewalCountError) -> Self {
        match err {
            RenewalCountError::LimitExceeded => RenewalDenial::RenewalLimitReached {
                limit: MAX_RENEWALS,
            },
        }
    }
}

/// 予約の拒否理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationDenial {
    /// 在庫があるので貸出を案内する
    #[error("A copy is available; borrow it instead of reserving")]
    CopyAvailable,

    /// 同じ書籍の有効な予約を既に持っている
    #[error("Member already has a live reservation for this book")]
    AlreadyReserved,

    /// 同じ書籍を既に借りている
    #[error("Member already has this book on loan")]
    AlreadyBorrowed,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnBookError {
    /// 既に返却済み
    #[error("Loan has already been returned")]
    AlreadyReturned,
}

/// 予約の状態遷移エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("Reservation is {0}, expected pending")]
    NotPending(ReservationStatus),

    #[error("Reservation is {0}, expected ready")]
    NotReady(ReservationStatus),

    /// 終了状態（completed, expired, cancelled）からは遷移不可
    #[error("Reservation is already {0}")]
    AlreadyClosed(ReservationStatus),

    /// 受取期限を過ぎている
    #[error("Pickup window has elapsed")]
    PickupWindowElapsed,

    /// 受取期限前は期限切れにできない
    #[error("Pickup window is still open")]
    PickupWindowOpen,

    /// 待ち行列の先頭ではない（FIFO違反）
    #[error("Reservation is not at the head of the queue")]
    NotQueueHead,
}

/// 罰金の状態遷移エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FineError {
    #[error("Fine is already {0}")]
    AlreadySettled(FineStatus),
}

/// 管理設定の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    #[error("Loan periods must be at least one day")]
    NonPositiveLoanPeriod,

    #[error("Loan limits must be at least one book")]
    NonPositiveLoanLimit,

    #[error("{0} must not be negative")]
    NegativeAmount(&'static str),

    #[error("premiumFineMultiplier must be between 0 and 1, got {0}")]
    MultiplierOutOfRange(Decimal),
}
