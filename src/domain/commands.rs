use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, FineId, LoanId, MemberId, ReservationId, StaffId};

/// コマンド：書籍を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrowed_at: DateTime<Utc>,
}

/// コマンド：貸出を延長する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewLoan {
    pub loan_id: LoanId,
    pub renewed_at: DateTime<Utc>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub loan_id: LoanId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：書籍を予約する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceReservation {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub reserved_at: DateTime<Utc>,
}

/// 予約に対する操作（PATCH /api/reservations/:id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationAction {
    MarkReady,
    Complete,
    Cancel,
}

/// コマンド：予約を操作する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActOnReservation {
    pub reservation_id: ReservationId,
    pub action: ReservationAction,
    pub acted_at: DateTime<Utc>,
}

/// コマンド：罰金を支払う
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayFine {
    pub fine_id: FineId,
    pub paid_at: DateTime<Utc>,
}

/// コマンド：罰金を免除する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiveFine {
    pub fine_id: FineId,
    pub staff_id: StaffId,
    pub waived_at: DateTime<Utc>,
}
