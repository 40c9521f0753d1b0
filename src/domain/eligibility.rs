use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{
    BorrowDenial, BorrowingEnvelope, LoanStatus, RenewalCount, RenewalDenial, ReservationDenial,
    MAX_RENEWALS,
};

/// 貸出判定に必要な会員の現状
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BorrowerStanding {
    /// 返却されていない貸出の数（延滞中を含む）
    pub active_loan_count: u32,
    /// 未払い（pending）罰金の合計
    pub outstanding_fines: Decimal,
    /// 返却期限を過ぎた貸出があるか
    pub has_overdue_loan: bool,
}

/// 貸出許可
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowGrant {
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// 純粋関数：貸出を許可するか判定する
///
/// 判定順：
/// 1. 在庫があること
/// 2. 同時貸出上限未満であること
/// 3. 未払い罰金が閾値以下であること
/// 4. 延滞中の貸出がないこと
///
/// 同じ入力には常に同じ判定を返す。在庫の減算と貸出の作成は呼び出し側の責務。
pub fn authorize_borrow(
    standing: &BorrowerStanding,
    envelope: &BorrowingEnvelope,
    available_copies: u32,
    borrowed_at: DateTime<Utc>,
) -> Result<BorrowGrant, BorrowDenial> {
    if available_copies == 0 {
        return Err(BorrowDenial::NoCopyAvailable);
    }

    if standing.active_loan_count >= envelope.max_concurrent_loans {
        return Err(BorrowDenial::LoanLimitReached {
            limit: envelope.max_concurrent_loans,
        });
    }

    if standing.outstanding_fines > envelope.fine_block_threshold {
        return Err(BorrowDenial::OutstandingFineBlock {
            outstanding: standing.outstanding_fines,
            threshold: envelope.fine_block_threshold,
        });
    }

    if standing.has_overdue_loan {
        return Err(BorrowDenial::OverdueLoanBlock);
    }

    Ok(BorrowGrant {
        borrowed_at,
        due_date: borrowed_at + envelope.loan_period(),
    })
}

/// 純粋関数：延長を許可するか判定する
///
/// 延滞中は延長不可。延長は2回まで。
/// 新しい返却期限は「延長時点 + 貸出期間」。
pub fn authorize_renewal(
    status: LoanStatus,
    renewal_count: RenewalCount,
    envelope: &BorrowingEnvelope,
    renewed_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, RenewalDenial> {
    match status {
        LoanStatus::Returned => return Err(RenewalDenial::AlreadyReturned),
        LoanStatus::Overdue => return Err(RenewalDenial::LoanOverdueCannotRenew),
        LoanStatus::Active => {}
    }

    if !renewal_count.can_renew() {
        return Err(RenewalDenial::RenewalLimitReached {
            limit: MAX_RENEWALS,
        });
    }

    Ok(renewed_at + envelope.loan_period())
}

/// 純粋関数：予約を受け付けるか判定する
pub fn authorize_reservation(
    available_copies: u32,
    has_live_reservation: bool,
    has_book_on_loan: bool,
) -> Result<(), ReservationDenial> {
    if has_book_on_loan {
        return Err(ReservationDenial::AlreadyBorrowed);
    }
    if has_live_reservation {
        return Err(ReservationDenial::AlreadyReserved);
    }
    if available_copies > 0 {
        return Err(ReservationDenial::CopyAvailable);
    }
    Ok(())
}
