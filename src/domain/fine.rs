use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BorrowingEnvelope, FineError, FineId, LoanId, MemberId, ReturnedLoan, StaffId};

/// 罰金の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FineStatus {
    Pending,
    Paid,
    Waived,
}

impl FineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineStatus::Pending => "pending",
            FineStatus::Paid => "paid",
            FineStatus::Waived => "waived",
        }
    }
}

impl std::fmt::Display for FineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FineStatus::Pending),
            "paid" => Ok(FineStatus::Paid),
            "waived" => Ok(FineStatus::Waived),
            _ => Err(format!("Invalid fine status: {}", s)),
        }
    }
}

/// 罰金 - 1件の延滞返却に対して最大1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    pub fine_id: FineId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub amount: Decimal,
    pub days_late: u32,
    pub status: FineStatus,
    pub assessed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    /// 免除した職員（免除時のみ）
    pub waived_by: Option<StaffId>,
}

/// 罰金の試算結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FineQuote {
    pub days_late: u32,
    /// 猶予日数を差し引いた課金対象日数
    pub chargeable_days: u32,
    pub amount: Decimal,
    /// 上限で頭打ちになったか
    pub capped: bool,
}

/// 返却期限からの経過日数（端数切り捨て、期限前は0）
pub fn days_late(due_date: DateTime<Utc>, returned_or_now: DateTime<Utc>) -> u32 {
    let days = (returned_or_now - due_date).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// 純粋関数：罰金額を計算する
///
/// 何度呼んでも同じ結果を返す。未返却の貸出で`returned_or_now`が進むと、
/// 金額は単調非減少で`fine_cap`を超えない。
pub fn calculate_fine(
    due_date: DateTime<Utc>,
    returned_or_now: DateTime<Utc>,
    envelope: &BorrowingEnvelope,
) -> FineQuote {
    let days_late = days_late(due_date, returned_or_now);
    let chargeable_days = days_late.saturating_sub(envelope.grace_period_days);

    let raw = (Decimal::from(chargeable_days) * envelope.daily_fine_rate).round_dp(2);
    let capped = raw > envelope.fine_cap;
    let amount = if capped { envelope.fine_cap } else { raw };

    FineQuote {
        days_late,
        chargeable_days,
        amount,
        capped,
    }
}

/// 純粋関数：返却済みの貸出に罰金を課す
///
/// 金額が0の場合は罰金を作成しない。
pub fn assess_fine(
    loan: &ReturnedLoan,
    envelope: &BorrowingEnvelope,
    assessed_at: DateTime<Utc>,
) -> Option<Fine> {
    let quote = calculate_fine(loan.due_date, loan.returned_at, envelope);
    if quote.amount.is_zero() {
        return None;
    }

    Some(Fine {
        fine_id: FineId::new(),
        loan_id: loan.loan_id,
        member_id: loan.member_id,
        amount: quote.amount,
        days_late: quote.days_late,
        status: FineStatus::Pending,
        assessed_at,
        settled_at: None,
        waived_by: None,
    })
}

/// 純粋関数：罰金を支払い済みにする
pub fn pay_fine(fine: &Fine, paid_at: DateTime<Utc>) -> Result<Fine, FineError> {
    if fine.status != FineStatus::Pending {
        return Err(FineError::AlreadySettled(fine.status));
    }

    Ok(Fine {
        status: FineStatus::Paid,
        settled_at: Some(paid_at),
        ..fine.clone()
    })
}

/// 純粋関数：罰金を免除する（管理操作）
pub fn waive_fine(
    fine: &Fine,
    waived_by: StaffId,
    waived_at: DateTime<Utc>,
) -> Result<Fine, FineError> {
    if fine.status != FineStatus::Pending {
        return Err(FineError::AlreadySettled(fine.status));
    }

    Ok(Fine {
        status: FineStatus::Waived,
        settled_at: Some(waived_at),
        waived_by: Some(waived_by),
        ..fine.clone()
    })
}

/// 未払い罰金の合計
pub fn outstanding_total<'a>(fines: impl IntoIterator<Item = &'a Fine>) -> Decimal {
    fines
        .into_iter()
        .filter(|f| f.status == FineStatus::Pending)
        .map(|f| f.amount)
        .sum()
}
