use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    authorize_renewal, days_late, BookBorrowed, BookId, BookReturned, BorrowGrant,
    BorrowingEnvelope, DomainEvent, LoanBecameOverdue, LoanId, LoanRenewed, MemberId,
    RenewalCount, RenewalDenial, ReservationId, ReturnBookError,
};

/// 貸出ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    /// 返却されていない（会員の手元にある）か
    pub fn is_open(&self) -> bool {
        !matches!(self, LoanStatus::Returned)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// Loan集約の共通フィールド
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCore {
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub member_id: MemberId,
    pub reservation_id: Option<ReservationId>,

    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub renewal_count: RenewalCount,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 貸出中状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for ActiveLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 延滞中状態（延長不可）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for OverdueLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態（読み取り専用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub returned_at: DateTime<Utc>,
}

impl std::ops::Deref for ReturnedLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Loan集約 - 1冊の書籍の1回の貸出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Loan {
    Active(ActiveLoan),
    Overdue(OverdueLoan),
    Returned(ReturnedLoan),
}

impl Loan {
    pub fn core(&self) -> &LoanCore {
        match self {
            Loan::Active(l) => &l.core,
            Loan::Overdue(l) => &l.core,
            Loan::Returned(l) => &l.core,
        }
    }

    pub fn status(&self) -> LoanStatus {
        match self {
            Loan::Active(_) => LoanStatus::Active,
            Loan::Overdue(_) => LoanStatus::Overdue,
            Loan::Returned(_) => LoanStatus::Returned,
        }
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Loan::Returned(l) => Some(l.returned_at),
            _ => None,
        }
    }
}

/// 純粋関数：書籍を貸し出す
///
/// 貸出可否の判定（`authorize_borrow`）は済んでいる前提。
/// 返却期限は許可に含まれる期限をそのまま使う。
pub fn borrow_book(
    book_id: BookId,
    member_id: MemberId,
    grant: BorrowGrant,
    reservation_id: Option<ReservationId>,
) -> (ActiveLoan, BookBorrowed) {
    let loan_id = LoanId::new();

    let loan = ActiveLoan {
        core: LoanCore {
            loan_id,
            book_id,
            member_id,
            reservation_id,
            borrowed_at: grant.borrowed_at,
            due_date: grant.due_date,
            renewal_count: RenewalCount::new(),
            created_at: grant.borrowed_at,
            updated_at: grant.borrowed_at,
        },
    };

    let event = BookBorrowed {
        loan_id,
        book_id,
        member_id,
        borrowed_at: grant.borrowed_at,
        due_date: grant.due_date,
        reservation_id,
    };

    (loan, event)
}

/// 純粋関数：貸出を延長する
///
/// ActiveLoanのみ受け付ける。延長時点で期限を過ぎていれば
/// 延滞扱いとして拒否する（スイープ前でも同じ判定になる）。
pub fn renew_loan(
    loan: ActiveLoan,
    envelope: &BorrowingEnvelope,
    renewed_at: DateTime<Utc>,
) -> Result<(ActiveLoan, LoanRenewed), RenewalDenial> {
    let status = if renewed_at > loan.due_date {
        LoanStatus::Overdue
    } else {
        LoanStatus::Active
    };

    let new_due_date = authorize_renewal(status, loan.renewal_count, envelope, renewed_at)?;
    let renewal_count = loan.renewal_count.increment()?;

    let loan_id = loan.loan_id;
    let old_due_date = loan.due_date;

    let renewed = ActiveLoan {
        core: LoanCore {
            due_date: new_due_date,
            renewal_count,
            updated_at: renewed_at,
            ..loan.core
        },
    };

    let event = LoanRenewed {
        loan_id,
        old_due_date,
        new_due_date,
        renewed_at,
        renewal_count: renewal_count.value(),
    };

    Ok((renewed, event))
}

/// 純粋関数：延滞を検出する
///
/// 期限を過ぎていなければNoneを返す。
pub fn mark_overdue(
    loan: ActiveLoan,
    detected_at: DateTime<Utc>,
) -> Option<(OverdueLoan, LoanBecameOverdue)> {
    if detected_at <= loan.due_date {
        return None;
    }

    let event = LoanBecameOverdue {
        loan_id: loan.loan_id,
        book_id: loan.book_id,
        member_id: loan.member_id,
        due_date: loan.due_date,
        detected_at,
    };

    let overdue = OverdueLoan {
        core: LoanCore {
            updated_at: detected_at,
            ..loan.core
        },
    };

    Some((overdue, event))
}

/// 純粋関数：書籍を返却する
///
/// ActiveまたはOverdueを受け付ける。延滞していても返却は受け付ける。
/// 罰金の確定は呼び出し側が`assess_fine`で行う。
pub fn return_book(
    loan: Loan,
    returned_at: DateTime<Utc>,
) -> Result<(ReturnedLoan, BookReturned), ReturnBookError> {
    let (core, already_overdue) = match loan {
        Loan::Active(active) => (active.core, false),
        Loan::Overdue(overdue) => (overdue.core, true),
        Loan::Returned(_) => return Err(ReturnBookError::AlreadyReturned),
    };

    let days_late = days_late(core.due_date, returned_at);
    let was_overdue = already_overdue || returned_at > core.due_date;

    let event = BookReturned {
        loan_id: core.loan_id,
        book_id: core.book_id,
        member_id: core.member_id,
        returned_at,
        was_overdue,
        days_late,
    };

    let returned = ReturnedLoan {
        core: LoanCore {
            updated_at: returned_at,
            ..core
        },
        returned_at,
    };

    Ok((returned, event))
}

/// 純粋関数：延滞判定
///
/// スイープ前のActiveLoanも期限を過ぎていれば延滞とみなす。
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    match loan {
        Loan::Overdue(_) => true,
        Loan::Active(a) => now > a.due_date,
        Loan::Returned(_) => false,
    }
}

/// 永続化されたイベント列が不正な状態遷移を含む
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid loan state transition: {event_type} cannot apply to {state}")]
pub struct InvalidTransition {
    pub event_type: &'static str,
    pub state: &'static str,
}

/// イベントを適用して新しい状態を生成する純粋関数
///
/// イベントソーシングのfoldで使用される。
pub fn apply_event(loan: Option<Loan>, event: &DomainEvent) -> Result<Loan, InvalidTransition> {
    let invalid = |state: &'static str| InvalidTransition {
        event_type: event.event_type(),
        state,
    };

    match (loan, event) {
        (None, DomainEvent::BookBorrowed(e)) => Ok(Loan::Active(ActiveLoan {
            core: LoanCore {
                loan_id: e.loan_id,
                book_id: e.book_id,
                member_id: e.member_id,
                reservation_id: e.reservation_id,
                borrowed_at: e.borrowed_at,
                due_date: e.due_date,
                renewal_count: RenewalCount::new(),
                created_at: e.borrowed_at,
                updated_at: e.borrowed_at,
            },
        })),
        (None, _) => Err(invalid("empty")),

        (Some(Loan::Active(active)), DomainEvent::LoanRenewed(e)) => {
            let renewal_count =
                RenewalCount::try_from(e.renewal_count).map_err(|_| invalid("active"))?;
            Ok(Loan::Active(ActiveLoan {
                core: LoanCore {
                    due_date: e.new_due_date,
                    renewal_count,
                    updated_at: e.renewed_at,
                    ..active.core
                },
            }))
        }

        (Some(Loan::Active(active)), DomainEvent::LoanBecameOverdue(e)) => {
            Ok(Loan::Overdue(OverdueLoan {
                core: LoanCore {
                    updated_at: e.detected_at,
                    ..active.core
                },
            }))
        }

        (Some(Loan::Active(ActiveLoan { core })), DomainEvent::BookReturned(e))
        | (Some(Loan::Overdue(OverdueLoan { core })), DomainEvent::BookReturned(e)) => {
            Ok(Loan::Returned(ReturnedLoan {
                core: LoanCore {
                    updated_at: e.returned_at,
                    ..core
                },
                returned_at: e.returned_at,
            }))
        }

        (Some(loan), _) => Err(invalid(loan.status().as_str())),
    }
}

/// イベント列から現在の状態を復元する純粋関数
///
/// イベントが空の場合は`Ok(None)`。
pub fn replay_events(events: &[DomainEvent]) -> Result<Option<Loan>, InvalidTransition> {
    events
        .iter()
        .try_fold(None, |loan, event| apply_event(loan, event).map(Some))
}
