use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, MemberId, ReservationId};

/// イベント：書籍が貸し出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowed {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// 予約の受取から作られた貸出の場合のみ
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
}

/// イベント：貸出が延長された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRenewed {
    pub loan_id: LoanId,
    pub old_due_date: DateTime<Utc>,
    pub new_due_date: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub renewal_count: u8,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub returned_at: DateTime<Utc>,
    pub was_overdue: bool,
    pub days_late: u32,
}

/// イベント：貸出が延滞した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBecameOverdue {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
}

/// 貸出集約のドメインイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    BookBorrowed(BookBorrowed),
    LoanRenewed(LoanRenewed),
    BookReturned(BookReturned),
    LoanBecameOverdue(LoanBecameOverdue),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BookBorrowed(_) => "BookBorrowed",
            DomainEvent::LoanRenewed(_) => "LoanRenewed",
            DomainEvent::BookReturned(_) => "BookReturned",
            DomainEvent::LoanBecameOverdue(_) => "LoanBecameOverdue",
        }
    }

    pub fn loan_id(&self) -> LoanId {
        match self {
            DomainEvent::BookBorrowed(e) => e.loan_id,
            DomainEvent::LoanRenewed(e) => e.loan_id,
            DomainEvent::BookReturned(e) => e.loan_id,
            DomainEvent::LoanBecameOverdue(e) => e.loan_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BookBorrowed(e) => e.borrowed_at,
            DomainEvent::LoanRenewed(e) => e.renewed_at,
            DomainEvent::BookReturned(e) => e.returned_at,
            DomainEvent::LoanBecameOverdue(e) => e.detected_at,
        }
    }
}
