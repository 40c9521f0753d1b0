use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{
    fine::MemberFines,
    loan::{LoanDetail, ReturnOutcome},
    reservation::{CopiesAdded, ReservationDetail, ReservationOutcome},
    sweep::SweepReport,
};
use crate::domain::{
    Fine, FineQuote, FineStatus, LoanStatus, ReservationStatus, commands::ReservationAction,
};
use crate::ports::LoanView;

// ============================================================================
// Requests
// ============================================================================

/// POST /api/borrowings/borrow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLoansQuery {
    /// 会員ID（必須）
    pub member_id: Option<Uuid>,
    /// ステータスでフィルタリング（active, overdue, returned）
    pub status: Option<String>,
}

/// POST /api/reservations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReservationsQuery {
    pub member_id: Option<Uuid>,
}

/// PATCH /api/reservations/:id
#[derive(Debug, Deserialize)]
pub struct ReservationActionRequest {
    pub action: ReservationAction,
}

/// POST /api/fines/:id/waive
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiveFineRequest {
    pub staff_id: Uuid,
}

/// POST /api/books/:id/copies
#[derive(Debug, Deserialize)]
pub struct AddCopiesRequest {
    pub count: u32,
}

// ============================================================================
// Responses
// ============================================================================

/// 貸出レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_date: Option<DateTime<Utc>>,
    pub renewal_count: u8,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LoanView> for LoanResponse {
    fn from(view: LoanView) -> Self {
        Self {
            loan_id: view.loan_id.value(),
            book_id: view.book_id.value(),
            member_id: view.member_id.value(),
            reservation_id: view.reservation_id.map(|id| id.value()),
            borrowed_date: view.borrowed_at,
            due_date: view.due_date,
            returned_date: view.returned_at,
            renewal_count: view.renewal_count,
            status: view.status,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// GET /api/borrowings/:id
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetailResponse {
    #[serde(flatten)]
    pub loan: LoanResponse,
    /// 今返却した場合の罰金見込み（未返却のみ）
    pub advisory_fine: Option<FineQuote>,
    pub fine: Option<FineResponse>,
}

impl From<LoanDetail> for LoanDetailResponse {
    fn from(detail: LoanDetail) -> Self {
        Self {
            loan: detail.loan.into(),
            advisory_fine: detail.advisory_fine,
            fine: detail.fine.map(FineResponse::from),
        }
    }
}

/// POST /api/borrowings/:id/return
#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    pub loan: LoanResponse,
    pub fine: Option<FineResponse>,
}

impl From<ReturnOutcome> for ReturnResponse {
    fn from(outcome: ReturnOutcome) -> Self {
        Self {
            loan: outcome.loan.into(),
            fine: outcome.fine.map(FineResponse::from),
        }
    }
}

/// 罰金レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FineResponse {
    pub fine_id: Uuid,
    pub loan_id: Uuid,
    pub member_id: Uuid,
    pub amount: Decimal,
    pub days_late: u32,
    pub status: FineStatus,
    pub assessed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub waived_by: Option<Uuid>,
}

impl From<Fine> for FineResponse {
    fn from(fine: Fine) -> Self {
        Self {
            fine_id: fine.fine_id.value(),
            loan_id: fine.loan_id.value(),
            member_id: fine.member_id.value(),
            amount: fine.amount,
            days_late: fine.days_late,
            status: fine.status,
            assessed_at: fine.assessed_at,
            settled_at: fine.settled_at,
            waived_by: fine.waived_by.map(|id| id.value()),
        }
    }
}

/// GET /api/members/:id/fines
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFinesResponse {
    pub member_id: Uuid,
    pub fines: Vec<FineResponse>,
    pub outstanding_total: Decimal,
}

impl MemberFinesResponse {
    pub fn new(member_id: Uuid, fines: MemberFines) -> Self {
        Self {
            member_id,
            fines: fines.fines.into_iter().map(FineResponse::from).collect(),
            outstanding_total: fines.outstanding_total,
        }
    }
}

/// 予約レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub reservation_id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub status: ReservationStatus,
    pub queue_position: u32,
    /// pendingの場合の待ち順（1始まり）
    pub queue_rank: Option<u32>,
    pub reserved_date: DateTime<Utc>,
    pub ready_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<ReservationDetail> for ReservationResponse {
    fn from(detail: ReservationDetail) -> Self {
        let r = detail.reservation;
        Self {
            reservation_id: r.reservation_id.value(),
            book_id: r.book_id.value(),
            member_id: r.member_id.value(),
            status: r.status,
            queue_position: r.queue_position,
            queue_rank: detail.queue_rank,
            reserved_date: r.reserved_at,
            ready_date: r.ready_at,
            expiry_date: r.expires_at,
            closed_at: r.closed_at,
        }
    }
}

/// PATCH /api/reservations/:id
#[derive(Debug, Serialize)]
pub struct ReservationActionResponse {
    pub reservation: ReservationResponse,
    /// completeで作成された貸出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan: Option<LoanResponse>,
}

impl From<ReservationOutcome> for ReservationActionResponse {
    fn from(outcome: ReservationOutcome) -> Self {
        Self {
            reservation: outcome.reservation.into(),
            loan: outcome.loan.map(LoanResponse::from),
        }
    }
}

/// POST /api/books/:id/copies
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiesAddedResponse {
    pub book_id: Uuid,
    pub total_copies: u32,
    pub available_copies: u32,
    pub promoted_reservations: Vec<Uuid>,
}

impl From<CopiesAdded> for CopiesAddedResponse {
    fn from(added: CopiesAdded) -> Self {
        Self {
            book_id: added.book_id.value(),
            total_copies: added.total_copies,
            available_copies: added.available_copies,
            promoted_reservations: added
                .promoted
                .iter()
                .map(|r| r.reservation_id.value())
                .collect(),
        }
    }
}

/// POST /api/admin/sweep
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub overdue_loans: usize,
    pub expired_reservations: usize,
    pub promoted_reservations: usize,
}

impl From<SweepReport> for SweepResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            overdue_loans: report.overdue_loans,
            expired_reservations: report.expired_reservations,
            promoted_reservations: report.promoted_reservations,
        }
    }
}

/// POST /api/admin/rebuild-views
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub rebuilt_loans: usize,
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}
