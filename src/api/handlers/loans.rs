use crate::application::loan;
use crate::domain::{
    commands::{BorrowBook, RenewLoan, ReturnBook},
    value_objects::{BookId, LoanId, MemberId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::api::{
    error::ApiError,
    types::{
        BorrowRequest, FineResponse, ListLoansQuery, LoanDetailResponse, LoanResponse,
        ReturnResponse, parse_status_filter,
    },
};

/// POST /api/borrowings/borrow - 書籍を借りる
///
/// 強制されるビジネスルール（判定順）:
/// - 棚に本があること
/// - 同時貸出上限未満であること
/// - 未払い罰金が閾値以下であること
/// - 延滞中の貸出がないこと
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BorrowRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = BorrowBook {
        book_id: BookId::from_uuid(req.book_id),
        member_id: MemberId::from_uuid(req.member_id),
        borrowed_at: Utc::now(),
    };

    let loan = loan::borrow_book(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(loan.into())))
}

/// GET /api/borrowings?memberId=&status= - 会員の貸出一覧
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let member_id = query
        .member_id
        .ok_or_else(|| ApiError::BadRequest("memberId query parameter is required".to_string()))?;

    let status = query
        .status
        .as_deref()
        .map(parse_status_filter)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let loans = loan::list_loans(
        &state.service_deps,
        MemberId::from_uuid(member_id),
        status,
        Utc::now(),
    )
    .await?;

    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// GET /api/borrowings/:id - 貸出詳細（罰金見込み付き）
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanDetailResponse>, ApiError> {
    let detail = loan::get_loan(&state.service_deps, LoanId::from_uuid(loan_id), Utc::now()).await?;
    Ok(Json(detail.into()))
}

/// POST /api/borrowings/:id/renew - 貸出を延長
///
/// 延滞中は不可、最大2回まで。新しい期限は今日から貸出期間分。
pub async fn renew_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = RenewLoan {
        loan_id: LoanId::from_uuid(loan_id),
        renewed_at: Utc::now(),
    };

    let loan = loan::renew_loan(&state.service_deps, cmd).await?;
    Ok(Json(loan.into()))
}

/// POST /api/borrowings/:id/return - 書籍を返却
///
/// 延滞していても受け付ける。自動計上が有効なら罰金を確定する。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<ReturnResponse>, ApiError> {
    let cmd = ReturnBook {
        loan_id: LoanId::from_uuid(loan_id),
        returned_at: Utc::now(),
    };

    let outcome = loan::return_book(&state.service_deps, cmd).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/borrowings/:id/fine - 罰金を手動で計上
pub async fn assess_fine(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<(StatusCode, Json<FineResponse>), ApiError> {
    let fine =
        loan::assess_loan_fine(&state.service_deps, LoanId::from_uuid(loan_id), Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(fine.into())))
}
