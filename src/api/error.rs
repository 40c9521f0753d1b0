use crate::application::LibraryApplicationError;
use crate::domain::{
    BorrowDenial, FineError, RenewalDenial, ReservationDenial, ReservationError, ReturnBookError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーとリクエスト不正をHTTPレスポンスにマッピングする。
#[derive(Debug)]
pub enum ApiError {
    Application(LibraryApplicationError),
    /// クエリやボディの値が不正
    BadRequest(String),
}

impl From<LibraryApplicationError> for ApiError {
    fn from(err: LibraryApplicationError) -> Self {
        ApiError::Application(err)
    }
}

/// ビジネスルール違反の安定したエラーコード
fn rule_code(err: &LibraryApplicationError) -> (StatusCode, &'static str) {
    use LibraryApplicationError as E;

    let unprocessable = StatusCode::UNPROCESSABLE_ENTITY;
    match err {
        E::MemberNotFound => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
        E::BookNotFound => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
        E::LoanNotFound => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
        E::ReservationNotFound => (StatusCode::NOT_FOUND, "RESERVATION_NOT_FOUND"),
        E::FineNotFound => (StatusCode::NOT_FOUND, "FINE_NOT_FOUND"),

        E::BorrowDenied(denial) => match denial {
            BorrowDenial::NoCopyAvailable => (unprocessable, "NO_COPY_AVAILABLE"),
            BorrowDenial::LoanLimitReached { .. } => (unprocessable, "LOAN_LIMIT_REACHED"),
            BorrowDenial::OutstandingFineBlock { .. } => (unprocessable, "OUTSTANDING_FINE_BLOCK"),
            BorrowDenial::OverdueLoanBlock => (unprocessable, "OVERDUE_LOAN_BLOCK"),
        },
        E::RenewalDenied(denial) => match denial {
            RenewalDenial::LoanOverdueCannotRenew => (unprocessable, "LOAN_OVERDUE_CANNOT_RENEW"),
            RenewalDenial::RenewalLimitReached { .. } => (unprocessable, "RENEWAL_LIMIT_REACHED"),
            RenewalDenial::AlreadyReturned => (unprocessable, "LOAN_ALREADY_RETURNED"),
        },
        E::ReturnRejected(ReturnBookError::AlreadyReturned) => {
            (unprocessable, "LOAN_ALREADY_RETURNED")
        }
        E::ReservationDenied(denial) => match denial {
            ReservationDenial::CopyAvailable => (unprocessable, "COPY_AVAILABLE"),
            ReservationDenial::AlreadyReserved => (unprocessable, "ALREADY_RESERVED"),
            ReservationDenial::AlreadyBorrowed => (unprocessable, "ALREADY_BORROWED"),
        },
        E::Reservation(err) => match err {
            ReservationError::NotPending(_) => (unprocessable, "RESERVATION_NOT_PENDING"),
            ReservationError::NotReady(_) => (unprocessable, "RESERVATION_NOT_READY"),
            ReservationError::AlreadyClosed(_) => (unprocessable, "RESERVATION_CLOSED"),
            ReservationError::PickupWindowElapsed => (unprocessable, "PICKUP_WINDOW_ELAPSED"),
            ReservationError::PickupWindowOpen => (unprocessable, "PICKUP_WINDOW_OPEN"),
            ReservationError::NotQueueHead => (unprocessable, "NOT_QUEUE_HEAD"),
        },
        E::Fine(FineError::AlreadySettled(_)) => (unprocessable, "FINE_ALREADY_SETTLED"),
        E::InvalidPolicy(_) => (StatusCode::BAD_REQUEST, "INVALID_POLICY"),
        E::InvalidLoanState(_) => (unprocessable, "INVALID_LOAN_STATE"),
        E::NoFineDue => (unprocessable, "NO_FINE_DUE"),
        E::FineAlreadyAssessed => (StatusCode::CONFLICT, "FINE_ALREADY_ASSESSED"),
        E::ConcurrentModification => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),

        // インフラ障害はinto_responseで処理する
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),

            // 500 Internal Server Error - システム障害
            // 詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Application(err) if err.is_infrastructure() => {
                let source = std::error::Error::source(&err)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::error!(error = %err, source = %source, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }

            // 4xx - ビジネスルール違反、存在しないリソース、競合
            ApiError::Application(err) => {
                let (status, code) = rule_code(&err);
                (status, code, err.to_string())
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
