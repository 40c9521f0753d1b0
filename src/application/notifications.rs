use crate::domain::{BookId, Fine, LoanCore, Reservation};
use tracing::warn;

use super::ServiceDependencies;

/// 通知メッセージ用の書籍タイトル。取得できなければIDで代用する
async fn book_title(deps: &ServiceDependencies, book_id: BookId) -> String {
    match deps.book_service.get_book_title(book_id).await {
        Ok(title) => title,
        Err(e) => {
            warn!(book_id = %book_id, error = %e, "Failed to look up book title");
            book_id.to_string()
        }
    }
}

// 通知の失敗はログに残すだけで、業務処理は失敗させない

pub(crate) async fn reservation_ready(deps: &ServiceDependencies, reservation: &Reservation) {
    let Some(pickup_by) = reservation.expires_at else {
        return;
    };
    let title = book_title(deps, reservation.book_id).await;

    if let Err(e) = deps
        .notification_service
        .send_reservation_ready(reservation.member_id, &title, pickup_by)
        .await
    {
        warn!(
            reservation_id = %reservation.reservation_id,
            error = %e,
            "Failed to send reservation ready notification"
        );
    }
}

pub(crate) async fn loan_overdue(deps: &ServiceDependencies, loan: &LoanCore) {
    let title = book_title(deps, loan.book_id).await;

    if let Err(e) = deps
        .notification_service
        .send_overdue_notification(loan.member_id, &title, loan.due_date)
        .await
    {
        warn!(loan_id = %loan.loan_id, error = %e, "Failed to send overdue notification");
    }
}

pub(crate) async fn loan_renewed(deps: &ServiceDependencies, loan: &LoanCore) {
    let title = book_title(deps, loan.book_id).await;

    if let Err(e) = deps
        .notification_service
        .send_renewal_confirmation(loan.member_id, &title, loan.due_date)
        .await
    {
        warn!(loan_id = %loan.loan_id, error = %e, "Failed to send renewal confirmation");
    }
}

pub(crate) async fn fine_assessed(deps: &ServiceDependencies, fine: &Fine, book_id: BookId) {
    let title = book_title(deps, book_id).await;

    if let Err(e) = deps
        .notification_service
        .send_fine_notice(fine.member_id, &title, fine.amount)
        .await
    {
        warn!(fine_id = %fine.fine_id, error = %e, "Failed to send fine notice");
    }
}
