use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{
    LibraryApplicationError, Result, ServiceDependencies, loan::detect_overdue_loans,
    reservation::settle_book_queue,
};

/// スイープの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 延滞にした貸出
    pub overdue_loans: usize,
    /// 受取期限切れにした予約
    pub expired_reservations: usize,
    /// 回収した本でreadyにした予約
    pub promoted_reservations: usize,
}

/// 定期スイープ
///
/// 延滞検出と、受取期限を過ぎた取り置きの精算を行う。
/// 精算は読み取り時にも行われるため、スイープの間隔は正しさに影響しない。
/// 個々の貸出や書籍の失敗は他の処理を止めない。
pub async fn run_sweep(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<SweepReport> {
    let overdue_loans = detect_overdue_loans(deps, now).await?;

    let books: BTreeSet<_> = deps
        .reservation_repository
        .find_expired_ready(now)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?
        .into_iter()
        .map(|r| r.book_id)
        .collect();

    let mut report = SweepReport {
        overdue_loans,
        ..SweepReport::default()
    };
    for book_id in books {
        let outcome = match settle_book_queue(deps, book_id, 0, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(book_id = %book_id, error = %e, "Failed to settle reservation queue");
                continue;
            }
        };
        report.expired_reservations += outcome.expired.len();
        report.promoted_reservations += outcome.promoted.len();
    }

    info!(
        overdue_loans = report.overdue_loans,
        expired_reservations = report.expired_reservations,
        promoted_reservations = report.promoted_reservations,
        "Sweep finished"
    );

    Ok(report)
}
