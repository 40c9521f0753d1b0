use crate::domain::{BookId, Reservation, TransitionKind, settle_queue};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::application::{LibraryApplicationError, Result, ServiceDependencies, notifications};

/// 精算の再試行上限（他のリクエストと状態遷移が競合した場合）
const MAX_SETTLE_ATTEMPTS: usize = 5;

/// 待ち行列の精算結果
#[derive(Debug, Clone, Default)]
pub struct SettleOutcome {
    /// 受取期限切れにした予約
    pub expired: Vec<Reservation>,
    /// readyにした予約
    pub promoted: Vec<Reservation>,
    /// 棚に戻した冊数
    pub released_copies: u32,
}

/// 書籍の予約待ち行列を精算する
///
/// `freed_copies`は呼び出し側が手放した本の冊数（返却、キャンセル、蔵書追加）。
/// 期限切れのreadyを閉じて本を回収し、FIFOでpendingに割り当て、残りを棚に戻す。
///
/// 遷移は条件付き更新で適用する。別のリクエストが先に遷移させていた場合は
/// 最新の状態を読み直して計画し直す。手元の本は必ず予約か棚のどちらかに渡る。
pub async fn settle_book_queue(
    deps: &ServiceDependencies,
    book_id: BookId,
    freed_copies: u32,
    now: DateTime<Utc>,
) -> Result<SettleOutcome> {
    let mut outcome = SettleOutcome::default();
    let mut free = freed_copies;

    for attempt in 1..=MAX_SETTLE_ATTEMPTS {
        let live = deps
            .reservation_repository
            .find_live_for_book(book_id)
            .await
            .map_err(LibraryApplicationError::ReservationStoreError)?;

        let settlement = settle_queue(&live, free, now);
        let mut conflicted = false;

        for transition in settlement.transitions {
            let applied = deps
                .reservation_repository
                .transition(transition.from, &transition.reservation)
                .await
                .map_err(LibraryApplicationError::ReservationStoreError)?;

            if !applied {
                debug!(
                    reservation_id = %transition.reservation.reservation_id,
                    attempt,
                    "Reservation changed concurrently, re-planning queue"
                );
                conflicted = true;
                break;
            }

            let reservation = transition.reservation;
            match transition.kind {
                TransitionKind::Expired => {
                    info!(
                        reservation_id = %reservation.reservation_id,
                        book_id = %book_id,
                        "Reservation pickup window elapsed"
                    );
                    free += 1;
                    outcome.expired.push(reservation);
                }
                TransitionKind::Promoted => {
                    info!(
                        reservation_id = %reservation.reservation_id,
                        book_id = %book_id,
                        queue_position = reservation.queue_position,
                        "Reservation ready for pickup"
                    );
                    free = free.saturating_sub(1);
                    notifications::reservation_ready(deps, &reservation).await;
                    outcome.promoted.push(reservation);
                }
            }
        }

        if !conflicted {
            break;
        }
        if attempt == MAX_SETTLE_ATTEMPTS {
            warn!(book_id = %book_id, "Queue settlement kept conflicting, shelving remaining copies");
        }
    }

    if free > 0 {
        deps.book_service
            .release_copies(book_id, free)
            .await
            .map_err(LibraryApplicationError::BookServiceError)?;
        outcome.released_copies = free;
    }

    Ok(outcome)
}
