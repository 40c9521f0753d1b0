use crate::domain::{
    self, BookId, BorrowDenial, MemberId, Reservation, ReservationDenial, ReservationError,
    ReservationId, ReservationStatus, authorize_borrow, authorize_reservation, commands::*,
    queue_head, queue_rank,
};
use crate::ports::{DuplicateReservation, LoanView};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use super::queue::{SettleOutcome, settle_book_queue};
use crate::application::{
    LibraryApplicationError, Result, ServiceDependencies,
    loan::open_loan,
    member::{borrower_standing, find_subscription, member_envelope},
    notifications,
};

/// 予約と待ち順
#[derive(Debug, Clone)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    /// pendingの場合の待ち順（1始まり）
    pub queue_rank: Option<u32>,
}

/// 予約操作の結果
#[derive(Debug, Clone)]
pub struct ReservationOutcome {
    pub reservation: ReservationDetail,
    /// 受取（complete）で作成された貸出
    pub loan: Option<LoanView>,
}

/// 蔵書追加の結果
#[derive(Debug, Clone)]
pub struct CopiesAdded {
    pub book_id: BookId,
    pub total_copies: u32,
    pub available_copies: u32,
    /// 追加した本でreadyになった予約
    pub promoted: Vec<Reservation>,
}

async fn find_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
) -> Result<Reservation> {
    deps.reservation_repository
        .get_by_id(reservation_id)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?
        .ok_or(LibraryApplicationError::ReservationNotFound)
}

async fn live_for_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Vec<Reservation>> {
    deps.reservation_repository
        .find_live_for_book(book_id)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)
}

fn describe(live: &[Reservation], reservation: Reservation) -> ReservationDetail {
    let queue_rank = queue_rank(live, &reservation);
    ReservationDetail {
        reservation,
        queue_rank,
    }
}

/// 予約を受け付ける
///
/// ビジネスルール：
/// - 会員と書籍が存在すること
/// - 会員がその本を借りていないこと
/// - 会員がその本の有効な予約を持っていないこと
/// - 棚に本がないこと（あれば貸出を使う）
///
/// 待ち順はストアが書籍ごとに直列化して採番する。
pub async fn place_reservation(
    deps: &ServiceDependencies,
    cmd: PlaceReservation,
) -> Result<ReservationDetail> {
    find_subscription(deps, cmd.member_id).await?;

    let availability = deps
        .book_service
        .availability(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    // 期限切れの取り置きを先に精算しておく
    settle_book_queue(deps, cmd.book_id, 0, cmd.reserved_at).await?;

    let live = live_for_book(deps, cmd.book_id).await?;
    let has_live_reservation = live.iter().any(|r| r.member_id == cmd.member_id);

    let has_book_on_loan = deps
        .loan_read_model
        .get_open_loans_for_member(cmd.member_id)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?
        .iter()
        .any(|loan| loan.book_id == cmd.book_id);

    authorize_reservation(
        availability.available_copies,
        has_live_reservation,
        has_book_on_loan,
    )?;

    let reservation = domain::place_reservation(cmd.book_id, cmd.member_id, cmd.reserved_at);
    let queue_position = deps
        .reservation_repository
        .append_to_queue(reservation.clone())
        .await
        .map_err(|e| {
            if e.downcast_ref::<DuplicateReservation>().is_some() {
                LibraryApplicationError::from(ReservationDenial::AlreadyReserved)
            } else {
                LibraryApplicationError::ReservationStoreError(e)
            }
        })?;

    info!(
        reservation_id = %reservation.reservation_id,
        book_id = %cmd.book_id,
        member_id = %cmd.member_id,
        queue_position,
        "Reservation placed"
    );

    let reservation = Reservation {
        queue_position,
        ..reservation
    };
    let live = live_for_book(deps, cmd.book_id).await?;
    Ok(describe(&live, reservation))
}

/// 予約を操作する（markReady / complete / cancel）
///
/// 操作の前に書籍の待ち行列を精算するため、受取期限を過ぎた取り置きは
/// この時点でexpiredになっている。
pub async fn act_on_reservation(
    deps: &ServiceDependencies,
    cmd: ActOnReservation,
) -> Result<ReservationOutcome> {
    let reservation = find_reservation(deps, cmd.reservation_id).await?;
    settle_book_queue(deps, reservation.book_id, 0, cmd.acted_at).await?;
    let reservation = find_reservation(deps, cmd.reservation_id).await?;

    let (reservation, loan) = match cmd.action {
        ReservationAction::MarkReady => (mark_ready(deps, reservation, cmd.acted_at).await?, None),
        ReservationAction::Complete => {
            let (reservation, loan) = complete(deps, reservation, cmd.acted_at).await?;
            (reservation, Some(loan))
        }
        ReservationAction::Cancel => (cancel(deps, reservation, cmd.acted_at).await?, None),
    };

    let live = live_for_book(deps, reservation.book_id).await?;
    Ok(ReservationOutcome {
        reservation: describe(&live, reservation),
        loan,
    })
}

/// 職員が待ち行列の先頭を取り置きにする
///
/// 棚から1冊を取り出して割り当てる。先頭以外は飛ばせない。
async fn mark_ready(
    deps: &ServiceDependencies,
    reservation: Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation> {
    let ready = domain::mark_ready(&reservation, now)?;

    let live = live_for_book(deps, reservation.book_id).await?;
    let is_head =
        queue_head(&live).is_some_and(|head| head.reservation_id == reservation.reservation_id);
    if !is_head {
        return Err(ReservationError::NotQueueHead.into());
    }

    let checked_out = deps
        .book_service
        .try_checkout_copy(reservation.book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?;
    if !checked_out {
        return Err(BorrowDenial::NoCopyAvailable.into());
    }

    let applied = deps
        .reservation_repository
        .transition(ReservationStatus::Pending, &ready)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?;
    if !applied {
        deps.book_service
            .release_copies(reservation.book_id, 1)
            .await
            .map_err(LibraryApplicationError::BookServiceError)?;
        return Err(LibraryApplicationError::ConcurrentModification);
    }

    info!(reservation_id = %ready.reservation_id, "Reservation marked ready by staff");
    notifications::reservation_ready(deps, &ready).await;

    Ok(ready)
}

/// 会員が取り置きの本を受け取る
///
/// 取り置きの本で貸出を作成する。会員は通常の貸出と同じ判定
/// （同時貸出上限、未払い罰金、延滞）を満たす必要がある。
async fn complete(
    deps: &ServiceDependencies,
    reservation: Reservation,
    now: DateTime<Utc>,
) -> Result<(Reservation, LoanView)> {
    let completed = domain::complete(&reservation, now)?;

    let envelope = member_envelope(deps, reservation.member_id).await?;
    let standing = borrower_standing(deps, reservation.member_id, now).await?;
    // 取り置きの1冊がある
    let grant = authorize_borrow(&standing, &envelope, 1, now)?;

    let applied = deps
        .reservation_repository
        .transition(ReservationStatus::Ready, &completed)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?;
    if !applied {
        return Err(LibraryApplicationError::ConcurrentModification);
    }

    let view = match open_loan(
        deps,
        reservation.book_id,
        reservation.member_id,
        grant,
        envelope.max_concurrent_loans,
        Some(reservation.reservation_id),
    )
    .await
    {
        Ok(view) => view,
        Err(e) => {
            warn!(
                reservation_id = %reservation.reservation_id,
                error = %e,
                "Loan creation failed after pickup, handing copy back to the queue"
            );
            settle_book_queue(deps, reservation.book_id, 1, now).await?;
            return Err(e);
        }
    };

    info!(
        reservation_id = %completed.reservation_id,
        loan_id = %view.loan_id,
        "Reservation completed"
    );

    Ok((completed, view))
}

/// 予約を取り消す
///
/// 取り置き中（ready）だった場合、その本を次の予約に回す。
async fn cancel(
    deps: &ServiceDependencies,
    reservation: Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation> {
    let cancelled = domain::cancel(&reservation, now)?;

    let applied = deps
        .reservation_repository
        .transition(reservation.status, &cancelled)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?;
    if !applied {
        return Err(LibraryApplicationError::ConcurrentModification);
    }

    info!(
        reservation_id = %cancelled.reservation_id,
        previous_status = %reservation.status,
        "Reservation cancelled"
    );

    if reservation.status == ReservationStatus::Ready {
        settle_book_queue(deps, reservation.book_id, 1, now).await?;
    }

    Ok(cancelled)
}

/// 予約を取得する（読み取り時に待ち行列を精算する）
pub async fn get_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
    now: DateTime<Utc>,
) -> Result<ReservationDetail> {
    let reservation = find_reservation(deps, reservation_id).await?;
    if reservation.status.is_live() {
        settle_book_queue(deps, reservation.book_id, 0, now).await?;
    }

    let reservation = find_reservation(deps, reservation_id).await?;
    let live = live_for_book(deps, reservation.book_id).await?;
    Ok(describe(&live, reservation))
}

/// 会員の予約一覧（読み取り時に関係する待ち行列を精算する）
pub async fn list_reservations(
    deps: &ServiceDependencies,
    member_id: MemberId,
    now: DateTime<Utc>,
) -> Result<Vec<ReservationDetail>> {
    find_subscription(deps, member_id).await?;

    let reservations = deps
        .reservation_repository
        .find_by_member(member_id)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?;

    let books: BTreeSet<BookId> = reservations
        .iter()
        .filter(|r| r.status.is_live())
        .map(|r| r.book_id)
        .collect();
    if books.is_empty() {
        return Ok(reservations
            .into_iter()
            .map(|reservation| ReservationDetail {
                reservation,
                queue_rank: None,
            })
            .collect());
    }

    let mut queues = HashMap::new();
    for book_id in books {
        settle_book_queue(deps, book_id, 0, now).await?;
        queues.insert(book_id, live_for_book(deps, book_id).await?);
    }

    let reservations = deps
        .reservation_repository
        .find_by_member(member_id)
        .await
        .map_err(LibraryApplicationError::ReservationStoreError)?;

    Ok(reservations
        .into_iter()
        .map(|reservation| match queues.get(&reservation.book_id) {
            Some(live) => describe(live, reservation),
            None => ReservationDetail {
                reservation,
                queue_rank: None,
            },
        })
        .collect())
}

/// 蔵書を追加する
///
/// 追加した本はまず予約待ち行列に割り当て、残りを棚に置く。
pub async fn add_copies(
    deps: &ServiceDependencies,
    book_id: BookId,
    count: u32,
    now: DateTime<Utc>,
) -> Result<CopiesAdded> {
    deps.book_service
        .availability(book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    deps.book_service
        .add_copies(book_id, count)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?;

    let SettleOutcome { promoted, .. } = settle_book_queue(deps, book_id, count, now).await?;

    let availability = deps
        .book_service
        .availability(book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    info!(
        book_id = %book_id,
        added = count,
        promoted = promoted.len(),
        available_copies = availability.available_copies,
        "Copies added"
    );

    Ok(CopiesAdded {
        book_id,
        total_copies: availability.total_copies,
        available_copies: availability.available_copies,
        promoted,
    })
}
