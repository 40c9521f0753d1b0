use crate::domain::{
    self, BookId, BorrowDenial, BorrowGrant, BorrowingEnvelope, DomainEvent, Fine,
    FineQuote, Loan, LoanId, LoanStatus, MemberId, RenewalDenial, ReservationId, ReturnedLoan,
    authorize_borrow, calculate_fine, commands::*, resolve_envelope,
};
use crate::ports::{LoanView, VersionConflict};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::overdue_detection::mark_loan_overdue;
use super::projector::build_loan_view;
use crate::application::{
    LibraryApplicationError, Result, ServiceDependencies,
    member::{borrower_standing, find_subscription, member_envelope},
    notifications,
    reservation::settle_book_queue,
    settings::current_policy,
};

/// 返却の結果
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub loan: LoanView,
    /// 返却時に計上された罰金（自動計上が有効で延滞していた場合）
    pub fine: Option<Fine>,
}

/// 貸出詳細
#[derive(Debug, Clone)]
pub struct LoanDetail {
    pub loan: LoanView,
    /// 未返却の場合、今返却したときの罰金見込み
    pub advisory_fine: Option<FineQuote>,
    /// 返却済みの場合、確定した罰金
    pub fine: Option<Fine>,
}

/// イベントストアから貸出集約を復元する
///
/// 復元した集約と、楽観的排他制御に使うバージョン（イベント数）を返す。
pub(crate) async fn load_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<(Loan, usize)> {
    let events = deps
        .event_store
        .load(loan_id)
        .await
        .map_err(LibraryApplicationError::EventStoreError)?;

    let loan = domain::replay_events(&events)?.ok_or(LibraryApplicationError::LoanNotFound)?;
    Ok((loan, events.len()))
}

/// イベントを追加する。バージョン競合は`ConcurrentModification`になる
pub(crate) async fn append_events(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    expected_version: usize,
    events: Vec<DomainEvent>,
) -> Result<()> {
    deps.event_store
        .append(loan_id, expected_version, events)
        .await
        .map_err(|e| {
            if e.downcast_ref::<VersionConflict>().is_some() {
                LibraryApplicationError::ConcurrentModification
            } else {
                LibraryApplicationError::EventStoreError(e)
            }
        })
}

/// Read Modelに集約の完全な状態を保存する
pub(crate) async fn save_view(deps: &ServiceDependencies, loan: &Loan) -> Result<LoanView> {
    let view = build_loan_view(loan);
    deps.loan_read_model
        .save(view.clone())
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;
    Ok(view)
}

/// 新しい貸出を作成してイベントを保存する
///
/// 棚から取り出した本（または予約で取り置いた本）がある前提。
/// 失敗時の本の扱いは呼び出し側で行う。
///
/// 先にRead Modelで同時貸出の枠を確保し、同じ会員の並行した貸出が
/// 上限を超えないようにする。イベント保存に失敗した場合は枠を取り消す。
pub(crate) async fn open_loan(
    deps: &ServiceDependencies,
    book_id: BookId,
    member_id: MemberId,
    grant: BorrowGrant,
    max_open_loans: u32,
    reservation_id: Option<ReservationId>,
) -> Result<LoanView> {
    let (loan, event) = domain::borrow_book(book_id, member_id, grant, reservation_id);
    let view = build_loan_view(&Loan::Active(loan));

    let claimed = deps
        .loan_read_model
        .claim_loan_slot(view.clone(), max_open_loans)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;
    if !claimed {
        return Err(BorrowDenial::LoanLimitReached {
            limit: max_open_loans,
        }
        .into());
    }

    let appended = append_events(deps, view.loan_id, 0, vec![DomainEvent::BookBorrowed(event)]).await;
    if let Err(e) = appended {
        if let Err(discard_err) = deps.loan_read_model.discard(view.loan_id).await {
            warn!(loan_id = %view.loan_id, error = %discard_err, "Failed to discard loan view");
        }
        return Err(e);
    }

    info!(
        loan_id = %view.loan_id,
        book_id = %book_id,
        member_id = %member_id,
        due_date = %view.due_date,
        "Book borrowed"
    );
    Ok(view)
}

/// 書籍を貸し出す
///
/// ビジネスルール（判定順）：
/// - 会員と書籍が存在すること
/// - 棚に本があること
/// - 同時貸出上限未満であること
/// - 未払い罰金が閾値以下であること
/// - 延滞中の貸出がないこと
///
/// 判定後に棚から1冊を条件付きで取り出す。最後の1冊の取り合いに負けた場合は
/// `NoCopyAvailable`。同じ会員の並行した貸出で上限に達した場合は`LoanLimitReached`。
/// 貸出の作成に失敗した場合は本を棚に戻す。
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<LoanView> {
    // 1. 会員の貸出条件
    let envelope = member_envelope(deps, cmd.member_id).await?;

    // 2. 在庫
    let availability = deps
        .book_service
        .availability(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    // 3. 貸出判定（純粋関数）
    let standing = borrower_standing(deps, cmd.member_id, cmd.borrowed_at).await?;
    let grant = authorize_borrow(
        &standing,
        &envelope,
        availability.available_copies,
        cmd.borrowed_at,
    )?;

    // 4. 棚から取り出す
    let checked_out = deps
        .book_service
        .try_checkout_copy(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::BookServiceError)?;
    if !checked_out {
        return Err(BorrowDenial::NoCopyAvailable.into());
    }

    // 5. 貸出を作成（同時貸出の枠を確保してからイベントを保存）
    match open_loan(
        deps,
        cmd.book_id,
        cmd.member_id,
        grant,
        envelope.max_concurrent_loans,
        None,
    )
    .await
    {
        Ok(view) => Ok(view),
        Err(e) => {
            warn!(book_id = %cmd.book_id, error = %e, "Borrow failed after checkout, releasing copy");
            if let Err(release_err) = deps.book_service.release_copies(cmd.book_id, 1).await {
                warn!(book_id = %cmd.book_id, error = %release_err, "Failed to release copy");
            }
            Err(e)
        }
    }
}

/// 貸出を延長する
///
/// ビジネスルール：
/// - 延滞中（期限を過ぎている場合を含む）は延長不可
/// - 延長は2回まで
/// - 新しい期限は延長時点 + 会員の貸出期間
/// - 他の会員の予約待ちは延長を妨げない
pub async fn renew_loan(deps: &ServiceDependencies, cmd: RenewLoan) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let active = match loan {
        Loan::Active(active) => active,
        Loan::Overdue(_) => return Err(RenewalDenial::LoanOverdueCannotRenew.into()),
        Loan::Returned(_) => return Err(RenewalDenial::AlreadyReturned.into()),
    };

    let envelope = member_envelope(deps, active.member_id).await?;
    let (renewed, event) = domain::renew_loan(active, &envelope, cmd.renewed_at)?;

    append_events(
        deps,
        cmd.loan_id,
        version,
        vec![DomainEvent::LoanRenewed(event.clone())],
    )
    .await?;

    info!(
        loan_id = %cmd.loan_id,
        renewal_count = event.renewal_count,
        new_due_date = %event.new_due_date,
        "Loan renewed"
    );

    let view = save_view(deps, &Loan::Active(renewed.clone())).await?;
    notifications::loan_renewed(deps, &renewed).await;

    Ok(view)
}

/// 書籍を返却する
///
/// - 延滞していても返却は受け付ける
/// - 返却された本はまず予約待ち行列に渡し、待ちがなければ棚に戻す
/// - 自動計上が有効で延滞していれば、返却時点の会員区分で罰金を確定する
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<ReturnOutcome> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let (returned, event) = domain::return_book(loan, cmd.returned_at)?;

    append_events(
        deps,
        cmd.loan_id,
        version,
        vec![DomainEvent::BookReturned(event.clone())],
    )
    .await?;

    info!(
        loan_id = %cmd.loan_id,
        was_overdue = event.was_overdue,
        days_late = event.days_late,
        "Book returned"
    );

    // 返却は確定済み。空いた本は後続の処理が失敗しても必ず行き先を決める
    hand_back_copy(deps, returned.book_id, cmd.returned_at).await?;

    let view = save_view(deps, &Loan::Returned(returned.clone())).await?;

    let policy = current_policy(deps).await?;
    let fine = if policy.auto_charge_fines && event.was_overdue {
        let subscription = find_subscription(deps, returned.member_id).await?;
        let envelope = resolve_envelope(&subscription, &policy);
        charge_fine(deps, &returned, &envelope, cmd.returned_at).await?
    } else {
        None
    };

    Ok(ReturnOutcome { loan: view, fine })
}

/// 返却された本を予約待ち行列に渡す
///
/// 精算に失敗した場合は棚に戻す。返却イベントは保存済みで再実行できないため、
/// ここで本を取りこぼすと在庫が戻らない。
async fn hand_back_copy(
    deps: &ServiceDependencies,
    book_id: BookId,
    returned_at: DateTime<Utc>,
) -> Result<()> {
    let Err(e) = settle_book_queue(deps, book_id, 1, returned_at).await else {
        return Ok(());
    };

    warn!(book_id = %book_id, error = %e, "Queue settlement failed after return, releasing copy");
    deps.book_service
        .release_copies(book_id, 1)
        .await
        .map_err(LibraryApplicationError::BookServiceError)
}

/// 返却済みの貸出に罰金を計上する
async fn charge_fine(
    deps: &ServiceDependencies,
    loan: &ReturnedLoan,
    envelope: &BorrowingEnvelope,
    assessed_at: DateTime<Utc>,
) -> Result<Option<Fine>> {
    let Some(fine) = domain::assess_fine(loan, envelope, assessed_at) else {
        return Ok(None);
    };

    let inserted = deps
        .fine_repository
        .insert(&fine)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;
    if !inserted {
        return Err(LibraryApplicationError::FineAlreadyAssessed);
    }

    info!(
        fine_id = %fine.fine_id,
        loan_id = %fine.loan_id,
        amount = %fine.amount,
        days_late = fine.days_late,
        "Fine assessed"
    );
    notifications::fine_assessed(deps, &fine, loan.book_id).await;

    Ok(Some(fine))
}

/// 職員が返却済みの貸出に罰金を計上する
///
/// 自動計上が無効な運用で使う。1件の貸出につき1回まで。
pub async fn assess_loan_fine(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    assessed_at: DateTime<Utc>,
) -> Result<Fine> {
    let (loan, _) = load_loan(deps, loan_id).await?;

    let Loan::Returned(returned) = loan else {
        return Err(LibraryApplicationError::InvalidLoanState(
            "Loan has not been returned yet".to_string(),
        ));
    };

    let existing = deps
        .fine_repository
        .find_by_loan(loan_id)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;
    if existing.is_some() {
        return Err(LibraryApplicationError::FineAlreadyAssessed);
    }

    let envelope = member_envelope(deps, returned.member_id).await?;
    charge_fine(deps, &returned, &envelope, assessed_at)
        .await?
        .ok_or(LibraryApplicationError::NoFineDue)
}

/// 貸出詳細を取得する
///
/// 期限を過ぎたactiveの貸出はここで延滞に遷移させる。
/// 未返却なら罰金見込み、返却済みなら確定した罰金を添える。
pub async fn get_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<LoanDetail> {
    let mut view = deps
        .loan_read_model
        .get_by_id(loan_id)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?
        .ok_or(LibraryApplicationError::LoanNotFound)?;

    if view.status == LoanStatus::Active && view.is_past_due(now) {
        if let Some(updated) = mark_loan_overdue(deps, loan_id, now).await? {
            view = updated;
        }
    }

    if view.status.is_open() {
        let envelope = member_envelope(deps, view.member_id).await?;
        let quote = calculate_fine(view.due_date, now, &envelope);
        return Ok(LoanDetail {
            loan: view,
            advisory_fine: Some(quote),
            fine: None,
        });
    }

    let fine = deps
        .fine_repository
        .find_by_loan(loan_id)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;

    Ok(LoanDetail {
        loan: view,
        advisory_fine: None,
        fine,
    })
}

/// 会員の貸出一覧を取得する（新しい順）
///
/// ステータスで絞り込む前に、期限を過ぎたactiveの貸出を延滞に遷移させる。
pub async fn list_loans(
    deps: &ServiceDependencies,
    member_id: MemberId,
    status: Option<LoanStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<LoanView>> {
    let loans = deps
        .loan_read_model
        .find_by_member_id(member_id)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;

    let mut settled = Vec::with_capacity(loans.len());
    for view in loans {
        if view.status == LoanStatus::Active && view.is_past_due(now) {
            if let Some(updated) = mark_loan_overdue(deps, view.loan_id, now).await? {
                settled.push(updated);
                continue;
            }
        }
        settled.push(view);
    }

    Ok(settled
        .into_iter()
        .filter(|loan| status.is_none_or(|s| loan.status == s))
        .collect())
}
