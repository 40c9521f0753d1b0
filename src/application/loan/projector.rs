use crate::domain::{DomainEvent, Loan, LoanId, replay_events};
use crate::ports::{LoanReadModel, LoanView};
use futures::StreamExt;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::super::{LibraryApplicationError, Result, ServiceDependencies};

/// 貸出集約からRead Model用のビューを構築する
///
/// 集約の完全な状態をビューに変換する。部分更新はしない。
pub fn build_loan_view(loan: &Loan) -> LoanView {
    let core = loan.core();
    LoanView {
        loan_id: core.loan_id,
        book_id: core.book_id,
        member_id: core.member_id,
        reservation_id: core.reservation_id,
        borrowed_at: core.borrowed_at,
        due_date: core.due_date,
        returned_at: loan.returned_at(),
        renewal_count: core.renewal_count.value(),
        status: loan.status(),
        created_at: core.created_at,
        updated_at: core.updated_at,
    }
}

/// ドメインイベントをRead Modelに投影する
///
/// 集約の全イベント（時系列順）から状態を再構築し、ビューを保存する。
pub async fn project_loan_events(
    read_model: &dyn LoanReadModel,
    events: &[DomainEvent],
) -> Result<Option<LoanView>> {
    let Some(loan) = replay_events(events)? else {
        return Ok(None);
    };

    let view = build_loan_view(&loan);
    read_model
        .save(view.clone())
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;

    Ok(Some(view))
}

/// イベントログからRead Modelを再構築する
///
/// 全イベントを集約ごとにまとめて再生する。復元できない集約は警告を出して飛ばす。
/// 再構築したビューの件数を返す。
pub async fn rebuild_loan_views(deps: &ServiceDependencies) -> Result<usize> {
    let mut streams: BTreeMap<LoanId, Vec<DomainEvent>> = BTreeMap::new();

    let mut events = deps.event_store.stream_all();
    while let Some(event) = events.next().await {
        let event = event.map_err(LibraryApplicationError::EventStoreError)?;
        streams.entry(event.loan_id()).or_default().push(event);
    }
    drop(events);

    let mut rebuilt = 0;
    for (loan_id, events) in streams {
        match project_loan_events(deps.loan_read_model.as_ref(), &events).await {
            Ok(Some(_)) => rebuilt += 1,
            Ok(None) => {}
            Err(LibraryApplicationError::CorruptedEventStream(e)) => {
                warn!(loan_id = %loan_id, error = %e, "Skipping loan with corrupted event stream");
            }
            Err(e) => return Err(e),
        }
    }

    info!(rebuilt, "Loan read model rebuilt");
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BookId, BorrowGrant, MemberId, borrow_book, mark_overdue, renew_loan, resolve_envelope,
        return_book, LibraryPolicy, LoanStatus, Subscription,
    };
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReadModel {
        loans: Mutex<HashMap<LoanId, LoanView>>,
    }

    impl RecordingReadModel {
        fn get(&self, loan_id: LoanId) -> Option<LoanView> {
            self.loans.lock().unwrap().get(&loan_id).cloned()
        }
    }

    #[async_trait::async_trait]
    impl LoanReadModel for RecordingReadModel {
        async fn save(&self, loan_view: LoanView) -> crate::ports::loan_read_model::Result<()> {
            self.loans.lock().unwrap().insert(loan_view.loan_id, loan_view);
            Ok(())
        }

        async fn claim_loan_slot(
            &self,
            loan_view: LoanView,
            _max_open_loans: u32,
        ) -> crate::ports::loan_read_model::Result<bool> {
            self.loans.lock().unwrap().insert(loan_view.loan_id, loan_view);
            Ok(true)
        }

        async fn discard(&self, loan_id: LoanId) -> crate::ports::loan_read_model::Result<()> {
            self.loans.lock().unwrap().remove(&loan_id);
            Ok(())
        }

        async fn get_open_loans_for_member(
            &self,
            _member_id: MemberId,
        ) -> crate::ports::loan_read_model::Result<Vec<LoanView>> {
            Ok(vec![])
        }

        async fn find_overdue_candidates(
            &self,
            _cutoff_date: chrono::DateTime<Utc>,
        ) -> crate::ports::loan_read_model::Result<Vec<LoanView>> {
            Ok(vec![])
        }

        async fn get_by_id(
            &self,
            loan_id: LoanId,
        ) -> crate::ports::loan_read_model::Result<Option<LoanView>> {
            Ok(self.get(loan_id))
        }

        async fn find_by_member_id(
            &self,
            _member_id: MemberId,
        ) -> crate::ports::loan_read_model::Result<Vec<LoanView>> {
            Ok(vec![])
        }
    }

    fn borrowed(now: chrono::DateTime<Utc>) -> (crate::domain::ActiveLoan, DomainEvent) {
        let grant = BorrowGrant {
            borrowed_at: now,
            due_date: now + Duration::days(7),
        };
        let (loan, event) = borrow_book(BookId::new(), MemberId::new(), grant, None);
        (loan, DomainEvent::BookBorrowed(event))
    }

    #[tokio::test]
    async fn test_project_empty_events_is_noop() {
        let read_model = RecordingReadModel::default();
        let result = project_loan_events(&read_model, &[]).await.unwrap();
        assert!(result.is_none());
        assert!(read_model.loans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_project_borrowed_then_renewed() {
        let read_model = RecordingReadModel::default();
        let now = Utc::now();
        let envelope = resolve_envelope(&Subscription::free(), &LibraryPolicy::default());
        let (loan, borrowed) = borrowed(now);
        let (renewed, renewed_event) = renew_loan(loan, &envelope, now + Duration::days(3)).unwrap();

        project_loan_events(
            &read_model,
            &[borrowed, DomainEvent::LoanRenewed(renewed_event)],
        )
        .await
        .unwrap();

        let view = read_model.get(renewed.loan_id).unwrap();
        assert_eq!(view.status, LoanStatus::Active);
        assert_eq!(view.renewal_count, 1);
        assert_eq!(view.due_date, renewed.due_date);
        assert_eq!(view.returned_at, None);
    }

    #[tokio::test]
    async fn test_project_overdue_then_returned() {
        let read_model = RecordingReadModel::default();
        let now = Utc::now();
        let (loan, borrowed) = borrowed(now);
        let loan_id = loan.loan_id;
        let (overdue, overdue_event) = mark_overdue(loan, now + Duration::days(8)).unwrap();

        project_loan_events(
            &read_model,
            &[borrowed.clone(), DomainEvent::LoanBecameOverdue(overdue_event.clone())],
        )
        .await
        .unwrap();
        assert_eq!(read_model.get(loan_id).unwrap().status, LoanStatus::Overdue);

        let returned_at = now + Duration::days(9);
        let (_, returned_event) = return_book(Loan::Overdue(overdue), returned_at).unwrap();
        project_loan_events(
            &read_model,
            &[
                borrowed,
                DomainEvent::LoanBecameOverdue(overdue_event),
                DomainEvent::BookReturned(returned_event),
            ],
        )
        .await
        .unwrap();

        let view = read_model.get(loan_id).unwrap();
        assert_eq!(view.status, LoanStatus::Returned);
        assert_eq!(view.returned_at, Some(returned_at));
    }

    #[tokio::test]
    async fn test_project_rejects_invalid_stream() {
        let read_model = RecordingReadModel::default();
        let now = Utc::now();
        let (loan, borrowed) = borrowed(now);
        let (_, returned) = return_book(Loan::Active(loan), now).unwrap();
        let returned = DomainEvent::BookReturned(returned);

        let result =
            project_loan_events(&read_model, &[borrowed, returned.clone(), returned]).await;
        assert!(matches!(
            result,
            Err(LibraryApplicationError::CorruptedEventStream(_))
        ));
    }
}
