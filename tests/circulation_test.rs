mod common;

use bookflix_circulation::adapters::mock::SentNotification;
use bookflix_circulation::application::{LibraryApplicationError, fine, loan, settings, sweep};
use bookflix_circulation::domain::commands::*;
use bookflix_circulation::domain::{
    BookId, BorrowDenial, DomainEvent, FineStatus, LibraryPolicy, LoanStatus, RenewalDenial,
    ReturnBookError, StaffId,
};
use bookflix_circulation::ports::{BookService, EventStore, FineRepository, LoanReadModel};
use chrono::{DateTime, Duration, Utc};
use common::TestHarness;
use rust_decimal::Decimal;

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

// ============================================================================
// 貸出
// ============================================================================

#[tokio::test]
async fn test_borrow_book_success() {
    // Arrange
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 2);
    let borrowed_at = Utc::now();

    // Act
    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    // Assert: 標準会員は7日間
    assert_eq!(view.status, LoanStatus::Active);
    assert_eq!(view.due_date, borrowed_at + Duration::days(7));
    assert_eq!(view.renewal_count, 0);

    let events = h.event_store.load(view.loan_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], DomainEvent::BookBorrowed(_)));

    let stored = h.loan_read_model.get_by_id(view.loan_id).await.unwrap();
    assert_eq!(stored, Some(view));

    let availability = h.deps.book_service.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 1);
}

#[tokio::test]
async fn test_premium_member_gets_longer_loan_period() {
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let book_id = h.book("Neuromancer", 1);
    let borrowed_at = Utc::now();

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    assert_eq!(view.due_date, borrowed_at + Duration::days(20));
}

#[tokio::test]
async fn test_borrow_unknown_member_or_book() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let result = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id: bookflix_circulation::domain::MemberId::new(),
            borrowed_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(result, Err(LibraryApplicationError::MemberNotFound)));

    let result = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: bookflix_circulation::domain::BookId::new(),
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(result, Err(LibraryApplicationError::BookNotFound)));
}

#[tokio::test]
async fn test_standard_member_limited_to_one_loan() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let first = h.book("Dune", 1);
    let second = h.book("Emma", 3);

    loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: first,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let result = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: second,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LibraryApplicationError::BorrowDenied(
            BorrowDenial::LoanLimitReached { limit: 1 }
        ))
    ));

    // 在庫は減っていない
    let availability = h.deps.book_service.availability(second).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 3);
}

#[tokio::test]
async fn test_no_copy_available_for_second_member() {
    let h = TestHarness::new();
    let alice = h.standard_member();
    let bob = h.standard_member();
    let book_id = h.book("Dune", 1);

    loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id: alice,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let result = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id: bob,
            borrowed_at: Utc::now(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LibraryApplicationError::BorrowDenied(
            BorrowDenial::NoCopyAvailable
        ))
    ));
}

// ============================================================================
// 延長
// ============================================================================

#[tokio::test]
async fn test_renewal_limit_and_new_due_date() {
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: days_ago(2),
        },
    )
    .await
    .unwrap();

    let renewed_at = Utc::now();
    let first = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: view.loan_id,
            renewed_at,
        },
    )
    .await
    .unwrap();
    assert_eq!(first.renewal_count, 1);
    assert_eq!(first.due_date, renewed_at + Duration::days(20));

    let second = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: view.loan_id,
            renewed_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    assert_eq!(second.renewal_count, 2);

    let third = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: view.loan_id,
            renewed_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(
        third,
        Err(LibraryApplicationError::RenewalDenied(
            RenewalDenial::RenewalLimitReached { limit: 2 }
        ))
    ));

    let confirmations = h
        .notifications
        .sent()
        .into_iter()
        .filter(|n| matches!(n, SentNotification::RenewalConfirmation { .. }))
        .count();
    assert_eq!(confirmations, 2);
}

#[tokio::test]
async fn test_past_due_loan_cannot_be_renewed() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: days_ago(10),
        },
    )
    .await
    .unwrap();

    let result = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: view.loan_id,
            renewed_at: Utc::now(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LibraryApplicationError::RenewalDenied(
            RenewalDenial::LoanOverdueCannotRenew
        ))
    ));
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_renewal() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);
    h.notifications.fail_deliveries(true);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let renewed = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: view.loan_id,
            renewed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    assert_eq!(renewed.renewal_count, 1);
    assert!(h.notifications.sent().is_empty());
}

// ============================================================================
// 返却と罰金
// ============================================================================

#[tokio::test]
async fn test_on_time_return_has_no_fine() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: days_ago(3),
        },
    )
    .await
    .unwrap();

    let outcome = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: view.loan_id,
            returned_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert!(outcome.loan.returned_at.is_some());
    assert!(outcome.fine.is_none());

    let availability = h.deps.book_service.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 1);
}

#[tokio::test]
async fn test_premium_late_return_charges_discounted_fine() {
    // 期限5日超過、$0.50/日、プレミアム50%割引 → $1.25
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let book_id = h.book("Dune", 1);
    let borrowed_at = days_ago(40);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    let outcome = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: view.loan_id,
            returned_at: borrowed_at + Duration::days(25),
        },
    )
    .await
    .unwrap();

    let charged = outcome.fine.unwrap();
    assert_eq!(charged.amount, Decimal::new(125, 2));
    assert_eq!(charged.days_late, 5);
    assert_eq!(charged.status, FineStatus::Pending);

    let member_fines = fine::list_member_fines(&h.deps, member_id).await.unwrap();
    assert_eq!(member_fines.outstanding_total, Decimal::new(125, 2));

    assert!(h.notifications.sent().iter().any(|n| matches!(
        n,
        SentNotification::FineNotice { book_title, amount, .. }
            if book_title == "Dune" && *amount == Decimal::new(125, 2)
    )));
}

#[tokio::test]
async fn test_outstanding_fine_blocks_until_paid() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);
    let other = h.book("Emma", 1);
    let borrowed_at = days_ago(20);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    let outcome = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: view.loan_id,
            returned_at: borrowed_at + Duration::days(10),
        },
    )
    .await
    .unwrap();
    let charged = outcome.fine.unwrap();
    assert_eq!(charged.amount, Decimal::new(150, 2));

    let blocked = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: other,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(
        blocked,
        Err(LibraryApplicationError::BorrowDenied(
            BorrowDenial::OutstandingFineBlock { .. }
        ))
    ));

    let paid = fine::pay_fine(
        &h.deps,
        PayFine {
            fine_id: charged.fine_id,
            paid_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    assert_eq!(paid.status, FineStatus::Paid);

    let retry = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: other,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_settled_fine_cannot_be_settled_again() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);
    let borrowed_at = days_ago(20);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();
    let charged = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: view.loan_id,
            returned_at: borrowed_at + Duration::days(9),
        },
    )
    .await
    .unwrap()
    .fine
    .unwrap();

    let staff_id = StaffId::new();
    let waived = fine::waive_fine(
        &h.deps,
        WaiveFine {
            fine_id: charged.fine_id,
            staff_id,
            waived_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    assert_eq!(waived.status, FineStatus::Waived);
    assert_eq!(waived.waived_by, Some(staff_id));

    let result = fine::pay_fine(
        &h.deps,
        PayFine {
            fine_id: charged.fine_id,
            paid_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(result, Err(LibraryApplicationError::Fine(_))));

    let total = h.fines.outstanding_total(member_id).await.unwrap();
    assert_eq!(total, Decimal::ZERO);
}

#[tokio::test]
async fn test_book_cannot_be_returned_twice() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let cmd = ReturnBook {
        loan_id: view.loan_id,
        returned_at: Utc::now(),
    };
    loan::return_book(&h.deps, cmd.clone()).await.unwrap();
    let result = loan::return_book(&h.deps, cmd).await;

    assert!(matches!(
        result,
        Err(LibraryApplicationError::ReturnRejected(
            ReturnBookError::AlreadyReturned
        ))
    ));

    // 2回目の返却で在庫は増えない
    let availability = h.deps.book_service.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 1);
}

#[tokio::test]
async fn test_returned_copy_is_released_when_view_update_fails() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let failing = h.deps_with_failing_saves(|view| view.status == LoanStatus::Returned);
    let cmd = ReturnBook {
        loan_id: view.loan_id,
        returned_at: Utc::now(),
    };

    let result = loan::return_book(&failing, cmd.clone()).await;
    assert!(matches!(result, Err(LibraryApplicationError::ReadModelError(_))));

    // 返却イベントは保存済みなので再実行はできない
    let retry = loan::return_book(&h.deps, cmd).await;
    assert!(matches!(
        retry,
        Err(LibraryApplicationError::ReturnRejected(
            ReturnBookError::AlreadyReturned
        ))
    ));

    // それでも本は棚に戻っている
    let availability = h.deps.book_service.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 1);
}

#[tokio::test]
async fn test_manual_fine_assessment_when_auto_charge_disabled() {
    let h = TestHarness::new();
    settings::update_policy(
        &h.deps,
        LibraryPolicy {
            auto_charge_fines: false,
            ..LibraryPolicy::default()
        },
    )
    .await
    .unwrap();

    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);
    let borrowed_at = days_ago(20);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    // 未返却の貸出には計上できない
    let early = loan::assess_loan_fine(&h.deps, view.loan_id, Utc::now()).await;
    assert!(matches!(
        early,
        Err(LibraryApplicationError::InvalidLoanState(_))
    ));

    let outcome = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: view.loan_id,
            returned_at: borrowed_at + Duration::days(11),
        },
    )
    .await
    .unwrap();
    assert!(outcome.fine.is_none());

    let assessed = loan::assess_loan_fine(&h.deps, view.loan_id, Utc::now())
        .await
        .unwrap();
    assert_eq!(assessed.amount, Decimal::new(200, 2));
    assert_eq!(
        h.fines.find_by_loan(view.loan_id).await.unwrap(),
        Some(assessed)
    );

    let again = loan::assess_loan_fine(&h.deps, view.loan_id, Utc::now()).await;
    assert!(matches!(
        again,
        Err(LibraryApplicationError::FineAlreadyAssessed)
    ));
}

#[tokio::test]
async fn test_loan_detail_includes_advisory_fine() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at: days_ago(10),
        },
    )
    .await
    .unwrap();

    let detail = loan::get_loan(&h.deps, view.loan_id, Utc::now()).await.unwrap();

    // 読み取り時に延滞へ遷移する
    assert_eq!(detail.loan.status, LoanStatus::Overdue);
    let quote = detail.advisory_fine.unwrap();
    assert_eq!(quote.days_late, 3);
    assert_eq!(quote.amount, Decimal::new(150, 2));
    assert!(detail.fine.is_none());
}

// ============================================================================
// 延滞
// ============================================================================

#[tokio::test]
async fn test_detect_overdue_loans() {
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let late = h.book("Dune", 1);
    let fresh = h.book("Emma", 1);
    let other = h.book("Ulysses", 1);

    loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: fresh,
            member_id,
            borrowed_at: days_ago(1),
        },
    )
    .await
    .unwrap();
    let late_view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: late,
            member_id,
            borrowed_at: days_ago(25),
        },
    )
    .await
    .unwrap();

    let detected = loan::detect_overdue_loans(&h.deps, Utc::now()).await.unwrap();
    assert_eq!(detected, 1);

    let stored = h
        .loan_read_model
        .get_by_id(late_view.loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);

    let events = h.event_store.load(late_view.loan_id).await.unwrap();
    assert!(matches!(events.last(), Some(DomainEvent::LoanBecameOverdue(_))));

    assert!(h.notifications.sent().iter().any(|n| matches!(
        n,
        SentNotification::Overdue { book_title, .. } if book_title == "Dune"
    )));

    // 2回目の検出では何もしない
    let again = loan::detect_overdue_loans(&h.deps, Utc::now()).await.unwrap();
    assert_eq!(again, 0);

    // 延滞中の貸出があると新しい貸出はできない
    let blocked = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: other,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await;
    assert!(matches!(
        blocked,
        Err(LibraryApplicationError::BorrowDenied(
            BorrowDenial::OverdueLoanBlock
        ))
    ));
}

#[tokio::test]
async fn test_overdue_detection_continues_past_failing_loan() {
    let h = TestHarness::new();
    let alice = h.standard_member();
    let bob = h.standard_member();
    let dune = h.book("Dune", 1);
    let emma = h.book("Emma", 1);

    let mut loans = Vec::new();
    for (book_id, member_id) in [(dune, alice), (emma, bob)] {
        let view = loan::borrow_book(
            &h.deps,
            BorrowBook {
                book_id,
                member_id,
                borrowed_at: days_ago(10),
            },
        )
        .await
        .unwrap();
        loans.push(view);
    }

    let failing_id = loans[0].loan_id;
    let deps = h.deps_with_failing_saves(move |view| {
        view.loan_id == failing_id && view.status == LoanStatus::Overdue
    });

    let detected = loan::detect_overdue_loans(&deps, Utc::now()).await.unwrap();
    assert_eq!(detected, 1);

    let stored = h
        .loan_read_model
        .get_by_id(loans[1].loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);

    // スイープも止まらない
    assert!(sweep::run_sweep(&deps, Utc::now()).await.is_ok());
}

#[tokio::test]
async fn test_list_loans_filters_by_status() {
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let dune = h.book("Dune", 1);
    let emma = h.book("Emma", 1);

    let returned = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: dune,
            member_id,
            borrowed_at: days_ago(2),
        },
    )
    .await
    .unwrap();
    loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: returned.loan_id,
            returned_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    let active = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: emma,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let all = loan::list_loans(&h.deps, member_id, None, Utc::now()).await.unwrap();
    assert_eq!(all.len(), 2);

    let open = loan::list_loans(&h.deps, member_id, Some(LoanStatus::Active), Utc::now())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].loan_id, active.loan_id);
}

// ============================================================================
// Read Model再構築
// ============================================================================

#[tokio::test]
async fn test_rebuild_loan_views_from_events() {
    let h = TestHarness::new();
    let member_id = h.premium_member();
    let dune = h.book("Dune", 1);
    let emma = h.book("Emma", 1);

    let first = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: dune,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    let first = loan::renew_loan(
        &h.deps,
        RenewLoan {
            loan_id: first.loan_id,
            renewed_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    let second = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id: emma,
            member_id,
            borrowed_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    let second = loan::return_book(
        &h.deps,
        ReturnBook {
            loan_id: second.loan_id,
            returned_at: Utc::now(),
        },
    )
    .await
    .unwrap()
    .loan;

    let rebuilt = loan::rebuild_loan_views(&h.deps).await.unwrap();
    assert_eq!(rebuilt, 2);

    let first_view = h.loan_read_model.get_by_id(first.loan_id).await.unwrap().unwrap();
    assert_eq!(first_view, first);
    let second_view = h.loan_read_model.get_by_id(second.loan_id).await.unwrap().unwrap();
    assert_eq!(second_view, second);
}

// ============================================================================
// 管理設定
// ============================================================================

#[tokio::test]
async fn test_invalid_policy_is_rejected() {
    let h = TestHarness::new();

    let result = settings::update_policy(
        &h.deps,
        LibraryPolicy {
            standard_loan_days: 0,
            ..LibraryPolicy::default()
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(LibraryApplicationError::InvalidPolicy(_))
    ));

    // 保存されていないので既定値のまま
    assert_eq!(
        settings::current_policy(&h.deps).await.unwrap(),
        LibraryPolicy::default()
    );
}

#[tokio::test]
async fn test_policy_change_applies_to_next_borrow() {
    let h = TestHarness::new();
    settings::update_policy(
        &h.deps,
        LibraryPolicy {
            standard_loan_days: 14,
            ..LibraryPolicy::default()
        },
    )
    .await
    .unwrap();

    let member_id = h.standard_member();
    let book_id = h.book("Dune", 1);
    let borrowed_at = Utc::now();

    let view = loan::borrow_book(
        &h.deps,
        BorrowBook {
            book_id,
            member_id,
            borrowed_at,
        },
    )
    .await
    .unwrap();

    assert_eq!(view.due_date, borrowed_at + Duration::days(14));
}

// ============================================================================
// 並行性
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_by_one_member_respect_loan_limit() {
    let h = TestHarness::new();
    let member_id = h.standard_member();
    let books: Vec<BookId> = (0..8).map(|i| h.book(&format!("Volume {i}"), 1)).collect();

    let handles: Vec<_> = books
        .iter()
        .map(|&book_id| {
            let deps = h.deps.clone();
            tokio::spawn(async move {
                loan::borrow_book(
                    &deps,
                    BorrowBook {
                        book_id,
                        member_id,
                        borrowed_at: Utc::now(),
                    },
                )
                .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(
                e,
                LibraryApplicationError::BorrowDenied(BorrowDenial::LoanLimitReached { limit: 1 })
            )),
        }
    }

    // 標準会員の上限は1冊
    assert_eq!(succeeded, 1);
    let open = h.loan_read_model.get_open_loans_for_member(member_id).await.unwrap();
    assert_eq!(open.len(), 1);

    // 断られた貸出の本は棚に戻っている
    let mut available = 0;
    for book_id in books {
        available += h
            .deps
            .book_service
            .availability(book_id)
            .await
            .unwrap()
            .unwrap()
            .available_copies;
    }
    assert_eq!(available, 7);
}
