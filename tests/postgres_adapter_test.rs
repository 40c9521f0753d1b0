//! PostgreSQLアダプターのテスト
//!
//! DATABASE_URLが指すデータベースが必要なため通常は実行しない。
//! `cargo test -- --ignored` で実行する。

mod common;

use bookflix_circulation::adapters::postgres::{
    PostgresBookInventory, PostgresEventStore, PostgresFineRepository, PostgresLoanReadModel,
    PostgresMemberDirectory, PostgresReservationRepository, PostgresSettingsStore,
};
use bookflix_circulation::domain::{
    BookBorrowed, BookId, DomainEvent, Fine, FineStatus, LibraryPolicy, LoanId, LoanRenewed,
    LoanStatus, MemberId, ReservationStatus, SubscriptionTier, place_reservation,
};
use bookflix_circulation::ports::{
    BookService, DuplicateReservation, EventStore, FineRepository, LoanReadModel, LoanView,
    MemberService, ReservationRepository, SettingsStore, VersionConflict,
};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use rust_decimal::Decimal;
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

/// PostgreSQLの時刻精度（マイクロ秒）に合わせて丸める
fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(dt.timestamp_micros()).expect("Invalid timestamp")
}

/// 各テストの前に全テーブルを空にする
async fn setup_pool() -> PgPool {
    let pool = common::create_test_pool().await;
    sqlx::query(
        "TRUNCATE TABLE events, loans_view, books, members, reservations, fines, library_settings",
    )
    .execute(&pool)
    .await
    .expect("Failed to truncate tables");
    pool
}

async fn insert_book(pool: &PgPool, book_id: BookId, copies: i32) {
    sqlx::query(
        "INSERT INTO books (book_id, title, total_copies, available_copies) VALUES ($1, $2, $3, $3)",
    )
    .bind(book_id.value())
    .bind("Dune")
    .bind(copies)
    .execute(pool)
    .await
    .expect("Failed to insert book");
}

fn borrowed_event(loan_id: LoanId, now: DateTime<Utc>) -> DomainEvent {
    DomainEvent::BookBorrowed(BookBorrowed {
        loan_id,
        book_id: BookId::new(),
        member_id: MemberId::new(),
        borrowed_at: now,
        due_date: now + Duration::days(7),
        reservation_id: None,
    })
}

// ============================================================================
// イベントストア
// ============================================================================

#[tokio::test]
#[serial]
#[ignore]
async fn test_event_store_append_and_load() {
    let pool = setup_pool().await;
    let store = PostgresEventStore::new(pool);
    let loan_id = LoanId::new();
    let now = truncate_to_micros(Utc::now());

    let borrowed = borrowed_event(loan_id, now);
    store.append(loan_id, 0, vec![borrowed.clone()]).await.unwrap();

    let renewed = DomainEvent::LoanRenewed(LoanRenewed {
        loan_id,
        old_due_date: now + Duration::days(7),
        new_due_date: now + Duration::days(8),
        renewed_at: now + Duration::days(1),
        renewal_count: 1,
    });
    store.append(loan_id, 1, vec![renewed.clone()]).await.unwrap();

    let events = store.load(loan_id).await.unwrap();
    assert_eq!(events, vec![borrowed, renewed]);

    let streamed: Vec<_> = store.stream_all().collect().await;
    assert_eq!(streamed.len(), 2);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_event_store_rejects_stale_version() {
    let pool = setup_pool().await;
    let store = PostgresEventStore::new(pool);
    let loan_id = LoanId::new();
    let now = Utc::now();

    store
        .append(loan_id, 0, vec![borrowed_event(loan_id, now)])
        .await
        .unwrap();

    let err = store
        .append(loan_id, 0, vec![borrowed_event(loan_id, now)])
        .await
        .unwrap_err();
    let conflict = err.downcast_ref::<VersionConflict>().unwrap();
    assert_eq!(conflict.expected, 0);
    assert_eq!(conflict.actual, 1);
}

// ============================================================================
// Read Model
// ============================================================================

#[tokio::test]
#[serial]
#[ignore]
async fn test_loan_read_model_save_is_idempotent() {
    let pool = setup_pool().await;
    let read_model = PostgresLoanReadModel::new(pool);
    let now = truncate_to_micros(Utc::now());
    let member_id = MemberId::new();

    let view = LoanView {
        loan_id: LoanId::new(),
        book_id: BookId::new(),
        member_id,
        reservation_id: None,
        borrowed_at: now - Duration::days(10),
        due_date: now - Duration::days(3),
        returned_at: None,
        renewal_count: 0,
        status: LoanStatus::Active,
        created_at: now,
        updated_at: now,
    };

    read_model.save(view.clone()).await.unwrap();
    read_model.save(view.clone()).await.unwrap();
    assert_eq!(read_model.get_by_id(view.loan_id).await.unwrap(), Some(view.clone()));

    let candidates = read_model.find_overdue_candidates(now).await.unwrap();
    assert_eq!(candidates.len(), 1);

    let returned = LoanView {
        status: LoanStatus::Returned,
        returned_at: Some(now),
        ..view.clone()
    };
    read_model.save(returned).await.unwrap();
    assert!(read_model
        .get_open_loans_for_member(member_id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(read_model.find_by_member_id(member_id).await.unwrap().len(), 1);
}

fn active_view(member_id: MemberId, now: DateTime<Utc>) -> LoanView {
    LoanView {
        loan_id: LoanId::new(),
        book_id: BookId::new(),
        member_id,
        reservation_id: None,
        borrowed_at: now,
        due_date: now + Duration::days(7),
        returned_at: None,
        renewal_count: 0,
        status: LoanStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore]
async fn test_loan_read_model_claims_respect_limit_under_concurrency() {
    let pool = setup_pool().await;
    let read_model = Arc::new(PostgresLoanReadModel::new(pool));
    let member_id = MemberId::new();
    let now = truncate_to_micros(Utc::now());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let read_model = read_model.clone();
            let view = active_view(member_id, now);
            tokio::spawn(async move { read_model.claim_loan_slot(view, 2).await.unwrap() })
        })
        .collect();

    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 2);

    let open = read_model.get_open_loans_for_member(member_id).await.unwrap();
    assert_eq!(open.len(), 2);

    // 取り消すと枠が空く
    read_model.discard(open[0].loan_id).await.unwrap();
    assert!(read_model
        .claim_loan_slot(active_view(member_id, now), 2)
        .await
        .unwrap());
}

// ============================================================================
// 在庫・会員
// ============================================================================

#[tokio::test]
#[serial]
#[ignore]
async fn test_book_inventory_never_goes_negative() {
    let pool = setup_pool().await;
    let book_id = BookId::new();
    insert_book(&pool, book_id, 1).await;
    let inventory = PostgresBookInventory::new(pool);

    assert!(inventory.try_checkout_copy(book_id).await.unwrap());
    assert!(!inventory.try_checkout_copy(book_id).await.unwrap());

    inventory.release_copies(book_id, 5).await.unwrap();
    let availability = inventory.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.available_copies, 1);

    inventory.add_copies(book_id, 2).await.unwrap();
    let availability = inventory.availability(book_id).await.unwrap().unwrap();
    assert_eq!(availability.total_copies, 3);
    assert_eq!(availability.available_copies, 1);

    assert_eq!(inventory.get_book_title(book_id).await.unwrap(), "Dune");
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_member_directory_rejects_unknown_tier() {
    let pool = setup_pool().await;
    let good = MemberId::new();
    let bad = MemberId::new();
    sqlx::query(
        "INSERT INTO members (member_id, subscription_tier, subscription_status) \
         VALUES ($1, 'yearly', 'active'), ($2, 'platinum', 'active')",
    )
    .bind(good.value())
    .bind(bad.value())
    .execute(&pool)
    .await
    .unwrap();
    let directory = PostgresMemberDirectory::new(pool);

    let subscription = directory.find_subscription(good).await.unwrap().unwrap();
    assert_eq!(subscription.tier, SubscriptionTier::Yearly);
    assert!(directory.find_subscription(bad).await.is_err());
    assert!(directory.find_subscription(MemberId::new()).await.unwrap().is_none());
}

// ============================================================================
// 予約・罰金・設定
// ============================================================================

#[tokio::test]
#[serial]
#[ignore]
async fn test_reservation_queue_positions_and_transitions() {
    let pool = setup_pool().await;
    let repository = PostgresReservationRepository::new(pool);
    let book_id = BookId::new();
    let now = truncate_to_micros(Utc::now());

    let first = place_reservation(book_id, MemberId::new(), now);
    let second = place_reservation(book_id, MemberId::new(), now);
    assert_eq!(repository.append_to_queue(first.clone()).await.unwrap(), 1);
    assert_eq!(repository.append_to_queue(second.clone()).await.unwrap(), 2);

    let cancelled = bookflix_circulation::domain::cancel(&first, now).unwrap();
    assert!(repository
        .transition(ReservationStatus::Pending, &cancelled)
        .await
        .unwrap());
    // 既に遷移済みなので2回目は適用されない
    assert!(!repository
        .transition(ReservationStatus::Pending, &cancelled)
        .await
        .unwrap());

    let live = repository.find_live_for_book(book_id).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].reservation_id, second.reservation_id);
    assert_eq!(live[0].queue_position, 2);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_reservation_repository_rejects_second_live_reservation() {
    let pool = setup_pool().await;
    let repository = PostgresReservationRepository::new(pool);
    let book_id = BookId::new();
    let member_id = MemberId::new();
    let now = truncate_to_micros(Utc::now());

    repository
        .append_to_queue(place_reservation(book_id, member_id, now))
        .await
        .unwrap();
    let err = repository
        .append_to_queue(place_reservation(book_id, member_id, now))
        .await
        .unwrap_err();

    let duplicate = err.downcast_ref::<DuplicateReservation>().unwrap();
    assert_eq!(duplicate.member_id, member_id);
    assert_eq!(repository.find_live_for_book(book_id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_fine_repository_one_fine_per_loan() {
    let pool = setup_pool().await;
    let repository = PostgresFineRepository::new(pool);
    let member_id = MemberId::new();
    let loan_id = LoanId::new();
    let now = truncate_to_micros(Utc::now());

    let fine = Fine {
        fine_id: bookflix_circulation::domain::FineId::new(),
        loan_id,
        member_id,
        amount: Decimal::new(125, 2),
        days_late: 5,
        status: FineStatus::Pending,
        assessed_at: now,
        settled_at: None,
        waived_by: None,
    };

    assert!(repository.insert(&fine).await.unwrap());
    let duplicate = Fine {
        fine_id: bookflix_circulation::domain::FineId::new(),
        ..fine.clone()
    };
    assert!(!repository.insert(&duplicate).await.unwrap());

    assert_eq!(
        repository.outstanding_total(member_id).await.unwrap(),
        Decimal::new(125, 2)
    );

    let paid = bookflix_circulation::domain::pay_fine(&fine, now).unwrap();
    assert!(repository.transition(FineStatus::Pending, &paid).await.unwrap());
    assert_eq!(repository.get_by_id(fine.fine_id).await.unwrap(), Some(paid));
    assert_eq!(
        repository.outstanding_total(member_id).await.unwrap(),
        Decimal::ZERO
    );
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_settings_store_round_trip() {
    let pool = setup_pool().await;
    let store = PostgresSettingsStore::new(pool);

    assert_eq!(store.load_policy().await.unwrap(), None);

    let policy = LibraryPolicy {
        grace_period_days: 2,
        fine_block_threshold: Decimal::new(500, 2),
        ..LibraryPolicy::default()
    };
    store.save_policy(&policy).await.unwrap();
    assert_eq!(store.load_policy().await.unwrap(), Some(policy));
}
