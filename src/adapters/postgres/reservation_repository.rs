use crate::domain::{
    reservation::{Reservation, ReservationStatus},
    value_objects::{BookId, MemberId, ReservationId},
};
use crate::ports::reservation_repository::{
    DuplicateReservation, ReservationRepository as ReservationRepositoryTrait, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

const RESERVATION_COLUMNS: &str = r#"
    reservation_id,
    book_id,
    member_id,
    status,
    queue_position,
    reserved_at,
    ready_at,
    expires_at,
    closed_at,
    updated_at
"#;

fn map_row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let status = ReservationStatus::from_str(row.get("status")).map_err(invalid_data)?;
    let position: i32 = row.get("queue_position");
    let queue_position = u32::try_from(position)
        .map_err(|_| invalid_data(format!("queue_position out of range: {}", position)))?;

    Ok(Reservation {
        reservation_id: ReservationId::from_uuid(row.get("reservation_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        member_id: MemberId::from_uuid(row.get("member_id")),
        status,
        queue_position,
        reserved_at: row.get("reserved_at"),
        ready_at: row.get("ready_at"),
        expires_at: row.get("expires_at"),
        closed_at: row.get("closed_at"),
        updated_at: row.get("updated_at"),
    })
}

/// 会員ごとの有効な予約の一意制約に違反したか
fn is_live_reservation_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.constraint() == Some("uq_reservations_live_per_member")
    )
}

/// ReservationRepositoryのPostgreSQL実装
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str, bind: uuid::Uuid) -> Result<Vec<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE {condition}");
        let rows = sqlx::query(&sql).bind(bind).fetch_all(&self.pool).await?;
        rows.iter().map(map_row_to_reservation).collect()
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    /// 待ち行列の末尾に追加する
    ///
    /// 書籍単位のアドバイザリロックで採番を直列化する。
    /// ロックはトランザクション終了時に解放される。
    async fn append_to_queue(&self, reservation: Reservation) -> Result<u32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(reservation.book_id.value())
            .execute(&mut *tx)
            .await?;

        let position: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(queue_position), 0) + 1
            FROM reservations
            WHERE book_id = $1
            "#,
        )
        .bind(reservation.book_id.value())
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO reservations (
                reservation_id,
                book_id,
                member_id,
                status,
                queue_position,
                reserved_at,
                ready_at,
                expires_at,
                closed_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(reservation.reservation_id.value())
        .bind(reservation.book_id.value())
        .bind(reservation.member_id.value())
        .bind(reservation.status.as_str())
        .bind(position)
        .bind(reservation.reserved_at)
        .bind(reservation.ready_at)
        .bind(reservation.expires_at)
        .bind(reservation.closed_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_live_reservation_violation(&e) => {
                return Err(Box::new(DuplicateReservation {
                    book_id: reservation.book_id,
                    member_id: reservation.member_id,
                }));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        u32::try_from(position)
            .map_err(|_| invalid_data(format!("queue_position out of range: {}", position)))
    }

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let mut found = self
            .fetch_where("reservation_id = $1", reservation_id.value())
            .await?;
        Ok(found.pop())
    }

    async fn find_live_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>> {
        self.fetch_where(
            "book_id = $1 AND status IN ('pending', 'ready') ORDER BY queue_position ASC",
            book_id.value(),
        )
        .await
    }

    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        self.fetch_where(
            "member_id = $1 ORDER BY reserved_at DESC",
            member_id.value(),
        )
        .await
    }

    async fn find_expired_ready(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'ready' AND expires_at < $1 \
             ORDER BY expires_at ASC"
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        rows.iter().map(map_row_to_reservation).collect()
    }

    /// 現在の状態が`from`の行だけを更新する（compare-and-set）
    async fn transition(&self, from: ReservationStatus, updated: &Reservation) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $3,
                ready_at = $4,
                expires_at = $5,
                closed_at = $6,
                updated_at = $7
            WHERE reservation_id = $1 AND status = $2
            "#,
        )
        .bind(updated.reservation_id.value())
        .bind(from.as_str())
        .bind(updated.status.as_str())
        .bind(updated.ready_at)
        .bind(updated.expires_at)
        .bind(updated.closed_at)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
