use crate::domain::{
    reservation::{Reservation, ReservationStatus},
    value_objects::{BookId, MemberId, ReservationId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 会員が同じ書籍の有効な予約（pending / ready）を既に持っている
///
/// 同じ会員の予約が並行して追加された場合、ストアが片方を拒否する。
#[derive(Debug, thiserror::Error)]
#[error("Member {member_id} already has a live reservation for book {book_id}")]
pub struct DuplicateReservation {
    pub book_id: BookId,
    pub member_id: MemberId,
}

/// 予約リポジトリポート
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// 予約を書籍の待ち行列の末尾に追加する
    ///
    /// queue_positionはストアが採番する（同じ書籍の既存の最大値 + 1）。
    /// 採番は書籍ごとに直列化される。採番された順位を返す。
    /// 会員が同じ書籍の有効な予約を既に持っている場合は`DuplicateReservation`。
    async fn append_to_queue(&self, reservation: Reservation) -> Result<u32>;

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// 書籍の有効な予約（pending, ready）を待ち順に取得する
    async fn find_live_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>>;

    /// 会員の全予約を新しい順に取得する
    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Reservation>>;

    /// 受取期限を過ぎたreadyの予約を取得する（スイープ用）
    async fn find_expired_ready(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>>;

    /// 条件付き状態更新
    ///
    /// 現在の状態が`from`の場合のみ`updated`で置き換えて`true`を返す。
    /// 別のリクエストが先に遷移させていた場合は何もせず`false`を返す。
    async fn transition(&self, from: ReservationStatus, updated: &Reservation) -> Result<bool>;
}
