use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, MemberId, ReservationError, ReservationId};

/// 受取期限（予約がreadyになってからの日数）
pub const PICKUP_WINDOW_DAYS: i64 = 3;

/// 予約の状態
///
/// pending と ready のみが有効（live）な状態。それ以外は終了状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Ready,
    Completed,
    Expired,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Ready => "ready",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Expired => "expired",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Ready)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "ready" => Ok(ReservationStatus::Ready),
            "completed" => Ok(ReservationStatus::Completed),
            "expired" => Ok(ReservationStatus::Expired),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

/// 予約 - 貸出中の書籍に対する取り置き待ち
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub status: ReservationStatus,
    /// 同じ書籍の予約内でのFIFO順位（ストアが待ち行列への追加時に採番する）
    pub queue_position: u32,
    pub reserved_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// completed / expired / cancelled になった時刻
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// 純粋関数：予約を作成する
///
/// 受付可否の判定（`authorize_reservation`）は済んでいる前提。
pub fn place_reservation(
    book_id: BookId,
    member_id: MemberId,
    reserved_at: DateTime<Utc>,
) -> Reservation {
    Reservation {
        reservation_id: ReservationId::new(),
        book_id,
        member_id,
        status: ReservationStatus::Pending,
        queue_position: 0,
        reserved_at,
        ready_at: None,
        expires_at: None,
        closed_at: None,
        updated_at: reserved_at,
    }
}

/// 純粋関数：pending → ready
///
/// 受取期限は現在時刻 + 3日。
pub fn mark_ready(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationError> {
    if reservation.status != ReservationStatus::Pending {
        return Err(ReservationError::NotPending(reservation.status));
    }

    Ok(Reservation {
        status: ReservationStatus::Ready,
        ready_at: Some(now),
        expires_at: Some(now + Duration::days(PICKUP_WINDOW_DAYS)),
        updated_at: now,
        ..reservation.clone()
    })
}

/// 純粋関数：ready → completed（会員が受け取った）
pub fn complete(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationError> {
    if reservation.status != ReservationStatus::Ready {
        return Err(ReservationError::NotReady(reservation.status));
    }
    if is_pickup_expired(reservation, now) {
        return Err(ReservationError::PickupWindowElapsed);
    }

    Ok(close(reservation, ReservationStatus::Completed, now))
}

/// 純粋関数：pending|ready → cancelled
pub fn cancel(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationError> {
    if !reservation.status.is_live() {
        return Err(ReservationError::AlreadyClosed(reservation.status));
    }

    Ok(close(reservation, ReservationStatus::Cancelled, now))
}

/// 純粋関数：ready → expired（受取期限切れ）
pub fn expire(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationError> {
    if reservation.status != ReservationStatus::Ready {
        return Err(ReservationError::NotReady(reservation.status));
    }
    if !is_pickup_expired(reservation, now) {
        return Err(ReservationError::PickupWindowOpen);
    }

    Ok(close(reservation, ReservationStatus::Expired, now))
}

fn close(reservation: &Reservation, status: ReservationStatus, now: DateTime<Utc>) -> Reservation {
    Reservation {
        status,
        closed_at: Some(now),
        updated_at: now,
        ..reservation.clone()
    }
}

/// 受取期限を過ぎたreadyの予約か
pub fn is_pickup_expired(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    reservation.status == ReservationStatus::Ready
        && reservation.expires_at.is_some_and(|expires_at| now > expires_at)
}

/// 待ち行列の先頭（queue_positionが最小のpending）
pub fn queue_head(reservations: &[Reservation]) -> Option<&Reservation> {
    reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Pending)
        .min_by_key(|r| (r.queue_position, r.reserved_at))
}

/// pendingの予約の待ち順（1始まり）
pub fn queue_rank(reservations: &[Reservation], reservation: &Reservation) -> Option<u32> {
    if reservation.status != ReservationStatus::Pending {
        return None;
    }
    let ahead = reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Pending)
        .filter(|r| {
            (r.queue_position, r.reserved_at) < (reservation.queue_position, reservation.reserved_at)
        })
        .count();
    u32::try_from(ahead + 1).ok()
}

/// 精算で発生する遷移の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// ready → expired（取り置きの本が空く）
    Expired,
    /// pending → ready（空いた本を取り置く）
    Promoted,
}

/// 精算で適用する1件の遷移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTransition {
    pub kind: TransitionKind,
    /// 遷移前の状態（条件付き更新のガードに使う）
    pub from: ReservationStatus,
    pub reservation: Reservation,
}

/// 精算計画
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSettlement {
    /// 適用順に並んだ遷移
    pub transitions: Vec<QueueTransition>,
    /// 予約に割り当てられず棚に戻す冊数
    pub released_copies: u32,
}

/// 純粋関数：1冊の書籍の予約待ち行列を精算する
///
/// 1. 受取期限を過ぎたreadyを期限切れにし、その本を空きに加える
/// 2. 空いた本をFIFOでpendingの先頭から順にreadyにする
/// 3. 残った空きは棚に戻す
///
/// 空きがなく期限切れもなければ遷移は発生しない（冪等）。
pub fn settle_queue(
    reservations: &[Reservation],
    freed_copies: u32,
    now: DateTime<Utc>,
) -> QueueSettlement {
    let mut transitions = Vec::new();
    let mut free = freed_copies;

    for reservation in reservations.iter().filter(|r| is_pickup_expired(r, now)) {
        if let Ok(expired) = expire(reservation, now) {
            transitions.push(QueueTransition {
                kind: TransitionKind::Expired,
                from: ReservationStatus::Ready,
                reservation: expired,
            });
            free += 1;
        }
    }

    let mut pending: Vec<&Reservation> = reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Pending)
        .collect();
    pending.sort_by_key(|r| (r.queue_position, r.reserved_at));

    for reservation in pending {
        if free == 0 {
            break;
        }
        if let Ok(ready) = mark_ready(reservation, now) {
            transitions.push(QueueTransition {
                kind: TransitionKind::Promoted,
                from: ReservationStatus::Pending,
                reservation: ready,
            });
            free -= 1;
        }
    }

    QueueSettlement {
        transitions,
        released_copies: free,
    }
}
