use crate::domain::{
    reservation::{Reservation, ReservationStatus},
    value_objects::{BookId, MemberId, ReservationId},
};
use crate::ports::reservation_repository::{
    DuplicateReservation, ReservationRepository as ReservationRepositoryTrait, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

/// ReservationRepositoryのインメモリ実装
///
/// 採番と条件付き更新は1回のロック内で行う。
#[derive(Default)]
pub struct ReservationRepository {
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl ReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, predicate: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        lock(&self.reservations)
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    async fn append_to_queue(&self, reservation: Reservation) -> Result<u32> {
        let mut reservations = lock(&self.reservations);
        let duplicate = reservations.values().any(|r| {
            r.book_id == reservation.book_id
                && r.member_id == reservation.member_id
                && r.status.is_live()
        });
        if duplicate {
            return Err(Box::new(DuplicateReservation {
                book_id: reservation.book_id,
                member_id: reservation.member_id,
            }));
        }

        let position = reservations
            .values()
            .filter(|r| r.book_id == reservation.book_id)
            .map(|r| r.queue_position)
            .max()
            .unwrap_or(0)
            + 1;

        reservations.insert(
            reservation.reservation_id,
            Reservation {
                queue_position: position,
                ..reservation
            },
        );
        Ok(position)
    }

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        Ok(lock(&self.reservations).get(&reservation_id).cloned())
    }

    async fn find_live_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>> {
        let mut live = self.select(|r| r.book_id == book_id && r.status.is_live());
        live.sort_by_key(|r| r.queue_position);
        Ok(live)
    }

    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        let mut reservations = self.select(|r| r.member_id == member_id);
        reservations.sort_by_key(|r| Reverse(r.reserved_at));
        Ok(reservations)
    }

    async fn find_expired_ready(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        Ok(self.select(|r| {
            r.status == ReservationStatus::Ready && r.expires_at.is_some_and(|at| at < now)
        }))
    }

    async fn transition(&self, from: ReservationStatus, updated: &Reservation) -> Result<bool> {
        let mut reservations = lock(&self.reservations);
        match reservations.get_mut(&updated.reservation_id) {
            Some(current) if current.status == from => {
                *current = updated.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
