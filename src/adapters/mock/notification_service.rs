use crate::domain::value_objects::MemberId;
use crate::ports::notification_service::{NotificationService as NotificationServiceTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapters::lock;

/// 送信された通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    ReservationReady {
        member_id: MemberId,
        book_title: String,
        pickup_by: DateTime<Utc>,
    },
    Overdue {
        member_id: MemberId,
        book_title: String,
        due_date: DateTime<Utc>,
    },
    RenewalConfirmation {
        member_id: MemberId,
        book_title: String,
        new_due_date: DateTime<Utc>,
    },
    FineNotice {
        member_id: MemberId,
        book_title: String,
        amount: Decimal,
    },
}

/// Mock implementation of NotificationService
///
/// Does not deliver anything. Records each notification so tests can inspect
/// them, and can be switched to fail every delivery.
#[derive(Default)]
pub struct NotificationService {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail
    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        lock(&self.sent).clone()
    }

    fn record(&self, notification: SentNotification) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("notification delivery failed".into());
        }
        tracing::debug!(?notification, "Notification recorded");
        lock(&self.sent).push(notification);
        Ok(())
    }
}

#[async_trait]
impl NotificationServiceTrait for NotificationService {
    async fn send_reservation_ready(
        &self,
        member_id: MemberId,
        book_title: &str,
        pickup_by: DateTime<Utc>,
    ) -> Result<()> {
        self.record(SentNotification::ReservationReady {
            member_id,
            book_title: book_title.to_string(),
            pickup_by,
        })
    }

    async fn send_overdue_notification(
        &self,
        member_id: MemberId,
        book_title: &str,
        due_date: DateTime<Utc>,
    ) -> Result<()> {
        self.record(SentNotification::Overdue {
            member_id,
            book_title: book_title.to_string(),
            due_date,
        })
    }

    async fn send_renewal_confirmation(
        &self,
        member_id: MemberId,
        book_title: &str,
        new_due_date: DateTime<Utc>,
    ) -> Result<()> {
        self.record(SentNotification::RenewalConfirmation {
            member_id,
            book_title: book_title.to_string(),
            new_due_date,
        })
    }

    async fn send_fine_notice(
        &self,
        member_id: MemberId,
        book_title: &str,
        amount: Decimal,
    ) -> Result<()> {
        self.record(SentNotification::FineNotice {
            member_id,
            book_title: book_title.to_string(),
            amount,
        })
    }
}
