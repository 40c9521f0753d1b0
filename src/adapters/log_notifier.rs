use crate::domain::value_objects::MemberId;
use crate::ports::notification_service::{NotificationService, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

/// 通知をログに出力するNotificationService
///
/// 配信チャネル（メール、プッシュ）が接続されるまでの既定の実装。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send_reservation_ready(
        &self,
        member_id: MemberId,
        book_title: &str,
        pickup_by: DateTime<Utc>,
    ) -> Result<()> {
        info!(target: "notifications", %member_id, book_title, %pickup_by, "Reservation ready for pickup");
        Ok(())
    }

    async fn send_overdue_notification(
        &self,
        member_id: MemberId,
        book_title: &str,
        due_date: DateTime<Utc>,
    ) -> Result<()> {
        info!(target: "notifications", %member_id, book_title, %due_date, "Loan overdue");
        Ok(())
    }

    async fn send_renewal_confirmation(
        &self,
        member_id: MemberId,
        book_title: &str,
        new_due_date: DateTime<Utc>,
    ) -> Result<()> {
        info!(target: "notifications", %member_id, book_title, %new_due_date, "Loan renewed");
        Ok(())
    }

    async fn send_fine_notice(
        &self,
        member_id: MemberId,
        book_title: &str,
        amount: Decimal,
    ) -> Result<()> {
        info!(target: "notifications", %member_id, book_title, %amount, "Fine assessed");
        Ok(())
    }
}
