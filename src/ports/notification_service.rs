use crate::domain::value_objects::MemberId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 通知サービスポート
///
/// 会員への通知配信メカニズムを抽象化する。
/// 配信失敗は呼び出し側でログに記録し、業務処理は失敗させない。
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 予約の本が取り置かれたことを通知する
    async fn send_reservation_ready(
        &self,
        member_id: MemberId,
        book_title: &str,
        pickup_by: DateTime<Utc>,
    ) -> Result<()>;

    /// 延滞を通知する
    async fn send_overdue_notification(
        &self,
        member_id: MemberId,
        book_title: &str,
        due_date: DateTime<Utc>,
    ) -> Result<()>;

    /// 延長の確認を通知する
    async fn send_renewal_confirmation(
        &self,
        member_id: MemberId,
        book_title: &str,
        new_due_date: DateTime<Utc>,
    ) -> Result<()>;

    /// 罰金の発生を通知する
    async fn send_fine_notice(
        &self,
        member_id: MemberId,
        book_title: &str,
        amount: Decimal,
    ) -> Result<()>;
}
