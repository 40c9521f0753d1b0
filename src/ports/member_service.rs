use crate::domain::{subscription::Subscription, value_objects::MemberId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 会員サービスポート
///
/// 貸出コンテキストが会員について知るのはサブスクリプションだけ。
#[async_trait]
pub trait MemberService: Send + Sync {
    /// 会員のサブスクリプションを取得する
    ///
    /// 会員が存在しない場合は`None`。
    async fn find_subscription(&self, member_id: MemberId) -> Result<Option<Subscription>>;
}
