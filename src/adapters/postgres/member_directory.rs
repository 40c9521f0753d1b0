use crate::domain::{
    subscription::{Subscription, SubscriptionStatus, SubscriptionTier},
    value_objects::MemberId,
};
use crate::ports::member_service::{MemberService, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use super::invalid_data;

/// MemberServiceのPostgreSQL実装
///
/// 未知のtier/status文字列はエラーにする（無料会員に黙って落とさない）。
pub struct MemberDirectory {
    pool: PgPool,
}

impl MemberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberService for MemberDirectory {
    async fn find_subscription(&self, member_id: MemberId) -> Result<Option<Subscription>> {
        let row = sqlx::query(
            r#"
            SELECT subscription_tier, subscription_status
            FROM members
            WHERE member_id = $1
            "#,
        )
        .bind(member_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tier = SubscriptionTier::from_str(row.get("subscription_tier")).map_err(invalid_data)?;
        let status =
            SubscriptionStatus::from_str(row.get("subscription_status")).map_err(invalid_data)?;

        Ok(Some(Subscription::new(tier, status)))
    }
}
