use serde::{Deserialize, Serialize};

/// サブスクリプションのプラン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Monthly,
    Yearly,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Monthly => "monthly",
            SubscriptionTier::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "monthly" => Ok(SubscriptionTier::Monthly),
            "yearly" => Ok(SubscriptionTier::Yearly),
            _ => Err(format!("Invalid subscription tier: {}", s)),
        }
    }
}

/// サブスクリプションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

/// 貸出条件を決める実効ティア
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Standard,
    Premium,
}

/// 会員のサブスクリプション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
}

impl Subscription {
    pub fn new(tier: SubscriptionTier, status: SubscriptionStatus) -> Self {
        Self { tier, status }
    }

    pub fn free() -> Self {
        Self::new(SubscriptionTier::Free, SubscriptionStatus::Active)
    }

    /// 実効ティアを判定する
    ///
    /// 有効な月額・年額プランのみがプレミアム。
    /// 解約済み・期限切れのプレミアムは標準扱いに戻る。
    pub fn effective_tier(&self) -> MembershipTier {
        match self.tier {
            SubscriptionTier::Free => MembershipTier::Standard,
            SubscriptionTier::Monthly | SubscriptionTier::Yearly => match self.status {
                SubscriptionStatus::Active => MembershipTier::Premium,
                SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => {
                    MembershipTier::Standard
                }
            },
        }
    }
}
