use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{MembershipTier, PolicyValidationError, Subscription};

/// 図書館の貸出ポリシー（管理画面で編集される設定）
///
/// ポリシー関数はこの構造体を呼び出し時に受け取る。
/// 値をコードに埋め込まないこと。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryPolicy {
    /// 標準会員の貸出期間（日）
    pub standard_loan_days: u32,
    /// プレミアム会員の貸出期間（日）
    pub premium_loan_days: u32,
    /// 標準会員の同時貸出上限
    pub standard_max_loans: u32,
    /// プレミアム会員の同時貸出上限
    #[serde(rename = "maxConcurrentLoans")]
    pub premium_max_loans: u32,
    /// 罰金が発生しない猶予日数
    #[serde(rename = "gracePeriod")]
    pub grace_period_days: u32,
    /// 標準会員の1日あたりの罰金
    pub daily_fine: Decimal,
    /// 1件の貸出あたりの罰金上限
    pub max_fine_cap: Decimal,
    /// プレミアム会員の罰金レート倍率（0.5 = 50%割引）
    pub premium_fine_multiplier: Decimal,
    /// 未払い罰金がこの額を超えると貸出不可
    pub fine_block_threshold: Decimal,
    /// 返却時に罰金を自動で計上するか
    pub auto_charge_fines: bool,
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self {
            standard_loan_days: 7,
            premium_loan_days: 20,
            standard_max_loans: 1,
            premium_max_loans: 4,
            grace_period_days: 0,
            daily_fine: Decimal::new(50, 2),
            max_fine_cap: Decimal::new(2000, 2),
            premium_fine_multiplier: Decimal::new(5, 1),
            fine_block_threshold: Decimal::ZERO,
            auto_charge_fines: true,
        }
    }
}

impl LibraryPolicy {
    /// 設定値の妥当性を検証する
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.standard_loan_days == 0 || self.premium_loan_days == 0 {
            return Err(PolicyValidationError::NonPositiveLoanPeriod);
        }
        if self.standard_max_loans == 0 || self.premium_max_loans == 0 {
            return Err(PolicyValidationError::NonPositiveLoanLimit);
        }
        if self.daily_fine.is_sign_negative() {
            return Err(PolicyValidationError::NegativeAmount("dailyFine"));
        }
        if self.max_fine_cap.is_sign_negative() {
            return Err(PolicyValidationError::NegativeAmount("maxFineCap"));
        }
        if self.fine_block_threshold.is_sign_negative() {
            return Err(PolicyValidationError::NegativeAmount("fineBlockThreshold"));
        }
        if self.premium_fine_multiplier.is_sign_negative()
            || self.premium_fine_multiplier > Decimal::ONE
        {
            return Err(PolicyValidationError::MultiplierOutOfRange(
                self.premium_fine_multiplier,
            ));
        }
        Ok(())
    }
}

/// ティアごとに解決された貸出条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingEnvelope {
    pub tier: MembershipTier,
    pub max_concurrent_loans: u32,
    pub loan_period_days: u32,
    pub daily_fine_rate: Decimal,
    pub fine_cap: Decimal,
    pub grace_period_days: u32,
    pub fine_block_threshold: Decimal,
}

impl BorrowingEnvelope {
    pub fn loan_period(&self) -> Duration {
        Duration::days(i64::from(self.loan_period_days))
    }
}

/// 純粋関数：会員のサブスクリプションから貸出条件を解決する
///
/// エラーは発生しない。常に具体的な条件を返す。
pub fn resolve_envelope(subscription: &Subscription, policy: &LibraryPolicy) -> BorrowingEnvelope {
    let tier = subscription.effective_tier();
    let (max_concurrent_loans, loan_period_days, daily_fine_rate) = match tier {
        MembershipTier::Standard => (
            policy.standard_max_loans,
            policy.standard_loan_days,
            policy.daily_fine,
        ),
        MembershipTier::Premium => (
            policy.premium_max_loans,
            policy.premium_loan_days,
            // 端数は罰金額の確定時に丸める
            policy.daily_fine * policy.premium_fine_multiplier,
        ),
    };

    BorrowingEnvelope {
        tier,
        max_concurrent_loans,
        loan_period_days,
        daily_fine_rate,
        fine_cap: policy.max_fine_cap,
        grace_period_days: policy.grace_period_days,
        fine_block_threshold: policy.fine_block_threshold,
    }
}
