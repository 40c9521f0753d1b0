use crate::domain::{
    BorrowerStanding, BorrowingEnvelope, MemberId, Subscription, resolve_envelope,
};
use chrono::{DateTime, Utc};

use super::{LibraryApplicationError, Result, ServiceDependencies, settings::current_policy};

/// 会員のサブスクリプションを取得する
pub(crate) async fn find_subscription(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Subscription> {
    deps.member_service
        .find_subscription(member_id)
        .await
        .map_err(LibraryApplicationError::MemberServiceError)?
        .ok_or(LibraryApplicationError::MemberNotFound)
}

/// 会員に適用される貸出条件（エンベロープ）を解決する
///
/// 現在のサブスクリプションと現在の管理設定から毎回計算する。
pub async fn member_envelope(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<BorrowingEnvelope> {
    let subscription = find_subscription(deps, member_id).await?;
    let policy = current_policy(deps).await?;

    Ok(resolve_envelope(&subscription, &policy))
}

/// 貸出判定用に会員の現状を集計する
///
/// 延滞はスイープ前でも期限超過で判定する。
pub(crate) async fn borrower_standing(
    deps: &ServiceDependencies,
    member_id: MemberId,
    now: DateTime<Utc>,
) -> Result<BorrowerStanding> {
    let open_loans = deps
        .loan_read_model
        .get_open_loans_for_member(member_id)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;

    let outstanding_fines = deps
        .fine_repository
        .outstanding_total(member_id)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;

    Ok(BorrowerStanding {
        active_loan_count: u32::try_from(open_loans.len()).unwrap_or(u32::MAX),
        outstanding_fines,
        has_overdue_loan: open_loans.iter().any(|loan| loan.is_past_due(now)),
    })
}
