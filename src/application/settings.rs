use crate::domain::LibraryPolicy;
use tracing::info;

use super::{LibraryApplicationError, Result, ServiceDependencies};

/// 現在の貸出ポリシー
///
/// 毎回ストアから読み込む。未保存の場合は既定値を使う。
pub async fn current_policy(deps: &ServiceDependencies) -> Result<LibraryPolicy> {
    let policy = deps
        .settings_store
        .load_policy()
        .await
        .map_err(LibraryApplicationError::SettingsStoreError)?;

    Ok(policy.unwrap_or_default())
}

/// 貸出ポリシーを検証して保存する
///
/// 保存後の操作から新しいポリシーが適用される。既存の貸出の期限は変わらない。
pub async fn update_policy(
    deps: &ServiceDependencies,
    policy: LibraryPolicy,
) -> Result<LibraryPolicy> {
    policy.validate()?;

    deps.settings_store
        .save_policy(&policy)
        .await
        .map_err(LibraryApplicationError::SettingsStoreError)?;

    info!(
        standard_loan_days = policy.standard_loan_days,
        premium_loan_days = policy.premium_loan_days,
        daily_fine = %policy.daily_fine,
        max_fine_cap = %policy.max_fine_cap,
        auto_charge_fines = policy.auto_charge_fines,
        "Library policy updated"
    );

    Ok(policy)
}
