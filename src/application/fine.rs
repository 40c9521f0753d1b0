use crate::domain::{self, Fine, FineId, FineStatus, MemberId, commands::*};
use rust_decimal::Decimal;
use tracing::info;

use super::{LibraryApplicationError, Result, ServiceDependencies, member::find_subscription};

/// 会員の罰金一覧
#[derive(Debug, Clone)]
pub struct MemberFines {
    pub fines: Vec<Fine>,
    /// 未払い（pending）罰金の合計
    pub outstanding_total: Decimal,
}

async fn find_fine(deps: &ServiceDependencies, fine_id: FineId) -> Result<Fine> {
    deps.fine_repository
        .get_by_id(fine_id)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?
        .ok_or(LibraryApplicationError::FineNotFound)
}

/// 状態がpendingのままである場合のみ更新する
async fn settle(deps: &ServiceDependencies, updated: &Fine) -> Result<()> {
    let applied = deps
        .fine_repository
        .transition(FineStatus::Pending, updated)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;

    if !applied {
        return Err(LibraryApplicationError::ConcurrentModification);
    }
    Ok(())
}

/// 罰金を支払う（pending → paid）
pub async fn pay_fine(deps: &ServiceDependencies, cmd: PayFine) -> Result<Fine> {
    let fine = find_fine(deps, cmd.fine_id).await?;
    let paid = domain::pay_fine(&fine, cmd.paid_at)?;

    settle(deps, &paid).await?;

    info!(fine_id = %paid.fine_id, amount = %paid.amount, "Fine paid");
    Ok(paid)
}

/// 罰金を免除する（pending → waived、職員の管理操作）
pub async fn waive_fine(deps: &ServiceDependencies, cmd: WaiveFine) -> Result<Fine> {
    let fine = find_fine(deps, cmd.fine_id).await?;
    let waived = domain::waive_fine(&fine, cmd.staff_id, cmd.waived_at)?;

    settle(deps, &waived).await?;

    info!(
        fine_id = %waived.fine_id,
        staff_id = %cmd.staff_id,
        amount = %waived.amount,
        "Fine waived"
    );
    Ok(waived)
}

/// 会員の罰金一覧と未払い合計
pub async fn list_member_fines(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<MemberFines> {
    find_subscription(deps, member_id).await?;

    let fines = deps
        .fine_repository
        .find_by_member(member_id)
        .await
        .map_err(LibraryApplicationError::FineStoreError)?;

    let outstanding_total = domain::outstanding_total(&fines);
    Ok(MemberFines {
        fines,
        outstanding_total,
    })
}
