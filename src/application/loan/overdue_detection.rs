use crate::domain::{self, DomainEvent, Loan, LoanId};
use crate::ports::LoanView;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::loan_service::{append_events, load_loan, save_view};
use crate::application::{LibraryApplicationError, Result, ServiceDependencies, notifications};

/// 1件の貸出を延滞に遷移させる
///
/// Active状態で期限を過ぎている場合のみLoanBecameOverdueを発行する。
/// 既にOverdueやReturnedの場合、別のリクエストと競合した場合は`None`。
pub(crate) async fn mark_loan_overdue(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<Option<LoanView>> {
    let (loan, version) = load_loan(deps, loan_id).await?;

    let Loan::Active(active) = loan else {
        return Ok(None);
    };
    let Some((overdue, event)) = domain::mark_overdue(active, now) else {
        return Ok(None);
    };

    match append_events(
        deps,
        loan_id,
        version,
        vec![DomainEvent::LoanBecameOverdue(event)],
    )
    .await
    {
        Ok(()) => {}
        Err(LibraryApplicationError::ConcurrentModification) => {
            debug!(loan_id = %loan_id, "Loan changed concurrently, skipping overdue transition");
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    info!(loan_id = %loan_id, due_date = %overdue.due_date, "Loan became overdue");

    let view = save_view(deps, &Loan::Overdue(overdue.clone())).await?;
    notifications::loan_overdue(deps, &overdue).await;

    Ok(Some(view))
}

/// 延滞検出バッチ
///
/// 定期的に実行され、期限を過ぎたActive状態の貸出を延滞にする。
///
/// 処理フロー：
/// 1. Read Modelから延滞候補を取得
/// 2. 各候補についてイベントから現在の状態を復元し、Activeかつ期限超過の場合のみ遷移
/// 3. 遷移させた件数を返す
///
/// 1件の失敗はログに残して次の候補へ進む。
pub async fn detect_overdue_loans(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<usize> {
    let candidates = deps
        .loan_read_model
        .find_overdue_candidates(now)
        .await
        .map_err(LibraryApplicationError::ReadModelError)?;

    let mut detected_count = 0;
    for loan_view in candidates {
        match mark_loan_overdue(deps, loan_view.loan_id, now).await {
            Ok(Some(_)) => detected_count += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(loan_id = %loan_view.loan_id, error = %e, "Failed to mark loan overdue");
            }
        }
    }

    Ok(detected_count)
}
