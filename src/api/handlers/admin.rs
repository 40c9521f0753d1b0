use crate::application::{loan, settings, sweep};
use crate::domain::LibraryPolicy;
use axum::{Json, extract::State};
use chrono::Utc;
use std::sync::Arc;

use super::AppState;
use crate::api::{
    error::ApiError,
    types::{RebuildResponse, SweepResponse},
};

/// GET /api/admin/config - 現在の貸出ポリシー
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibraryPolicy>, ApiError> {
    let policy = settings::current_policy(&state.service_deps).await?;
    Ok(Json(policy))
}

/// PUT /api/admin/config - 貸出ポリシーを検証して保存
///
/// 省略したキーは既定値になる。
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<LibraryPolicy>,
) -> Result<Json<LibraryPolicy>, ApiError> {
    let policy = settings::update_policy(&state.service_deps, policy).await?;
    Ok(Json(policy))
}

/// POST /api/admin/sweep - 延滞検出と取り置き期限切れの精算
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, ApiError> {
    let report = sweep::run_sweep(&state.service_deps, Utc::now()).await?;
    Ok(Json(report.into()))
}

/// POST /api/admin/rebuild-views - イベントログから貸出Read Modelを再構築
pub async fn rebuild_views(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let rebuilt_loans = loan::rebuild_loan_views(&state.service_deps).await?;
    Ok(Json(RebuildResponse { rebuilt_loans }))
}
