use crate::application::{fine, member};
use crate::domain::{BorrowingEnvelope, value_objects::MemberId};
use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::api::{error::ApiError, types::MemberFinesResponse};

/// GET /api/members/:id/envelope - 会員に適用される貸出条件
pub async fn get_envelope(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<BorrowingEnvelope>, ApiError> {
    let envelope =
        member::member_envelope(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(envelope))
}

/// GET /api/members/:id/fines - 罰金一覧と未払い合計
pub async fn get_member_fines(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<MemberFinesResponse>, ApiError> {
    let fines =
        fine::list_member_fines(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(MemberFinesResponse::new(member_id, fines)))
}
