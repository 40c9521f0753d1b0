use crate::application::fine;
use crate::domain::{
    commands::{PayFine, WaiveFine},
    value_objects::{FineId, StaffId},
};
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::api::{
    error::ApiError,
    types::{FineResponse, WaiveFineRequest},
};

/// POST /api/fines/:id/pay - 罰金を支払う
pub async fn pay_fine(
    State(state): State<Arc<AppState>>,
    Path(fine_id): Path<Uuid>,
) -> Result<Json<FineResponse>, ApiError> {
    let cmd = PayFine {
        fine_id: FineId::from_uuid(fine_id),
        paid_at: Utc::now(),
    };

    let fine = fine::pay_fine(&state.service_deps, cmd).await?;
    Ok(Json(fine.into()))
}

/// POST /api/fines/:id/waive - 罰金を免除する（職員）
pub async fn waive_fine(
    State(state): State<Arc<AppState>>,
    Path(fine_id): Path<Uuid>,
    Json(req): Json<WaiveFineRequest>,
) -> Result<Json<FineResponse>, ApiError> {
    let cmd = WaiveFine {
        fine_id: FineId::from_uuid(fine_id),
        staff_id: StaffId::from_uuid(req.staff_id),
        waived_at: Utc::now(),
    };

    let fine = fine::waive_fine(&state.service_deps, cmd).await?;
    Ok(Json(fine.into()))
}
