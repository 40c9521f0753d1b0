use crate::application::reservation;
use crate::domain::{
    commands::{ActOnReservation, PlaceReservation},
    value_objects::{BookId, MemberId, ReservationId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::api::{
    error::ApiError,
    types::{
        AddCopiesRequest, CopiesAddedResponse, ListReservationsQuery,
        ReservationActionRequest, ReservationActionResponse, ReservationRequest,
        ReservationResponse,
    },
};

/// POST /api/reservations - 貸出中の書籍を予約
pub async fn place_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let cmd = PlaceReservation {
        book_id: BookId::from_uuid(req.book_id),
        member_id: MemberId::from_uuid(req.member_id),
        reserved_at: Utc::now(),
    };

    let detail = reservation::place_reservation(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

/// GET /api/reservations?memberId= - 会員の予約一覧
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let member_id = query
        .member_id
        .ok_or_else(|| ApiError::BadRequest("memberId query parameter is required".to_string()))?;

    let reservations = reservation::list_reservations(
        &state.service_deps,
        MemberId::from_uuid(member_id),
        Utc::now(),
    )
    .await?;

    Ok(Json(
        reservations
            .into_iter()
            .map(ReservationResponse::from)
            .collect(),
    ))
}

/// GET /api/reservations/:id - 予約詳細（待ち順付き）
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let detail = reservation::get_reservation(
        &state.service_deps,
        ReservationId::from_uuid(reservation_id),
        Utc::now(),
    )
    .await?;
    Ok(Json(detail.into()))
}

/// PATCH /api/reservations/:id - 予約を操作（markReady / complete / cancel）
pub async fn act_on_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<ReservationActionRequest>,
) -> Result<Json<ReservationActionResponse>, ApiError> {
    let cmd = ActOnReservation {
        reservation_id: ReservationId::from_uuid(reservation_id),
        action: req.action,
        acted_at: Utc::now(),
    };

    let outcome = reservation::act_on_reservation(&state.service_deps, cmd).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/books/:id/copies - 蔵書を追加（予約待ちに優先して割り当てる）
pub async fn add_copies(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<AddCopiesRequest>,
) -> Result<Json<CopiesAddedResponse>, ApiError> {
    if req.count == 0 {
        return Err(ApiError::BadRequest("count must be at least 1".to_string()));
    }

    let added = reservation::add_copies(
        &state.service_deps,
        BookId::from_uuid(book_id),
        req.count,
        Utc::now(),
    )
    .await?;
    Ok(Json(added.into()))
}
