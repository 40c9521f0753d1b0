use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// APIルーターを作成する
///
/// - /api/borrowings: 貸出、延長、返却、罰金の手動計上
/// - /api/reservations: 予約の受付、取得、操作
/// - /api/members: 貸出条件、罰金一覧
/// - /api/fines: 支払い、免除
/// - /api/books: 蔵書追加
/// - /api/admin: 貸出ポリシー、スイープ、Read Model再構築
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 貸出
        .route("/api/borrowings", get(handlers::list_loans))
        .route("/api/borrowings/borrow", post(handlers::borrow_book))
        .route("/api/borrowings/:id", get(handlers::get_loan))
        .route("/api/borrowings/:id/renew", post(handlers::renew_loan))
        .route("/api/borrowings/:id/return", post(handlers::return_book))
        .route("/api/borrowings/:id/fine", post(handlers::assess_fine))
        // 予約
        .route(
            "/api/reservations",
            get(handlers::list_reservations).post(handlers::place_reservation),
        )
        .route(
            "/api/reservations/:id",
            get(handlers::get_reservation).patch(handlers::act_on_reservation),
        )
        // 会員・罰金・蔵書
        .route("/api/members/:id/envelope", get(handlers::get_envelope))
        .route("/api/members/:id/fines", get(handlers::get_member_fines))
        .route("/api/fines/:id/pay", post(handlers::pay_fine))
        .route("/api/fines/:id/waive", post(handlers::waive_fine))
        .route("/api/books/:id/copies", post(handlers::add_copies))
        // 管理
        .route(
            "/api/admin/config",
            get(handlers::get_config).put(handlers::update_config),
        )
        .route("/api/admin/sweep", post(handlers::run_sweep))
        .route("/api/admin/rebuild-views", post(handlers::rebuild_views))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
