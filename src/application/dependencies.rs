use crate::ports::*;
use std::sync::Arc;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、ユースケース関数に明示的に渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub event_store: Arc<dyn EventStore>,
    pub loan_read_model: Arc<dyn LoanReadModel>,
    pub member_service: Arc<dyn MemberService>,
    pub book_service: Arc<dyn BookService>,
    pub reservation_repository: Arc<dyn ReservationRepository>,
    pub fine_repository: Arc<dyn FineRepository>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub notification_service: Arc<dyn NotificationService>,
}
