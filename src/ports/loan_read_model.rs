use crate::domain::{
    loan::LoanStatus,
    value_objects::{BookId, LoanId, MemberId, ReservationId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出ビュー（Read Model）
///
/// クエリに最適化された非正規化ビュー（CQRSパターン）。
/// イベントから復元した集約の完全な状態を反映する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub reservation_id: Option<ReservationId>,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewal_count: u8,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanView {
    /// 返却期限を過ぎているか（スイープ前のactiveも含む）
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LoanStatus::Overdue => true,
            LoanStatus::Active => now > self.due_date,
            LoanStatus::Returned => false,
        }
    }
}

/// 貸出Read Modelポート
#[async_trait]
pub trait LoanReadModel: Send + Sync {
    /// 貸出の現在状態を保存する（upsert）
    ///
    /// 部分更新は行わず、常に集約の完全な状態を書き込む。
    async fn save(&self, loan_view: LoanView) -> Result<()>;

    /// 同時貸出上限の範囲内であれば新しい貸出のビューを登録する
    ///
    /// 会員ごとに直列化し、未返却の貸出が`max_open_loans`未満のときだけ
    /// 保存して`true`を返す。上限に達していれば何もせず`false`。
    async fn claim_loan_slot(&self, loan_view: LoanView, max_open_loans: u32) -> Result<bool>;

    /// 登録済みのビューを削除する（貸出の作成に失敗した場合の取り消し）
    async fn discard(&self, loan_id: LoanId) -> Result<()>;

    /// 会員の未返却の貸出（active と overdue）を取得する
    ///
    /// 同時貸出上限と延滞ブロックの判定に使用される。
    async fn get_open_loans_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>>;

    /// 延滞候補の貸出を検索する
    ///
    /// due_date < cutoff_date かつ status が active の貸出を返す。
    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>>;

    /// IDで貸出を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>>;

    /// 会員の全貸出を新しい順に取得する
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>>;
}
