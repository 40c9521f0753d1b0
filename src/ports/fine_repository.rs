use crate::domain::{
    fine::{Fine, FineStatus},
    value_objects::{FineId, LoanId, MemberId},
};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 罰金リポジトリポート
#[async_trait]
pub trait FineRepository: Send + Sync {
    /// 罰金を登録する
    ///
    /// 1件の貸出につき罰金は1件まで。既に存在する場合は`false`を返す。
    async fn insert(&self, fine: &Fine) -> Result<bool>;

    async fn get_by_id(&self, fine_id: FineId) -> Result<Option<Fine>>;

    async fn find_by_loan(&self, loan_id: LoanId) -> Result<Option<Fine>>;

    /// 会員の全罰金を新しい順に取得する
    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Fine>>;

    /// 会員の未払い（pending）罰金の合計
    async fn outstanding_total(&self, member_id: MemberId) -> Result<Decimal>;

    /// 条件付き状態更新。現在の状態が`from`の場合のみ更新して`true`を返す
    async fn transition(&self, from: FineStatus, updated: &Fine) -> Result<bool>;
}
