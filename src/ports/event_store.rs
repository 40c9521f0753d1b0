use crate::domain::{events::DomainEvent, value_objects::LoanId};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 楽観的排他制御の競合
///
/// `append`時に集約のバージョンが想定と異なっていた。
/// 別のリクエストが先に同じ集約を更新したことを示す。
#[derive(Debug, thiserror::Error)]
#[error("Version conflict on loan {aggregate_id}: expected {expected}, found {actual}")]
pub struct VersionConflict {
    pub aggregate_id: LoanId,
    pub expected: usize,
    pub actual: usize,
}

/// イベントストアポート
///
/// 貸出集約のドメインイベントの永続化と取得を抽象化する。
/// イベントは追記専用ログに保存される不変の事実。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 集約のイベントを追加する
    ///
    /// `expected_version`は呼び出し側が読み込んだイベント数。
    /// ストア上のイベント数と一致しない場合は`VersionConflict`を返し、何も書き込まない。
    /// 同じ集約への同時更新（二重返却など）はどちらか一方だけが成功する。
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: usize,
        events: Vec<DomainEvent>,
    ) -> Result<()>;

    /// 集約のすべてのイベントを追加順に読み込む
    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>>;

    /// すべての集約のイベントを挿入順にストリーム配信する
    ///
    /// Read Modelの再構築に使用される。
    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>>;
}
