use crate::domain::policy::LibraryPolicy;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 管理設定ストアポート
///
/// 管理画面で編集される貸出ポリシーを永続化する。
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// 保存済みのポリシーを読み込む。未保存なら`None`
    async fn load_policy(&self) -> Result<Option<LibraryPolicy>>;

    /// ポリシーを保存する（検証は呼び出し側で済ませる）
    async fn save_policy(&self, policy: &LibraryPolicy) -> Result<()>;
}
