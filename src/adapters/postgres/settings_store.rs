use crate::domain::policy::LibraryPolicy;
use crate::ports::settings_store::{Result, SettingsStore as SettingsStoreTrait};
use async_trait::async_trait;
use sqlx::PgPool;

/// SettingsStoreのPostgreSQL実装
///
/// library_settingsテーブルの1行にポリシーをJSONBで保存する。
pub struct SettingsStore {
    pool: PgPool,
}

impl SettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStoreTrait for SettingsStore {
    async fn load_policy(&self) -> Result<Option<LibraryPolicy>> {
        let policy: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT policy FROM library_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(policy.map(serde_json::from_value).transpose()?)
    }

    async fn save_policy(&self, policy: &LibraryPolicy) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_settings (id, policy, updated_at)
            VALUES (1, $1, NOW())
            ON CONFLICT (id)
            DO UPDATE SET policy = EXCLUDED.policy, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(serde_json::to_value(policy)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
