use crate::domain::policy::LibraryPolicy;
use crate::ports::settings_store::{Result, SettingsStore as SettingsStoreTrait};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::adapters::lock;

/// SettingsStoreのインメモリ実装
#[derive(Default)]
pub struct SettingsStore {
    policy: Mutex<Option<LibraryPolicy>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStoreTrait for SettingsStore {
    async fn load_policy(&self) -> Result<Option<LibraryPolicy>> {
        Ok(lock(&self.policy).clone())
    }

    async fn save_policy(&self, policy: &LibraryPolicy) -> Result<()> {
        *lock(&self.policy) = Some(policy.clone());
        Ok(())
    }
}
