use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result, VersionConflict};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

#[derive(Default)]
struct Log {
    /// 全イベント（挿入順）
    all: Vec<DomainEvent>,
    /// 集約ごとのイベント数
    versions: HashMap<LoanId, usize>,
}

/// EventStoreのインメモリ実装
///
/// バージョン確認と追加を1回のロック内で行う。
#[derive(Default)]
pub struct EventStore {
    log: Mutex<Log>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: usize,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        let mut log = lock(&self.log);
        let actual = log.versions.get(&aggregate_id).copied().unwrap_or(0);
        if actual != expected_version {
            return Err(Box::new(VersionConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            }));
        }

        log.versions.insert(aggregate_id, actual + events.len());
        log.all.extend(events);
        Ok(())
    }

    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>> {
        Ok(lock(&self.log)
            .all
            .iter()
            .filter(|event| event.loan_id() == aggregate_id)
            .cloned()
            .collect())
    }

    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>> {
        let events = lock(&self.log).all.clone();
        stream::iter(events.into_iter().map(Ok)).boxed()
    }
}
