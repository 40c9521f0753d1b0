use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result, VersionConflict};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::{PgPool, Row};

/// PostgreSQL implementation of EventStore
///
/// Stores loan events in an append-only log, serialized as JSONB.
/// `(aggregate_id, aggregate_version)` is unique, so two writers that read the
/// same version cannot both append.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl EventStoreTrait for EventStore {
    /// Append events to the event store
    ///
    /// The current version is checked against `expected_version` inside the
    /// transaction. A concurrent writer that slips in between the check and the
    /// insert trips the unique index and is reported as the same conflict.
    /// Uses batch INSERT with UNNEST.
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: usize,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let current_version: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(aggregate_version), 0)
            FROM events
            WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_one(&mut *tx)
        .await?;

        let current_version = usize::try_from(current_version)?;
        if current_version != expected_version {
            return Err(Box::new(VersionConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            }));
        }

        let base_version = i32::try_from(expected_version)?;
        let mut versions = Vec::with_capacity(events.len());
        let mut event_types = Vec::with_capacity(events.len());
        let mut event_data_list = Vec::with_capacity(events.len());
        let mut occurred_at_list = Vec::with_capacity(events.len());

        for (i, event) in events.iter().enumerate() {
            versions.push(base_version + i32::try_from(i)? + 1);
            event_types.push(event.event_type());
            event_data_list.push(serde_json::to_value(event)?);
            occurred_at_list.push(event.occurred_at());
        }

        let aggregate_types = vec!["Loan"; events.len()];

        let inserted = sqlx::query(
            r#"
            INSERT INTO events (
                aggregate_id,
                aggregate_version,
                aggregate_type,
                event_type,
                event_data,
                occurred_at
            )
            SELECT $1, * FROM UNNEST($2::int[], $3::varchar[], $4::varchar[], $5::jsonb[], $6::timestamptz[])
            "#,
        )
        .bind(aggregate_id.value())
        .bind(&versions)
        .bind(&aggregate_types)
        .bind(&event_types)
        .bind(&event_data_list)
        .bind(&occurred_at_list)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Box::new(VersionConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual: expected_version + 1,
                }));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load all events for an aggregate ordered by aggregate_version
    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            WHERE aggregate_id = $1
            ORDER BY aggregate_version ASC
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.get("event_data");
            events.push(serde_json::from_value(event_data)?);
        }

        Ok(events)
    }

    /// Stream all events ordered by sequence_number
    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>> {
        let stream = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|row_result| {
            let row = row_result?;
            let event_data: serde_json::Value = row.get("event_data");
            let event: DomainEvent = serde_json::from_value(event_data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            Ok(event)
        });

        Box::pin(stream)
    }
}
