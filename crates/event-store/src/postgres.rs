use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgListener, PgRow},
};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Snapshot, Version,
    store::{
        ChangeFeed, CheckpointStore, EventStore, EventStream, FeedEvent, FeedStream,
        SnapshotStore, validate_for_append,
    },
};

/// Channel the `events` insert trigger notifies on.
pub const EVENT_FEED_CHANNEL: &str = "event_feed";

const UNIQUE_VERSION_CONSTRAINT: &str = "unique_stream_aggregate_version";

const EVENT_COLUMNS: &str =
    "event_id, stream, event_type, aggregate_id, aggregate_type, version, occurred_at, payload";

/// PostgreSQL-backed event store implementation.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }

    /// Stored events of `stream` after `after`, ascending by position.
    async fn feed_events_after(&self, stream: &str, after: u64) -> Result<Vec<FeedEvent>> {
        let sql = format!(
            "SELECT global_position, {EVENT_COLUMNS} FROM events \
             WHERE stream = $1 AND global_position > $2 \
             ORDER BY global_position ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(stream)
            .bind(to_db_position(after))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let position: i64 = row.try_get("global_position")?;
                Ok(FeedEvent {
                    position: position.max(0) as u64,
                    event: Self::row_to_event(row)?,
                })
            })
            .collect()
    }
}

fn to_db_position(position: u64) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

/// Splits a notification payload of the form `stream:global_position`.
///
/// Stream names may contain `:`; the position is always the last segment.
fn parse_notification(payload: &str) -> Option<(&str, i64)> {
    let (stream, position) = payload.rsplit_once(':')?;
    Some((stream, position.parse().ok()?))
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, event), fields(aggregate_id = %event.aggregate_id, version = %event.version))]
    async fn append(&self, stream: &str, event: EventEnvelope) -> Result<()> {
        validate_for_append(&event)?;

        sqlx::query(
            r#"
            INSERT INTO events (event_id, stream, event_type, aggregate_id, aggregate_type, version, occurred_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(stream)
        .bind(&event.event_type)
        .bind(event.aggregate_id.as_str())
        .bind(&event.aggregate_type)
        .bind(event.version.as_i64())
        .bind(event.occurred_at)
        .bind(&event.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_VERSION_CONSTRAINT)
            {
                metrics::counter!("concurrency_conflicts_total").increment(1);
                return EventStoreError::ConcurrencyConflict {
                    stream: stream.to_string(),
                    aggregate_id: event.aggregate_id.clone(),
                    version: event.version,
                };
            }
            EventStoreError::Database(e)
        })?;

        metrics::counter!("events_appended_total").increment(1);
        Ok(())
    }

    async fn load_events(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.load_events_after_version(stream, aggregate_id, Version::initial())
            .await
    }

    async fn load_events_after_version(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
        after: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE stream = $1 AND aggregate_id = $2 AND version > $3 \
             ORDER BY version ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(stream)
            .bind(aggregate_id.as_str())
            .bind(after.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn count_events(&self, stream: &str, aggregate_id: &AggregateId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE stream = $1 AND aggregate_id = $2")
                .bind(stream)
                .bind(aggregate_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn stream_events(&self, stream: &str) -> Result<EventStream> {
        use futures_util::StreamExt;

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE stream = $1 ORDER BY global_position ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(stream)
            .fetch_all(&self.pool)
            .await?;

        Ok(Box::pin(
            futures_util::stream::iter(rows).map(Self::row_to_event),
        ))
    }
}

#[async_trait]
impl SnapshotStore for PostgresEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (snapshot_id, aggregate_id, aggregate_type, version, created_at, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(snapshot.snapshot_id)
        .bind(snapshot.aggregate_id.as_str())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.created_at)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_latest_snapshot(
        &self,
        aggregate_id: &AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT snapshot_id, aggregate_id, aggregate_type, version, created_at, state
            FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(aggregate_id.as_str())
        .bind(aggregate_type)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                snapshot_id: row.try_get("snapshot_id")?,
                aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                state: row.try_get("state")?,
            })),
            None => Ok(None),
        }
    }
}

/// Tails via `LISTEN/NOTIFY` on [`EVENT_FEED_CHANNEL`].
///
/// Notifications only wake the subscriber; events are always read back from
/// the table with `global_position > last`, so a burst of notifications or a
/// missed one costs nothing but a query. A sequence value taken by a
/// transaction that commits after a higher one is not revisited.
#[async_trait]
impl ChangeFeed for PostgresEventStore {
    async fn head_position(&self) -> Result<u64> {
        let head: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(global_position), 0) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(head.max(0) as u64)
    }

    async fn subscribe_from(&self, stream: &str, after: u64) -> Result<FeedStream> {
        // Listen before the catch-up read so no append falls between them.
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(EVENT_FEED_CHANNEL).await?;

        let store = self.clone();
        let wanted = stream.to_string();

        Ok(Box::pin(async_stream::stream! {
            let mut last = after;
            let mut catch_up = true;

            loop {
                if catch_up {
                    match store.feed_events_after(&wanted, last).await {
                        Ok(events) => {
                            for fe in events {
                                last = fe.position;
                                yield Ok(fe);
                            }
                        }
                        Err(e) => yield Err(e),
                    }
                }

                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        yield Err(EventStoreError::Database(e));
                        break;
                    }
                };

                catch_up = match parse_notification(notification.payload()) {
                    Some((name, position)) => name == wanted && position.max(0) as u64 > last,
                    None => {
                        tracing::warn!(payload = notification.payload(), "malformed change feed notification");
                        false
                    }
                };
            }
        }))
    }
}

#[async_trait]
impl CheckpointStore for PostgresEventStore {
    async fn load_checkpoint(&self, name: &str) -> Result<Option<u64>> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM projection_checkpoints WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(position.map(|p| p.max(0) as u64))
    }

    async fn save_checkpoint(&self, name: &str, position: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projection_checkpoints (name, position, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET position = EXCLUDED.position, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(to_db_position(position))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
