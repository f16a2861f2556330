use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{
        ChangeFeed, CheckpointStore, EventStore, EventStream, FeedEvent, FeedStream,
        SnapshotStore, validate_for_append,
    },
};

/// Number of appended events buffered per change-feed subscriber.
const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct StreamLog {
    events: Vec<FeedEvent>,
    keys: HashSet<(AggregateId, Version)>,
}

#[derive(Debug, Default)]
struct Logs {
    streams: HashMap<String, StreamLog>,
    /// Position of the last appended event, across all streams.
    head: u64,
}

/// In-memory event store.
///
/// Enforces the same `(aggregate_id, version)` uniqueness as the Postgres
/// store: the key set is checked and updated under the write lock.
/// Every append gets the next store-wide position and is published on a
/// broadcast channel for [`ChangeFeed`] subscribers while the lock is still
/// held, so the feed sees events in append order.
#[derive(Clone)]
pub struct InMemoryEventStore {
    logs: Arc<RwLock<Logs>>,
    snapshots: Arc<RwLock<Vec<Snapshot>>>,
    checkpoints: Arc<RwLock<HashMap<String, u64>>>,
    feed: broadcast::Sender<(String, FeedEvent)>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates a store whose change feed buffers `capacity` events per subscriber.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            logs: Arc::new(RwLock::new(Logs::default())),
            snapshots: Arc::new(RwLock::new(Vec::new())),
            checkpoints: Arc::new(RwLock::new(HashMap::new())),
            feed,
        }
    }

    /// Returns the total number of events stored across all streams.
    pub async fn event_count(&self) -> usize {
        self.logs
            .read()
            .await
            .streams
            .values()
            .map(|log| log.events.len())
            .sum()
    }

    /// Returns the number of snapshots stored, superseded ones included.
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Deletes every snapshot. The event log is untouched.
    pub async fn clear_snapshots(&self) {
        self.snapshots.write().await.clear();
    }

    /// Clears all events, snapshots and checkpoints. Positions keep counting
    /// from where they were.
    pub async fn clear(&self) {
        self.logs.write().await.streams.clear();
        self.snapshots.write().await.clear();
        self.checkpoints.write().await.clear();
    }

    async fn aggregate_events(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
        after: Version,
    ) -> Vec<EventEnvelope> {
        let logs = self.logs.read().await;
        let Some(log) = logs.streams.get(stream) else {
            return Vec::new();
        };

        let mut events: Vec<_> = log
            .events
            .iter()
            .map(|fe| &fe.event)
            .filter(|e| &e.aggregate_id == aggregate_id && e.version > after)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        events
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, event), fields(aggregate_id = %event.aggregate_id, version = %event.version))]
    async fn append(&self, stream: &str, event: EventEnvelope) -> Result<()> {
        validate_for_append(&event)?;

        let mut logs = self.logs.write().await;
        let position = logs.head + 1;
        let log = logs.streams.entry(stream.to_string()).or_default();

        let key = (event.aggregate_id.clone(), event.version);
        if log.keys.contains(&key) {
            metrics::counter!("concurrency_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                stream: stream.to_string(),
                aggregate_id: key.0,
                version: key.1,
            });
        }

        let appended = FeedEvent { position, event };
        log.keys.insert(key);
        log.events.push(appended.clone());
        logs.head = position;

        metrics::counter!("events_appended_total").increment(1);

        // Sent under the write lock. No subscribers is not an error.
        let _ = self.feed.send((stream.to_string(), appended));
        Ok(())
    }

    async fn load_events(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .aggregate_events(stream, aggregate_id, Version::initial())
            .await)
    }

    async fn load_events_after_version(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
        after: Version,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self.aggregate_events(stream, aggregate_id, after).await)
    }

    async fn count_events(&self, stream: &str, aggregate_id: &AggregateId) -> Result<u64> {
        let logs = self.logs.read().await;
        let count = logs
            .streams
            .get(stream)
            .map(|log| {
                log.events
                    .iter()
                    .filter(|fe| &fe.event.aggregate_id == aggregate_id)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn stream_events(&self, stream: &str) -> Result<EventStream> {
        use futures_util::stream;

        let events: Vec<EventEnvelope> = self
            .logs
            .read()
            .await
            .streams
            .get(stream)
            .map(|log| log.events.iter().map(|fe| fe.event.clone()).collect())
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

#[async_trait]
impl SnapshotStore for InMemoryEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots.write().await.push(snapshot);
        Ok(())
    }

    async fn load_latest_snapshot(
        &self,
        aggregate_id: &AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .iter()
            .filter(|s| &s.aggregate_id == aggregate_id && s.aggregate_type == aggregate_type)
            .max_by_key(|s| s.version)
            .cloned())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryEventStore {
    async fn head_position(&self) -> Result<u64> {
        Ok(self.logs.read().await.head)
    }

    async fn subscribe_from(&self, stream: &str, after: u64) -> Result<FeedStream> {
        // Subscribing under the read lock splits the stream cleanly: everything
        // up to `head` is in the backlog, everything later arrives on `rx`.
        let (backlog, mut rx) = {
            let guard = self.logs.read().await;
            let rx = self.feed.subscribe();
            (events_after(&guard, stream, after), rx)
        };
        let logs = Arc::clone(&self.logs);
        let wanted = stream.to_string();

        Ok(Box::pin(async_stream::stream! {
            let mut last = after;
            for fe in backlog {
                last = fe.position;
                yield Ok(fe);
            }

            loop {
                match rx.recv().await {
                    Ok((name, fe)) if name == wanted && fe.position > last => {
                        last = fe.position;
                        yield Ok(fe);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(stream = %wanted, skipped, "change feed subscriber lagged, reading missed events from the log");
                        let missed = events_after(&*logs.read().await, &wanted, last);
                        for fe in missed {
                            last = fe.position;
                            yield Ok(fe);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

fn events_after(logs: &Logs, stream: &str, after: u64) -> Vec<FeedEvent> {
    logs.streams
        .get(stream)
        .map(|log| {
            log.events
                .iter()
                .filter(|fe| fe.position > after)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CheckpointStore for InMemoryEventStore {
    async fn load_checkpoint(&self, name: &str) -> Result<Option<u64>> {
        Ok(self.checkpoints.read().await.get(name).copied())
    }

    async fn save_checkpoint(&self, name: &str, position: u64) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(name.to_string(), position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    const STREAM: &str = "account_events";

    fn create_test_event(aggregate_id: &str, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("BankAccount")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"type": event_type, "data": {}}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_and_load_in_version_order() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("ACC-1");

        store
            .append_all(
                STREAM,
                vec![
                    create_test_event("ACC-1", 1, "AccountOpened"),
                    create_test_event("ACC-1", 2, "FundsDeposited"),
                    create_test_event("ACC-1", 3, "FundsWithdrawn"),
                ],
            )
            .await
            .unwrap();

        let events = store.load_events(STREAM, &id).await.unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(store.count_events(STREAM, &id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_version_is_a_concurrency_conflict() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("ACC-1");

        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();
        let result = store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { version, .. }) if version == Version::first()
        ));
        assert_eq!(store.count_events(STREAM, &id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_version_in_other_aggregate_or_stream_is_fine() {
        let store = InMemoryEventStore::new();

        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();
        store
            .append(STREAM, create_test_event("ACC-2", 1, "AccountOpened"))
            .await
            .unwrap();
        store
            .append("claim_events", create_test_event("ACC-1", 1, "ClaimFiled"))
            .await
            .unwrap();

        assert_eq!(store.event_count().await, 3);
    }

    #[tokio::test]
    async fn append_all_leaves_committed_prefix_on_failure() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("ACC-1");

        store
            .append(STREAM, create_test_event("ACC-1", 2, "FundsDeposited"))
            .await
            .unwrap();

        let result = store
            .append_all(
                STREAM,
                vec![
                    create_test_event("ACC-1", 1, "AccountOpened"),
                    create_test_event("ACC-1", 2, "FundsDeposited"),
                    create_test_event("ACC-1", 3, "FundsDeposited"),
                ],
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        let versions: Vec<i64> = store
            .load_events(STREAM, &id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.version.as_i64())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn load_after_version_filters_strictly() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("ACC-1");
        for v in 1..=5 {
            store
                .append(STREAM, create_test_event("ACC-1", v, "FundsDeposited"))
                .await
                .unwrap();
        }

        let events = store
            .load_events_after_version(STREAM, &id, Version::new(3))
            .await
            .unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![4, 5]);
    }

    #[tokio::test]
    async fn rejects_invalid_envelope() {
        let store = InMemoryEventStore::new();
        let mut event = create_test_event("ACC-1", 1, "AccountOpened");
        event.version = Version::initial();

        let result = store.append(STREAM, event).await;
        assert!(matches!(result, Err(EventStoreError::InvalidEvent(_))));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn latest_snapshot_is_highest_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("ACC-1");

        for version in [10, 30, 20] {
            store
                .save_snapshot(Snapshot::new(
                    id.clone(),
                    "BankAccount",
                    Version::new(version),
                    serde_json::json!({"v": version}),
                ))
                .await
                .unwrap();
        }

        let latest = store
            .load_latest_snapshot(&id, "BankAccount")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, Version::new(30));
        assert_eq!(store.snapshot_count().await, 3);

        assert!(
            store
                .load_latest_snapshot(&id, "ClaimProcess")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn stream_events_preserves_append_order() {
        let store = InMemoryEventStore::new();
        store
            .append(STREAM, create_test_event("ACC-2", 1, "AccountOpened"))
            .await
            .unwrap();
        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();
        store
            .append(STREAM, create_test_event("ACC-2", 2, "FundsDeposited"))
            .await
            .unwrap();

        let events: Vec<_> = store
            .stream_events(STREAM)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let order: Vec<(String, i64)> = events
            .iter()
            .map(|e| (e.aggregate_id.to_string(), e.version.as_i64()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("ACC-2".to_string(), 1),
                ("ACC-1".to_string(), 1),
                ("ACC-2".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_stream() {
        let store = InMemoryEventStore::new();
        let mut feed = store.subscribe(STREAM).await.unwrap();

        store
            .append("claim_events", create_test_event("CLM-1", 1, "ClaimFiled"))
            .await
            .unwrap();
        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();

        let received = feed.next().await.unwrap().unwrap();
        assert_eq!(received.event_type, "AccountOpened");
        assert_eq!(received.aggregate_id.as_str(), "ACC-1");
    }

    #[tokio::test]
    async fn conflicting_append_is_not_published() {
        let store = InMemoryEventStore::new();
        let mut feed = store.subscribe(STREAM).await.unwrap();

        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();
        let _ = store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await;
        store
            .append(STREAM, create_test_event("ACC-1", 2, "FundsDeposited"))
            .await
            .unwrap();

        let first = feed.next().await.unwrap().unwrap();
        let second = feed.next().await.unwrap().unwrap();
        assert_eq!(first.version, Version::first());
        assert_eq!(second.version, Version::new(2));
    }

    #[tokio::test]
    async fn positions_are_store_wide_and_skip_conflicts() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.head_position().await.unwrap(), 0);

        store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await
            .unwrap();
        let _ = store
            .append(STREAM, create_test_event("ACC-1", 1, "AccountOpened"))
            .await;
        store
            .append("claim_events", create_test_event("CLM-1", 1, "ClaimFiled"))
            .await
            .unwrap();

        assert_eq!(store.head_position().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn subscribe_from_replays_backlog_then_tails() {
        let store = InMemoryEventStore::new();
        for v in 1..=3 {
            store
                .append(STREAM, create_test_event("ACC-1", v, "FundsDeposited"))
                .await
                .unwrap();
        }

        let mut feed = store.subscribe_from(STREAM, 1).await.unwrap();
        store
            .append(STREAM, create_test_event("ACC-1", 4, "FundsDeposited"))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let fe = feed.next().await.unwrap().unwrap();
            seen.push((fe.position, fe.event.version.as_i64()));
        }
        assert_eq!(seen, vec![(2, 2), (3, 3), (4, 4)]);
    }

    #[tokio::test]
    async fn lagged_subscriber_recovers_missed_events_from_the_log() {
        let store = InMemoryEventStore::with_feed_capacity(2);
        let mut feed = store.subscribe(STREAM).await.unwrap();

        for v in 1..=6 {
            store
                .append(STREAM, create_test_event("ACC-1", v, "FundsDeposited"))
                .await
                .unwrap();
        }

        let mut versions = Vec::new();
        for _ in 0..6 {
            versions.push(feed.next().await.unwrap().unwrap().version.as_i64());
        }
        assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_publish_in_append_order() {
        let store = InMemoryEventStore::new();
        let mut feed = store.subscribe_from(STREAM, 0).await.unwrap();

        let mut tasks = Vec::new();
        for writer in 0..4 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for v in 1..=25 {
                    let id = format!("ACC-{writer}");
                    store
                        .append(STREAM, create_test_event(&id, v, "FundsDeposited"))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut last = 0;
        for _ in 0..100 {
            let fe = feed.next().await.unwrap().unwrap();
            assert!(fe.position > last, "position {} after {}", fe.position, last);
            last = fe.position;
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn checkpoints_are_kept_per_name() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.load_checkpoint("a").await.unwrap(), None);

        store.save_checkpoint("a", 3).await.unwrap();
        store.save_checkpoint("a", 5).await.unwrap();
        store.save_checkpoint("b", 1).await.unwrap();

        assert_eq!(store.load_checkpoint("a").await.unwrap(), Some(5));
        assert_eq!(store.load_checkpoint("b").await.unwrap(), Some(1));
    }
}
