//! Command handling infrastructure.

use std::marker::PhantomData;
use std::sync::Arc;

use common::AggregateId;
use event_store::{EventStore, SnapshotStore, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::event::Event;
use crate::projection::Projection;
use crate::root::AggregateRoot;

/// Default number of versions between snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 10;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub root: AggregateRoot<A>,

    /// The events that were generated and persisted.
    pub events: Vec<Event<A::Event>>,
}

impl<A: Aggregate> CommandResult<A> {
    pub fn version(&self) -> Version {
        self.root.version()
    }

    pub fn state(&self) -> &A {
        self.root.state()
    }
}

/// Runs commands for one aggregate kind.
///
/// The pipeline is load, validate and apply, append, project, snapshot.
/// Events are durably appended before any projection sees them; projection
/// and snapshot failures after that point are logged rather than returned,
/// because the command itself has already happened.
pub struct CommandService<S, A>
where
    S: EventStore + SnapshotStore,
    A: Aggregate,
{
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    snapshot_interval: u64,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandService<S, A>
where
    S: EventStore + SnapshotStore,
    A: Aggregate,
{
    /// Creates a new command service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            _phantom: PhantomData,
        }
    }

    /// Registers a projection to run synchronously after each append.
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    /// Sets the snapshot interval. Zero disables snapshots.
    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot_interval(&self) -> u64 {
        self.snapshot_interval
    }

    /// Loads an aggregate from its latest snapshot plus later events, or by
    /// full replay when no snapshot exists.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load(&self, aggregate_id: &AggregateId) -> Result<AggregateRoot<A>, DomainError> {
        let snapshot = self
            .store
            .load_latest_snapshot(aggregate_id, A::aggregate_type())
            .await?;

        if let Some(snapshot) = snapshot {
            tracing::debug!(version = %snapshot.version, "loading from snapshot");
            let mut root = AggregateRoot::from_snapshot(&snapshot)?;
            let delta = self
                .store
                .load_events_after_version(A::stream(), aggregate_id, snapshot.version)
                .await?;
            root.replay_after_snapshot(decode(&delta)?)?;
            return Ok(root);
        }

        let events = self.store.load_events(A::stream(), aggregate_id).await?;
        if events.is_empty() {
            return Err(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: aggregate_id.clone(),
            });
        }

        AggregateRoot::replay_from(aggregate_id.clone(), decode(&events)?)
    }

    /// Runs a factory command on a fresh aggregate and persists the result.
    ///
    /// A second create for the same id loses on the version 1 uniqueness
    /// check and returns [`DomainError::ConcurrencyConflict`].
    #[tracing::instrument(skip(self, command), fields(aggregate_type = A::aggregate_type()))]
    pub async fn create<F>(
        &self,
        aggregate_id: AggregateId,
        command: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut root = AggregateRoot::new(aggregate_id);
        root.execute(command)?;
        self.persist(root).await
    }

    /// Loads an aggregate, runs a command against it and persists the result.
    #[tracing::instrument(skip(self, command), fields(aggregate_type = A::aggregate_type()))]
    pub async fn execute<F>(
        &self,
        aggregate_id: &AggregateId,
        command: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut root = self.load(aggregate_id).await?;
        root.execute(command)?;
        self.persist(root).await
    }

    /// Number of events stored for an aggregate.
    pub async fn count_events(&self, aggregate_id: &AggregateId) -> Result<u64, DomainError> {
        Ok(self.store.count_events(A::stream(), aggregate_id).await?)
    }

    async fn persist(&self, mut root: AggregateRoot<A>) -> Result<CommandResult<A>, DomainError> {
        let events = root.take_uncommitted_events();
        if events.is_empty() {
            return Ok(CommandResult { root, events });
        }

        let envelopes = events
            .iter()
            .map(|e| e.to_envelope(A::aggregate_type()))
            .collect::<Result<Vec<_>, _>>()?;

        self.store.append_all(A::stream(), envelopes.clone()).await?;
        metrics::counter!("commands_executed_total").increment(1);

        for envelope in &envelopes {
            for projection in &self.projections {
                if let Err(e) = projection.project(envelope).await {
                    metrics::counter!("projection_failures_total").increment(1);
                    tracing::error!(
                        projection = projection.name(),
                        event_type = %envelope.event_type,
                        aggregate_id = %envelope.aggregate_id,
                        version = %envelope.version,
                        error = %e,
                        "projection failed after commit"
                    );
                }
            }
        }

        if root.version().is_multiple_of(self.snapshot_interval) {
            self.save_snapshot(&root).await;
        }

        Ok(CommandResult { root, events })
    }

    async fn save_snapshot(&self, root: &AggregateRoot<A>) {
        let result = match root.to_snapshot() {
            Ok(snapshot) => self.store.save_snapshot(snapshot).await.map_err(DomainError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                metrics::counter!("snapshots_saved_total").increment(1);
                tracing::debug!(aggregate_id = %root.id(), version = %root.version(), "snapshot saved");
            }
            Err(e) => {
                tracing::warn!(aggregate_id = %root.id(), version = %root.version(), error = %e, "snapshot skipped");
            }
        }
    }
}

fn decode<P: crate::aggregate::DomainEvent>(
    envelopes: &[event_store::EventEnvelope],
) -> Result<Vec<Event<P>>, DomainError> {
    envelopes.iter().map(Event::from_envelope).collect()
}
