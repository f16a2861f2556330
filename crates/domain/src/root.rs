//! Aggregate root: identity, version and the uncommitted event buffer.

use common::AggregateId;
use event_store::{Snapshot, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::event::Event;

/// Wraps an [`Aggregate`] state with the bookkeeping needed to persist it.
///
/// `version` is always the version of the last applied event (0 before the
/// first). Events produced by [`execute`](Self::execute) are applied
/// immediately and buffered until [`take_uncommitted_events`](Self::take_uncommitted_events).
#[derive(Debug, Clone)]
pub struct AggregateRoot<A: Aggregate> {
    id: AggregateId,
    version: Version,
    state: A,
    uncommitted: Vec<Event<A::Event>>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates an empty root at version 0, ready for a factory command.
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            state: A::default(),
            uncommitted: Vec::new(),
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Returns true once at least one event has been applied.
    pub fn exists(&self) -> bool {
        self.version > Version::initial()
    }

    pub fn uncommitted_events(&self) -> &[Event<A::Event>] {
        &self.uncommitted
    }

    /// Runs a command against the current state and applies what it emits.
    ///
    /// On error nothing changes: neither state, version nor the buffer.
    pub fn execute<F>(&mut self, command: F) -> Result<(), A::Error>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        for payload in command(&self.state)? {
            let event = Event::new(self.id.clone(), self.version.next(), payload);
            self.apply(&event);
            self.uncommitted.push(event);
        }
        Ok(())
    }

    /// Rebuilds an aggregate from its complete history.
    pub fn replay_from(id: AggregateId, events: Vec<Event<A::Event>>) -> Result<Self, DomainError> {
        if events.is_empty() {
            return Err(DomainError::EmptyHistory { aggregate_id: id });
        }

        let mut root = Self::new(id);
        root.replay_after_snapshot(events)?;
        Ok(root)
    }

    /// Restores state directly at the snapshot's version.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, DomainError> {
        Ok(Self {
            id: snapshot.aggregate_id.clone(),
            version: snapshot.version,
            state: snapshot.state_as()?,
            uncommitted: Vec::new(),
        })
    }

    /// Continues folding events on top of the current state.
    ///
    /// Every event must carry exactly the next version.
    pub fn replay_after_snapshot(&mut self, events: Vec<Event<A::Event>>) -> Result<(), DomainError> {
        for event in &events {
            let expected = self.version.next();
            if event.version != expected {
                return Err(DomainError::OutOfSequence {
                    expected,
                    found: event.version,
                });
            }
            self.apply(event);
        }
        Ok(())
    }

    /// Captures the current state as a snapshot at the current version.
    pub fn to_snapshot(&self) -> Result<Snapshot, DomainError> {
        Ok(Snapshot::from_state(
            self.id.clone(),
            A::aggregate_type(),
            self.version,
            &self.state,
        )?)
    }

    /// Drains the uncommitted buffer.
    pub fn take_uncommitted_events(&mut self) -> Vec<Event<A::Event>> {
        std::mem::take(&mut self.uncommitted)
    }

    fn apply(&mut self, event: &Event<A::Event>) {
        self.state.apply(&event.payload);
        self.version = event.version;
    }
}
