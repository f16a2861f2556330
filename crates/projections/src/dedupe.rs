//! Deduplication for projections fed by more than one path.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use tokio::sync::Mutex;

use crate::Result;
use domain::Projection;

/// Versions of one aggregate that have been applied.
///
/// Everything up to `contiguous` is applied; `ahead` holds applied versions
/// past a gap, and drains into `contiguous` once the gap is filled.
#[derive(Debug, Default)]
struct Applied {
    contiguous: Version,
    ahead: BTreeSet<Version>,
}

impl Applied {
    fn contains(&self, version: Version) -> bool {
        version <= self.contiguous || self.ahead.contains(&version)
    }

    fn insert(&mut self, version: Version) {
        self.ahead.insert(version);
        while self.ahead.remove(&self.contiguous.next()) {
            self.contiguous = self.contiguous.next();
        }
    }
}

#[derive(Debug, Default)]
struct Seen {
    aggregates: HashMap<(String, AggregateId), Applied>,
    applied: usize,
}

/// Wraps a projection so that each `(aggregate, version)` is applied at most
/// once.
///
/// The synchronous command path and the change-feed listener may both deliver
/// the same event. A version is recorded only after the inner projection
/// succeeds, so a failed delivery can be retried by the other path. Memory
/// grows with the number of aggregates, not events.
pub struct Deduplicated<P> {
    inner: P,
    seen: Arc<Mutex<Seen>>,
}

impl<P: Projection> Deduplicated<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            seen: Arc::new(Mutex::new(Seen::default())),
        }
    }

    /// Returns the wrapped projection.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of distinct events applied since the last reset.
    pub async fn applied_count(&self) -> usize {
        self.seen.lock().await.applied
    }
}

#[async_trait]
impl<P: Projection> Projection for Deduplicated<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        // Held across the inner call so two paths cannot both pass the check.
        let mut seen = self.seen.lock().await;
        let key = (event.aggregate_type.clone(), event.aggregate_id.clone());
        if seen
            .aggregates
            .get(&key)
            .is_some_and(|applied| applied.contains(event.version))
        {
            tracing::debug!(
                projection = self.inner.name(),
                event_id = %event.event_id,
                aggregate_id = %event.aggregate_id,
                version = %event.version,
                "duplicate delivery ignored"
            );
            return Ok(());
        }

        self.inner.project(event).await?;
        seen.aggregates.entry(key).or_default().insert(event.version);
        seen.applied += 1;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut seen = self.seen.lock().await;
        self.inner.reset().await?;
        *seen = Seen::default();
        Ok(())
    }
}
