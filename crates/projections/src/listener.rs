//! Asynchronous projection path driven by a store's change feed.
//!
//! [`ChangeFeedListener`] subscribes to one stream and spawns a background
//! task that hands every appended event to its projections. A listener with a
//! checkpoint name records the position of each event it handles and resumes
//! after it on the next start, so events appended while it was down are
//! still delivered. [`ListenerHandle`] stops the task and reports progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use event_store::{ChangeFeed, CheckpointStore, FeedStream};
use futures_util::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::{ProjectionError, Result};
use domain::Projection;

/// Background projector over a [`ChangeFeed`] subscription.
pub struct ChangeFeedListener<C> {
    feed: C,
    stream: String,
    checkpoint: Option<String>,
    projections: Vec<Arc<dyn Projection>>,
}

impl<C> ChangeFeedListener<C>
where
    C: ChangeFeed + CheckpointStore + 'static,
{
    pub fn new(feed: C, stream: impl Into<String>) -> Self {
        Self {
            feed,
            stream: stream.into(),
            checkpoint: None,
            projections: Vec::new(),
        }
    }

    /// Persists progress under `name` and resumes from it on start.
    pub fn with_checkpoint(mut self, name: impl Into<String>) -> Self {
        self.checkpoint = Some(name.into());
        self
    }

    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    /// Subscribes and spawns the listener task.
    ///
    /// Starts after the saved checkpoint if there is one, otherwise at the
    /// current head. The subscription is open when this returns: any event
    /// appended afterwards reaches the projections.
    #[tracing::instrument(skip(self), fields(stream = %self.stream, checkpoint = ?self.checkpoint))]
    pub async fn start(self) -> Result<ListenerHandle> {
        let saved = match &self.checkpoint {
            Some(name) => self.feed.load_checkpoint(name).await?,
            None => None,
        };
        let after = match saved {
            Some(position) => position,
            None => {
                let head = self.feed.head_position().await?;
                if let Some(name) = &self.checkpoint {
                    self.feed.save_checkpoint(name, head).await?;
                }
                head
            }
        };

        let events = self.feed.subscribe_from(&self.stream, after).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processed = Arc::new(AtomicU64::new(0));
        let position = Arc::new(AtomicU64::new(after));

        let worker = Worker {
            feed: self.feed,
            stream: self.stream,
            checkpoint: self.checkpoint,
            projections: self.projections,
            processed: Arc::clone(&processed),
            position: Arc::clone(&position),
        };
        let task = tokio::spawn(worker.run(events, shutdown_rx));

        tracing::info!(after, resumed = saved.is_some(), "change feed listener started");

        Ok(ListenerHandle {
            shutdown_tx,
            processed,
            position,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }
}

/// Handle for a running [`ChangeFeedListener`].
///
/// Dropping the handle does not stop the task; call
/// [`shutdown`](ListenerHandle::shutdown). Clones share the same task.
#[derive(Clone)]
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    processed: Arc<AtomicU64>,
    position: Arc<AtomicU64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ListenerHandle {
    /// Number of events delivered to the projections so far.
    pub fn events_processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Feed position of the last event handled, or the start position.
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Signals the task to stop and waits for it. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        // The receiver is gone if the task already exited.
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().await.take();
        if let Some(join_handle) = task {
            join_handle.await.map_err(|e| {
                ProjectionError::Projection(format!("listener task panicked: {e}"))
            })?;
        }
        Ok(())
    }
}

struct Worker<C> {
    feed: C,
    stream: String,
    checkpoint: Option<String>,
    projections: Vec<Arc<dyn Projection>>,
    processed: Arc<AtomicU64>,
    position: Arc<AtomicU64>,
}

impl<C> Worker<C>
where
    C: ChangeFeed + CheckpointStore,
{
    async fn run(self, mut events: FeedStream, mut shutdown_rx: watch::Receiver<bool>) {
        let stream = &self.stream;
        loop {
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(fe)) => {
                        for projection in &self.projections {
                            if let Err(e) = projection.project(&fe.event).await {
                                metrics::counter!("projection_failures_total").increment(1);
                                tracing::error!(
                                    projection = projection.name(),
                                    event_type = %fe.event.event_type,
                                    aggregate_id = %fe.event.aggregate_id,
                                    error = %e,
                                    "async projection failed"
                                );
                            } else {
                                metrics::counter!("projections_events_processed").increment(1);
                            }
                        }
                        self.advance(fe.position).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(stream = %stream, error = %e, "change feed error, skipping");
                    }
                    None => {
                        tracing::info!(stream = %stream, "change feed closed");
                        break;
                    }
                },
                _ = shutdown_rx.changed() => {
                    tracing::info!(stream = %stream, "change feed listener stopped");
                    break;
                }
            }
        }
    }

    async fn advance(&self, position: u64) {
        if let Some(name) = &self.checkpoint
            && let Err(e) = self.feed.save_checkpoint(name, position).await
        {
            tracing::warn!(checkpoint = %name, position, error = %e, "failed to save checkpoint");
        }
        self.position.store(position, Ordering::Release);
        self.processed.fetch_add(1, Ordering::AcqRel);
    }
}
