//! In-process publication of pipeline events.

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use glidecheck_types::{events::PipelineEvent, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: PipelineEvent) -> Result<()>;
    /// Non-blocking publication for synchronous call sites.
    fn emit(&self, event: PipelineEvent);
    fn subscribe(&self) -> BoxStream<'static, PipelineEvent>;
}

/// Bus backed by a broadcast channel. Lagging subscribers miss events.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish(&self, event: PipelineEvent) -> Result<()> {
        self.emit(event);
        Ok(())
    }

    fn emit(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
    }

    fn subscribe(&self) -> BoxStream<'static, PipelineEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}
