use glidecheck_bus::EventBus;
use glidecheck_types::{
    events::{EventPayload, PipelineEvent},
    report::FrameFailure,
};
use tracing::{debug, warn};

/// Fire-and-forget sink for driver progress and frame failures.
pub trait PipelineObserver {
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_failure(&mut self, _failure: &FrameFailure) {}
}

impl<O: PipelineObserver + ?Sized> PipelineObserver for &mut O {
    fn on_progress(&mut self, fraction: f64) {
        (**self).on_progress(fraction)
    }

    fn on_failure(&mut self, failure: &FrameFailure) {
        (**self).on_failure(failure)
    }
}

/// Discards everything.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs progress and failures through `tracing`.
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_progress(&mut self, fraction: f64) {
        debug!("annotation progress {:.0}%", fraction * 100.0);
    }

    fn on_failure(&mut self, failure: &FrameFailure) {
        warn!(
            index = failure.index,
            stage = %failure.stage,
            "Error analyzing frame {}: {}",
            failure.index + 1,
            failure.message
        );
    }
}

/// Logs like [`LogObserver`] and republishes on an event bus.
pub struct BusObserver<'a, B: EventBus + ?Sized> {
    bus: &'a B,
}

impl<'a, B: EventBus + ?Sized> BusObserver<'a, B> {
    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }
}

impl<B: EventBus + ?Sized> PipelineObserver for BusObserver<'_, B> {
    fn on_progress(&mut self, fraction: f64) {
        LogObserver.on_progress(fraction);
        self.bus.emit(PipelineEvent::progress(fraction));
    }

    fn on_failure(&mut self, failure: &FrameFailure) {
        LogObserver.on_failure(failure);
        self.bus
            .emit(PipelineEvent::new(EventPayload::FrameFailed(failure.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use glidecheck_bus::LocalBus;
    use glidecheck_types::{events::EventKind, report::FailureStage};

    #[tokio::test]
    async fn bus_observer_republishes_events() {
        let bus = LocalBus::new(8);
        let stream = bus.subscribe();
        {
            let mut observer = BusObserver::new(&bus);
            observer.on_failure(&FrameFailure {
                index: 0,
                stage: FailureStage::Annotation,
                message: "bad frame".into(),
            });
            observer.on_progress(1.0);
        }
        drop(bus);

        let kinds: Vec<EventKind> = stream.map(|e| e.kind).collect().await;
        assert_eq!(kinds, vec![EventKind::FrameFailed, EventKind::Progress]);
    }
}
