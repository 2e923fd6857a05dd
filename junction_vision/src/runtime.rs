// THEORY:
// The runtime is the periodic background task that drives the junction. Each
// tick it asks both directions' detection sources for a frame, feeds the
// result through the pipeline and publishes the snapshot.
//
// The task owns the pipeline outright, so it is the only writer of core state.
// Ticks run strictly one after another: the interval only fires again once
// the previous tick has returned, and each detection call is bounded by a
// timeout so a stuck detector costs one degraded tick instead of a stalled
// junction.

use crate::config::JunctionConfig;
use crate::core_modules::controller::Direction;
use crate::core_modules::detection::{DetectionFilter, DetectionSource};
use crate::core_modules::metrics_store::MetricsStore;
use crate::error::DetectionError;
use crate::pipeline::{DirectionInput, FeedStatus, JunctionPipeline, JunctionSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{info, warn};

pub struct SignalRuntime {
    pipeline: JunctionPipeline,
    source_a: Box<dyn DetectionSource>,
    source_b: Box<dyn DetectionSource>,
    filter: DetectionFilter,
    store: MetricsStore,
    tick_interval: Duration,
    detection_timeout: Duration,
}

impl SignalRuntime {
    /// Builds the pipeline and a store seeded with its initial snapshot.
    pub fn new(
        config: JunctionConfig,
        source_a: Box<dyn DetectionSource>,
        source_b: Box<dyn DetectionSource>,
    ) -> Self {
        let filter = config.filter.clone();
        let tick_interval = config.tick_interval();
        let detection_timeout = config.detection_timeout();
        let pipeline = JunctionPipeline::new(config);
        let store = MetricsStore::new(pipeline.initial_snapshot());
        Self {
            pipeline,
            source_a,
            source_b,
            filter,
            store,
            tick_interval,
            detection_timeout,
        }
    }

    /// Handle for readers. Stays valid after the runtime is moved into a task.
    pub fn store(&self) -> MetricsStore {
        self.store.clone()
    }

    /// Runs one complete tick and publishes its snapshot.
    pub async fn tick(&mut self) -> Arc<JunctionSnapshot> {
        let limit = self.detection_timeout;
        let (a, b) = futures::future::join(
            poll_source(self.source_a.as_mut(), &self.filter, limit, Direction::A),
            poll_source(self.source_b.as_mut(), &self.filter, limit, Direction::B),
        )
        .await;

        let snapshot = self.pipeline.process_inputs_at(a, b, Instant::now());
        self.store.publish(snapshot);
        self.store.read_state()
    }

    /// Ticks on a fixed cadence until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut timer = interval(self.tick_interval.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = self.tick_interval.as_millis() as u64, "junction runtime started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("junction runtime stopped");
    }

    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }
}

async fn poll_source(
    source: &mut dyn DetectionSource,
    filter: &DetectionFilter,
    limit: Duration,
    direction: Direction,
) -> DirectionInput {
    let feed = FeedStatus::from(source.kind());
    let result = match timeout(limit, source.detect()).await {
        Ok(result) => result,
        Err(_) => Err(DetectionError::Timeout(limit)),
    };

    match result {
        Ok(detections) => DirectionInput {
            boxes: filter.vehicle_boxes(&detections),
            feed,
        },
        Err(err) => {
            warn!(?direction, error = %err, "detection unavailable, treating frame as empty");
            DirectionInput::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detection::{BoundingBox, Detection, FeedKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct Scripted {
        frames: VecDeque<Result<Vec<Detection>, DetectionError>>,
    }

    #[async_trait]
    impl DetectionSource for Scripted {
        fn kind(&self) -> FeedKind {
            FeedKind::Live
        }

        async fn detect(&mut self) -> Result<Vec<Detection>, DetectionError> {
            self.frames.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl DetectionSource for Stalled {
        fn kind(&self) -> FeedKind {
            FeedKind::Live
        }

        async fn detect(&mut self) -> Result<Vec<Detection>, DetectionError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn car(x: i32) -> Detection {
        Detection {
            bbox: BoundingBox { x1: x, y1: 0, x2: x + 20, y2: 10 },
            class_id: 2,
            confidence: 0.9,
        }
    }

    fn scripted(frames: Vec<Result<Vec<Detection>, DetectionError>>) -> Box<dyn DetectionSource> {
        Box::new(Scripted { frames: frames.into() })
    }

    fn fast_config() -> JunctionConfig {
        JunctionConfig {
            tick_interval_ms: 10,
            detection_timeout_ms: 50,
            ..JunctionConfig::default()
        }
    }

    #[tokio::test]
    async fn tick_filters_and_publishes() {
        let person = Detection { class_id: 0, ..car(100) };
        let mut runtime = SignalRuntime::new(
            fast_config(),
            scripted(vec![Ok(vec![car(0), person, car(40)])]),
            scripted(vec![Ok(vec![car(0)])]),
        );
        let store = runtime.store();
        let snapshot = runtime.tick().await;
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.direction_a.metrics.queue_length, 2);
        assert_eq!(snapshot.direction_b.metrics.queue_length, 1);
        assert_eq!(store.read_state().tick, 1);
    }

    #[tokio::test]
    async fn failing_source_degrades_its_direction_only() {
        let mut runtime = SignalRuntime::new(
            fast_config(),
            scripted(vec![Err(DetectionError::Unavailable("camera unplugged".into()))]),
            scripted(vec![Ok(vec![car(0)])]),
        );
        let snapshot = runtime.tick().await;
        assert_eq!(snapshot.direction_a.feed, FeedStatus::Degraded);
        assert_eq!(snapshot.direction_a.metrics.queue_length, 0);
        assert_eq!(snapshot.direction_b.feed, FeedStatus::Live);
        assert_eq!(snapshot.direction_b.metrics.queue_length, 1);
    }

    #[tokio::test]
    async fn stalled_source_is_cut_off_by_timeout() {
        let mut runtime = SignalRuntime::new(
            fast_config(),
            Box::new(Stalled),
            scripted(vec![Ok(vec![car(0), car(40)])]),
        );
        let started = Instant::now();
        let snapshot = runtime.tick().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(snapshot.direction_a.feed, FeedStatus::Degraded);
        assert_eq!(snapshot.direction_b.metrics.vehicle_count, 2);
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let runtime = SignalRuntime::new(
            fast_config(),
            scripted(vec![Ok(vec![car(0)]); 100]),
            scripted(Vec::new()),
        );
        let store = runtime.store();
        let mut updates = store.subscribe();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = runtime.spawn(async move {
            let _ = stop_rx.await;
        });

        for _ in 0..3 {
            updates.changed().await.expect("runtime alive");
        }
        stop_tx.send(()).expect("runtime still listening");
        handle.await.expect("runtime task panicked");
        assert!(store.read_state().tick >= 3);
    }
}
