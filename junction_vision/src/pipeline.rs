// THEORY:
// The `pipeline` module is the top-level synchronous API of the junction core.
// It wires the per-direction trackers, the aggregator and the controller into
// a single `process_tick` call and packages the outcome as an immutable
// `JunctionSnapshot` ready for publication.
//
// `JunctionPipeline` is the sole owner of all mutable core state. Taking
// `&mut self` per tick is what makes it the single writer; readers only ever
// see the snapshots it hands out.

use crate::config::JunctionConfig;
use crate::core_modules::aggregator::{DirectionalMetrics, aggregate};
use crate::core_modules::controller::{
    AdaptiveSignalController, ControllerState, Direction, SignalPhase, Transition,
};
use crate::core_modules::detection::{BoundingBox, FeedKind};
use crate::core_modules::tracker::{TrackSummary, VehicleTracker};
use serde::Serialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

// Re-export key data structures for the public API.
pub use crate::core_modules::controller::SignalTiming;
pub use crate::core_modules::tracker::{Track, TrackerConfig};

/// Where a direction's detections came from on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Live,
    Simulated,
    /// The source failed or timed out; the tick ran with no detections.
    Degraded,
}

impl From<FeedKind> for FeedStatus {
    fn from(kind: FeedKind) -> Self {
        match kind {
            FeedKind::Live => FeedStatus::Live,
            FeedKind::Simulated => FeedStatus::Simulated,
        }
    }
}

/// One direction's input to a tick.
#[derive(Debug, Clone)]
pub struct DirectionInput {
    pub boxes: Vec<BoundingBox>,
    pub feed: FeedStatus,
}

impl DirectionInput {
    pub fn live(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes, feed: FeedStatus::Live }
    }

    pub fn degraded() -> Self {
        Self { boxes: Vec::new(), feed: FeedStatus::Degraded }
    }
}

/// Published view of one direction.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionReport {
    pub label: String,
    pub metrics: DirectionalMetrics,
    pub feed: FeedStatus,
    pub tracks: Vec<TrackSummary>,
}

/// Immutable result of one tick, as seen by external readers.
#[derive(Debug, Clone, Serialize)]
pub struct JunctionSnapshot {
    pub tick: u64,
    pub published_at_ms: u64,
    pub phase: SignalPhase,
    pub green_duration_secs: f64,
    pub phase_elapsed_secs: f64,
    pub time_remaining_secs: f64,
    pub last_transition: Option<Transition>,
    pub traffic_reduction_pct: f64,
    pub direction_a: DirectionReport,
    pub direction_b: DirectionReport,
}

impl JunctionSnapshot {
    pub fn direction(&self, direction: Direction) -> &DirectionReport {
        match direction {
            Direction::A => &self.direction_a,
            Direction::B => &self.direction_b,
        }
    }
}

/// Percentage drop of the combined queue against a first-seen baseline.
///
/// The baseline starts at 1 and is replaced by the first total queue above 1.
#[derive(Debug, Clone)]
pub struct ReductionBaseline {
    baseline: usize,
}

impl Default for ReductionBaseline {
    fn default() -> Self {
        Self { baseline: 1 }
    }
}

impl ReductionBaseline {
    pub fn update(&mut self, total_queue: usize) -> f64 {
        if self.baseline == 1 {
            self.baseline = total_queue.max(1);
        }
        let baseline = self.baseline as f64;
        ((baseline - total_queue as f64) / baseline * 100.0).max(0.0)
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }
}

/// Owns every piece of mutable junction state.
pub struct JunctionPipeline {
    config: JunctionConfig,
    tracker_a: VehicleTracker,
    tracker_b: VehicleTracker,
    controller: AdaptiveSignalController,
    reduction: ReductionBaseline,
    reduction_pct: f64,
    feeds: [FeedStatus; 2],
    tick: u64,
}

impl JunctionPipeline {
    pub fn new(config: JunctionConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: JunctionConfig, now: Instant) -> Self {
        Self {
            tracker_a: VehicleTracker::new(config.tracker.clone()),
            tracker_b: VehicleTracker::new(config.tracker.clone()),
            controller: AdaptiveSignalController::new(config.timing.clone(), now),
            reduction: ReductionBaseline::default(),
            reduction_pct: 0.0,
            feeds: [FeedStatus::Live; 2],
            tick: 0,
            config,
        }
    }

    /// Runs one tick with live detections from both directions.
    pub fn process_tick(&mut self, a: &[BoundingBox], b: &[BoundingBox]) -> JunctionSnapshot {
        self.process_tick_at(a, b, Instant::now())
    }

    pub fn process_tick_at(
        &mut self,
        a: &[BoundingBox],
        b: &[BoundingBox],
        now: Instant,
    ) -> JunctionSnapshot {
        self.process_inputs_at(
            DirectionInput::live(a.to_vec()),
            DirectionInput::live(b.to_vec()),
            now,
        )
    }

    /// Full tick: track, aggregate, update reduction, run the controller.
    pub fn process_inputs_at(
        &mut self,
        a: DirectionInput,
        b: DirectionInput,
        now: Instant,
    ) -> JunctionSnapshot {
        let metrics_a = aggregate(a.boxes.len(), self.tracker_a.update(&a.boxes));
        let metrics_b = aggregate(b.boxes.len(), self.tracker_b.update(&b.boxes));

        self.reduction_pct = self
            .reduction
            .update(metrics_a.queue_length + metrics_b.queue_length);
        self.feeds = [a.feed, b.feed];
        self.tick += 1;

        self.controller.update(metrics_a, metrics_b, now);

        debug!(
            tick = self.tick,
            a_queue = metrics_a.queue_length,
            a_count = metrics_a.vehicle_count,
            a_speed = metrics_a.avg_speed,
            b_queue = metrics_b.queue_length,
            b_count = metrics_b.vehicle_count,
            b_speed = metrics_b.avg_speed,
            phase = ?self.controller.state().phase,
            "tick processed"
        );

        self.snapshot_at(now)
    }

    /// Snapshot of the state before any tick has run.
    pub fn initial_snapshot(&self) -> JunctionSnapshot {
        self.snapshot_at(self.controller.state().phase_started_at)
    }

    pub fn snapshot_at(&self, now: Instant) -> JunctionSnapshot {
        let state: &ControllerState = self.controller.state();
        JunctionSnapshot {
            tick: self.tick,
            published_at_ms: wall_clock_millis(),
            phase: state.phase,
            green_duration_secs: state.green_duration_secs,
            phase_elapsed_secs: state.elapsed_secs(now),
            time_remaining_secs: state.time_remaining_secs(now),
            last_transition: state.last_transition,
            traffic_reduction_pct: self.reduction_pct,
            direction_a: self.report(Direction::A),
            direction_b: self.report(Direction::B),
        }
    }

    fn report(&self, direction: Direction) -> DirectionReport {
        let (label, tracker, feed) = match direction {
            Direction::A => (&self.config.direction_a_label, &self.tracker_a, self.feeds[0]),
            Direction::B => (&self.config.direction_b_label, &self.tracker_b, self.feeds[1]),
        };
        DirectionReport {
            label: label.clone(),
            metrics: *self.controller.state().metrics(direction),
            feed,
            tracks: tracker.tracks().iter().map(TrackSummary::from).collect(),
        }
    }

    pub fn controller_state(&self) -> &ControllerState {
        self.controller.state()
    }

    pub fn tracker(&self, direction: Direction) -> &VehicleTracker {
        match direction {
            Direction::A => &self.tracker_a,
            Direction::B => &self.tracker_b,
        }
    }

    pub fn config(&self) -> &JunctionConfig {
        &self.config
    }
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
