use junction_vision::{Direction, FeedStatus, JunctionSnapshot};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Flat per-tick summary polled by the dashboard page.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficDataView {
    pub a_label: String,
    pub b_label: String,
    pub a_queue_length: usize,
    pub b_queue_length: usize,
    pub a_avg_speed: f64,
    pub b_avg_speed: f64,
    pub a_vehicle_count: usize,
    pub b_vehicle_count: usize,
    /// Label of the direction currently holding green.
    pub current_signal: String,
    /// Seconds left in the current green.
    pub signal_timer: f64,
    pub traffic_reduction: f64,
    pub camera_status: &'static str,
}

impl From<&JunctionSnapshot> for TrafficDataView {
    fn from(s: &JunctionSnapshot) -> Self {
        let a = &s.direction_a;
        let b = &s.direction_b;
        Self {
            a_label: a.label.clone(),
            b_label: b.label.clone(),
            a_queue_length: a.metrics.queue_length,
            b_queue_length: b.metrics.queue_length,
            a_avg_speed: a.metrics.avg_speed,
            b_avg_speed: b.metrics.avg_speed,
            a_vehicle_count: a.metrics.vehicle_count,
            b_vehicle_count: b.metrics.vehicle_count,
            current_signal: s.direction(s.phase.green()).label.clone(),
            signal_timer: s.time_remaining_secs,
            traffic_reduction: s.traffic_reduction_pct,
            camera_status: camera_status(s),
        }
    }
}

/// `degraded` if either feed failed this tick, `simulated` if both are
/// stand-ins, otherwise `active`.
pub fn camera_status(s: &JunctionSnapshot) -> &'static str {
    let feeds = [Direction::A, Direction::B].map(|d| s.direction(d).feed);
    if feeds.contains(&FeedStatus::Degraded) {
        "degraded"
    } else if feeds.iter().all(|f| *f == FeedStatus::Simulated) {
        "simulated"
    } else {
        "active"
    }
}

/// Body of `/camera_status`.
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatusView {
    pub status: &'static str,
    /// Processed frames per second over the recent window.
    pub fps: f64,
    pub feeds: FeedsView,
    pub tick: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeedsView {
    pub a: FeedStatus,
    pub b: FeedStatus,
}

impl CameraStatusView {
    pub fn new(s: &JunctionSnapshot, fps: f64) -> Self {
        Self {
            status: camera_status(s),
            fps,
            feeds: FeedsView {
                a: s.direction_a.feed,
                b: s.direction_b.feed,
            },
            tick: s.tick,
        }
    }
}

/// Counts frames over a sliding window. One frame is one published tick.
#[derive(Debug, Clone)]
pub struct FrameRate {
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl FrameRate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            self.stamps.pop_front();
        }
    }

    /// Frames seen in the window ending at `now`, per second. Zero for an
    /// empty window.
    pub fn fps(&self, now: Instant) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        let recent = self
            .stamps
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count();
        recent as f64 / secs
    }
}
