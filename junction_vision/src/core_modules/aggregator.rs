// THEORY:
// The aggregator collapses one direction's frame into the three numbers the
// signal controller reasons about. It owns no state; every tick's metrics are
// derived from that tick's raw detection count and the tracker's live set.

use crate::core_modules::tracker::Track;
use serde::Serialize;

/// Reported when no track in the frame has moved yet. Keeps the demand ratio
/// `queue_length / avg_speed` finite.
pub const SPEED_FLOOR: f64 = 1.0;

/// Per-direction demand inputs for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalMetrics {
    /// Raw vehicle detections in the current frame, not the track count.
    pub queue_length: usize,
    /// Mean of strictly positive track speeds, or `SPEED_FLOOR`.
    pub avg_speed: f64,
    /// Live tracks, including ones coasting without a detection.
    pub vehicle_count: usize,
}

impl Default for DirectionalMetrics {
    fn default() -> Self {
        Self {
            queue_length: 0,
            avg_speed: SPEED_FLOOR,
            vehicle_count: 0,
        }
    }
}

/// Reduces one direction's frame to `DirectionalMetrics`.
pub fn aggregate(detection_count: usize, tracks: &[Track]) -> DirectionalMetrics {
    let (sum, moving) = tracks
        .iter()
        .map(|t| t.speed)
        .filter(|s| *s > 0.0)
        .fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));

    let avg_speed = if moving == 0 { SPEED_FLOOR } else { sum / moving as f64 };

    DirectionalMetrics {
        queue_length: detection_count,
        avg_speed,
        vehicle_count: tracks.len(),
    }
}
