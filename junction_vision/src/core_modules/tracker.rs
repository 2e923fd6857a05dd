// THEORY:
// The `tracker` module gives the junction a memory of individual vehicles. It
// takes the stateless list of boxes for one direction in one frame and
// associates them with the vehicles it was already following, so that a speed
// can be derived from consecutive positions.
//
// Key architectural principles:
// 1.  **Object Persistence**: A `Track` represents one vehicle *over time*,
//     distinct from a `BoundingBox`, which is a single-frame snapshot.
// 2.  **Positional Association**: Detections are paired with tracks by index:
//     the i-th detection of the frame goes to the i-th live track in creation
//     order. There is no distance test. Tracks beyond the paired range are left
//     untouched and surplus detections are dropped. Downstream queue and speed
//     figures depend on this exact pairing, so it must not drift into a
//     nearest-neighbour match without the consumers agreeing.
// 3.  **Lifecycle Management**:
//     - **Birth**: only when the tracker holds no tracks at all, one track per
//       detection, in detection order.
//     - **Tracking**: a paired track takes the new centroid, resets its
//       disappearance counter and recomputes its speed.
//     - **Death**: on a frame with no detections every track ages by one; a
//       track whose counter exceeds `max_disappeared` is removed.
// 4.  **Identity**: ids come from a counter owned by the tracker instance and
//     are never reused.

use crate::core_modules::detection::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tunables for a `VehicleTracker`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// A track is removed once its disappearance counter exceeds this.
    pub max_disappeared: u32,
    /// Capacity of each track's centroid history.
    pub history_len: usize,
    /// Converts pixels moved per frame into the reported speed unit (30 fps / 100).
    pub speed_scale: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_disappeared: 5,
            history_len: 10,
            speed_scale: 30.0 / 100.0,
        }
    }
}

/// A vehicle followed across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Unique for the lifetime of the owning tracker.
    pub id: u64,
    pub centroid: (i32, i32),
    /// Most recent centroids, oldest first.
    pub positions: VecDeque<(i32, i32)>,
    /// Frames since this track was last paired with a detection.
    pub disappeared: u32,
    /// Scaled distance between the last two recorded centroids.
    pub speed: f64,
}

impl Track {
    fn new(id: u64, centroid: (i32, i32), history_len: usize) -> Self {
        let mut positions = VecDeque::with_capacity(history_len);
        positions.push_back(centroid);
        Self {
            id,
            centroid,
            positions,
            disappeared: 0,
            speed: 0.0,
        }
    }

    fn observe(&mut self, centroid: (i32, i32), config: &TrackerConfig) {
        self.centroid = centroid;
        self.positions.push_back(centroid);
        while self.positions.len() > config.history_len {
            self.positions.pop_front();
        }
        self.disappeared = 0;

        if self.positions.len() >= 2 {
            let (x1, y1) = self.positions[self.positions.len() - 2];
            let (x2, y2) = self.positions[self.positions.len() - 1];
            let dx = f64::from(x2) - f64::from(x1);
            let dy = f64::from(y2) - f64::from(y1);
            self.speed = dx.hypot(dy) * config.speed_scale;
        }
    }
}

/// A compact, serializable view of a track for publishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: u64,
    pub centroid: (i32, i32),
    pub speed: f64,
    pub disappeared: u32,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            centroid: track.centroid,
            speed: track.speed,
            disappeared: track.disappeared,
        }
    }
}

/// Follows the vehicles of one monitored direction.
pub struct VehicleTracker {
    /// Live tracks in creation order.
    tracks: Vec<Track>,
    next_id: u64,
    config: TrackerConfig,
}

impl Default for VehicleTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl VehicleTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            config,
        }
    }

    /// Feeds one frame of detections and returns the live track set.
    pub fn update(&mut self, detections: &[BoundingBox]) -> &[Track] {
        if detections.is_empty() {
            self.age_all();
            return &self.tracks;
        }

        let centroids: Vec<(i32, i32)> = detections.iter().map(BoundingBox::centroid).collect();

        if self.tracks.is_empty() {
            for centroid in centroids {
                let track = Track::new(self.next_id, centroid, self.config.history_len);
                self.tracks.push(track);
                self.next_id += 1;
            }
        } else {
            // Index pairing; unpaired tracks and detections are left alone.
            for (track, centroid) in self.tracks.iter_mut().zip(centroids) {
                track.observe(centroid, &self.config);
            }
        }

        debug_assert!(self.ids_are_unique(), "duplicate track id in live set");
        &self.tracks
    }

    fn age_all(&mut self) {
        let max_disappeared = self.config.max_disappeared;
        for track in &mut self.tracks {
            track.disappeared += 1;
        }
        self.tracks.retain(|t| t.disappeared <= max_disappeared);
    }

    fn ids_are_unique(&self) -> bool {
        self.tracks
            .windows(2)
            .all(|pair| pair[0].id < pair[1].id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bb(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    #[test]
    fn first_frame_creates_one_track_per_detection() {
        let mut tracker = VehicleTracker::default();
        let tracks = tracker.update(&[bb(0, 0, 10, 10), bb(20, 20, 40, 30)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, 0);
        assert_eq!(tracks[0].centroid, (5, 5));
        assert_eq!(tracks[1].id, 1);
        assert_eq!(tracks[1].centroid, (30, 25));
        for t in tracks {
            assert_eq!(t.disappeared, 0);
            assert_eq!(t.positions.len(), 1);
            assert_eq!(t.speed, 0.0);
        }
    }

    #[test]
    fn speed_is_scaled_distance_between_last_two_centroids() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10)]);
        let tracks = tracker.update(&[bb(2, 2, 12, 12)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].centroid, (7, 7));
        assert_relative_eq!(tracks[0].speed, 2.0_f64.sqrt() * 2.0 * 0.3, epsilon = 1e-12);
        assert_relative_eq!(tracks[0].speed, 0.8485, epsilon = 1e-4);
    }

    #[test]
    fn extreme_coordinates_neither_overflow_nor_wrap() {
        let mut tracker = VehicleTracker::default();
        let tracks = tracker.update(&[bb(2_000_000_000, 0, 2_100_000_000, 10)]);
        assert_eq!(tracks[0].centroid, (2_050_000_000, 5));

        // Jump from one end of the coordinate space to the other.
        tracker.update(&[bb(i32::MIN, i32::MIN, i32::MIN + 2, i32::MIN + 2)]);
        let tracks = tracker.update(&[bb(i32::MAX - 2, i32::MAX - 2, i32::MAX, i32::MAX)]);
        assert_eq!(tracks[0].centroid, (i32::MAX - 1, i32::MAX - 1));
        let span = f64::from(i32::MAX - 1) - f64::from(i32::MIN + 1);
        assert!(tracks[0].speed.is_finite());
        assert_relative_eq!(
            tracks[0].speed,
            span.hypot(span) * 0.3,
            max_relative = 1e-12
        );
    }

    #[test]
    fn six_empty_frames_remove_a_track() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10)]);
        for expected in 1..=5 {
            let tracks = tracker.update(&[]);
            assert_eq!(
                tracks.len(),
                1,
                "track should survive empty frame {expected}"
            );
            assert_eq!(tracks[0].disappeared, expected);
        }
        assert!(tracker.update(&[]).is_empty());
    }

    #[test]
    fn empty_frames_increment_every_counter_by_exactly_one() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10), bb(50, 50, 60, 60), bb(100, 0, 120, 20)]);
        let mut previous: Vec<u32> = tracker.tracks().iter().map(|t| t.disappeared).collect();
        for _ in 0..3 {
            let now: Vec<u32> = tracker.update(&[]).iter().map(|t| t.disappeared).collect();
            assert_eq!(now.len(), previous.len());
            for (p, n) in previous.iter().zip(&now) {
                assert_eq!(*n, p + 1);
            }
            previous = now;
        }
    }

    #[test]
    fn empty_frame_does_not_move_tracks() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10)]);
        tracker.update(&[bb(4, 0, 14, 10)]);
        let before = tracker.tracks()[0].clone();
        let after = tracker.update(&[])[0].clone();
        assert_eq!(after.centroid, before.centroid);
        assert_eq!(after.positions, before.positions);
        assert_eq!(after.speed, before.speed);
    }

    #[test]
    fn surplus_detections_are_dropped_once_tracks_exist() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10)]);
        let tracks = tracker.update(&[bb(2, 0, 12, 10), bb(100, 100, 110, 110)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].centroid, (7, 5));
    }

    #[test]
    fn unpaired_tracks_keep_their_state_when_detections_are_fewer() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10), bb(50, 50, 60, 60)]);
        tracker.update(&[]);
        let tracks = tracker.update(&[bb(2, 0, 12, 10)]);
        assert_eq!(tracks[0].disappeared, 0);
        // Second track neither ages nor resets in a non-empty frame.
        assert_eq!(tracks[1].disappeared, 1);
        assert_eq!(tracks[1].centroid, (55, 55));
    }

    #[test]
    fn pairing_follows_index_order_not_proximity() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10), bb(100, 0, 110, 10)]);
        // Detections arrive in reverse spatial order.
        let tracks = tracker.update(&[bb(100, 0, 110, 10), bb(0, 0, 10, 10)]);
        assert_eq!(tracks[0].id, 0);
        assert_eq!(tracks[0].centroid, (105, 5));
        assert_relative_eq!(tracks[0].speed, 100.0 * 0.3, epsilon = 1e-12);
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let mut tracker = VehicleTracker::default();
        for step in 0..15 {
            tracker.update(&[bb(step, 0, step + 10, 10)]);
        }
        let track = &tracker.tracks()[0];
        assert_eq!(track.positions.len(), 10);
        assert_eq!(track.positions.front(), Some(&(10, 5)));
        assert_eq!(track.positions.back(), Some(&(19, 5)));
    }

    #[test]
    fn ids_are_never_reused_after_removal() {
        let mut tracker = VehicleTracker::default();
        tracker.update(&[bb(0, 0, 10, 10), bb(20, 0, 30, 10)]);
        for _ in 0..6 {
            tracker.update(&[]);
        }
        assert!(tracker.is_empty());
        let tracks = tracker.update(&[bb(0, 0, 10, 10)]);
        assert_eq!(tracks[0].id, 2);
    }

    #[test]
    fn custom_threshold_is_respected() {
        let mut tracker = VehicleTracker::new(TrackerConfig {
            max_disappeared: 1,
            ..TrackerConfig::default()
        });
        tracker.update(&[bb(0, 0, 10, 10)]);
        assert_eq!(tracker.update(&[]).len(), 1);
        assert!(tracker.update(&[]).is_empty());
    }
}
