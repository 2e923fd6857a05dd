// THEORY:
// The `detection` module is the boundary between the junction core and whatever
// object detector looks at the cameras. The core never sees pixels; it sees a
// list of axis-aligned boxes per direction per tick.
//
// Key architectural principles:
// 1.  **Dumb Data**: `BoundingBox` and `Detection` are plain values produced
//     fresh every frame and never retained by the core.
// 2.  **Vehicle Filter**: Detectors report many classes. `DetectionFilter`
//     reduces a raw detection list to the vehicle boxes the tracker consumes,
//     discarding low-confidence and malformed boxes on the way.
// 3.  **Pluggable Source**: `DetectionSource` is the seam for a real model. The
//     runtime holds one per direction and bounds every call with a timeout.
// 4.  **Simulation**: `SimulatedDetectionSource` stands in for a missing camera
//     with random boxes so the rest of the system can run end-to-end.

use crate::config::SimulationConfig;
use crate::error::DetectionError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Returns `None` for empty or inverted rectangles.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Integer midpoint, rounded toward negative infinity. Summed in `i64` so
    /// boxes near the `i32` limits cannot overflow.
    pub fn centroid(&self) -> (i32, i32) {
        (midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }
}

// The floor of the mean of two i32 values always lies between them.
fn midpoint(lo: i32, hi: i32) -> i32 {
    (i64::from(lo) + i64::from(hi)).div_euclid(2) as i32
}

/// One raw detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
}

/// Selects vehicle detections from a raw detector output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    /// COCO ids: 2=car, 3=motorcycle, 5=bus, 7=truck.
    pub vehicle_class_ids: Vec<u32>,
    /// Detections must score strictly above this to be kept.
    pub min_confidence: f32,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            vehicle_class_ids: vec![2, 3, 5, 7],
            min_confidence: 0.3,
        }
    }
}

impl DetectionFilter {
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.bbox.is_well_formed()
            && detection.confidence > self.min_confidence
            && self.vehicle_class_ids.contains(&detection.class_id)
    }

    /// Keeps accepted detections in their original order.
    pub fn vehicle_boxes(&self, detections: &[Detection]) -> Vec<BoundingBox> {
        detections
            .iter()
            .filter(|d| self.accepts(d))
            .map(|d| d.bbox)
            .collect()
    }
}

/// Whether a direction's detections came from a real detector or a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Live,
    Simulated,
}

/// A per-direction producer of detections, typically a camera plus a model.
#[async_trait]
pub trait DetectionSource: Send {
    fn kind(&self) -> FeedKind;

    async fn detect(&mut self) -> Result<Vec<Detection>, DetectionError>;
}

/// Random vehicles scattered over a blank frame.
pub struct SimulatedDetectionSource {
    config: SimulationConfig,
    rng: StdRng,
}

impl SimulatedDetectionSource {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Like `new`, but derives an independent stream for a second direction
    /// from the same configured seed.
    pub fn for_stream(config: SimulationConfig, stream: u64) -> Self {
        let mut config = config;
        config.seed = config.seed.map(|s| s.wrapping_add(stream));
        Self::new(config)
    }

    pub fn generate(&mut self) -> Vec<Detection> {
        let width = self.config.frame_width as i32;
        let height = self.config.frame_height as i32;
        let count = self.rng.gen_range(0..=self.config.max_vehicles);

        (0..count)
            .map(|_| {
                let x1 = self.rng.gen_range(0..=(width - 100).max(0));
                let y1 = self.rng.gen_range(0..=(height - 100).max(0));
                let x2 = x1 + self.rng.gen_range(50..=150);
                let y2 = y1 + self.rng.gen_range(30..=80);
                Detection {
                    bbox: BoundingBox { x1, y1, x2, y2 },
                    class_id: 2,
                    confidence: 1.0,
                }
            })
            .collect()
    }
}

#[async_trait]
impl DetectionSource for SimulatedDetectionSource {
    fn kind(&self) -> FeedKind {
        FeedKind::Simulated
    }

    async fn detect(&mut self) -> Result<Vec<Detection>, DetectionError> {
        Ok(self.generate())
    }
}
