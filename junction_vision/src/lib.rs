// THEORY:
// This file is the main entry point for the `junction_vision` library crate.
// It exposes the adaptive signal core as a small public surface: a
// `JunctionPipeline` that turns two directions' detections into an immutable
// `JunctionSnapshot`, a `MetricsStore` through which snapshots are published
// and read, and a `SignalRuntime` that drives both on a fixed cadence.
//
// The internal pieces (`core_modules`) stay public for tests and tooling, but
// collaborators such as HTTP handlers only need `process_tick` on the writer
// side and `read_state` on the reader side.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod runtime;

pub use config::JunctionConfig;
pub use core_modules::controller::{Direction, SignalPhase, Transition};
pub use core_modules::detection::{BoundingBox, Detection, DetectionSource, FeedKind};
pub use core_modules::metrics_store::MetricsStore;
pub use error::{ConfigError, DetectionError};
pub use pipeline::{FeedStatus, JunctionPipeline, JunctionSnapshot};
pub use runtime::SignalRuntime;
