// THEORY:
// All tunable numbers of the junction live here instead of as loose constants.
// A `JunctionConfig` is built once at startup (from YAML, from the environment
// or from defaults), validated, and then handed by value to the pieces that
// need it: the trackers get a `TrackerConfig`, the controller a `SignalTiming`,
// the runtime the tick cadence and detection timeout.

use crate::core_modules::controller::SignalTiming;
use crate::core_modules::detection::DetectionFilter;
use crate::core_modules::tracker::TrackerConfig;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a YAML config file.
pub const CONFIG_PATH_ENV: &str = "JV_CONFIG";

/// Parameters of the random stand-in detector used when no camera is wired up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Upper bound (inclusive) of boxes produced per frame.
    pub max_vehicles: usize,
    /// Fixed seed for reproducible runs. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_width: 800,
            frame_height: 300,
            max_vehicles: 5,
            seed: None,
        }
    }
}

/// Top-level configuration for one monitored junction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JunctionConfig {
    /// Period of the pipeline tick in milliseconds.
    pub tick_interval_ms: u64,
    /// Upper bound on a single direction's detection call.
    pub detection_timeout_ms: u64,
    pub direction_a_label: String,
    pub direction_b_label: String,
    pub tracker: TrackerConfig,
    pub timing: SignalTiming,
    pub filter: DetectionFilter,
    pub simulation: SimulationConfig,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            detection_timeout_ms: 1500,
            direction_a_label: "N→S".to_string(),
            direction_b_label: "S→N".to_string(),
            tracker: TrackerConfig::default(),
            timing: SignalTiming::default(),
            filter: DetectionFilter::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl JunctionConfig {
    /// Reads and validates a YAML config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: JunctionConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `JV_CONFIG`, or returns the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.tracker.history_len == 0 {
            return Err(ConfigError::Invalid("tracker.history_len must be positive".into()));
        }
        let t = &self.timing;
        if !(t.min_green_secs > 0.0 && t.min_green_secs <= t.max_green_secs) {
            return Err(ConfigError::Invalid(format!(
                "timing requires 0 < min_green_secs <= max_green_secs (got {} and {})",
                t.min_green_secs, t.max_green_secs
            )));
        }
        if t.default_green_secs < t.min_green_secs || t.default_green_secs > t.max_green_secs {
            return Err(ConfigError::Invalid(format!(
                "default_green_secs {} lies outside [{}, {}]",
                t.default_green_secs, t.min_green_secs, t.max_green_secs
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }
}
