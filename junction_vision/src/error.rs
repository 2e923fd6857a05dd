// THEORY:
// Errors in this crate are deliberately few. The control core itself never
// fails: degenerate numbers are floored and missing detections become an empty
// frame. What remains are the two places where the outside world can hand us
// something unusable, a detector that does not answer and a configuration file
// that does not parse or does not make sense.

use std::time::Duration;
use thiserror::Error;

/// Why a direction produced no detections for a tick.
///
/// Both variants are recovered locally by the runtime: the tick proceeds with
/// an empty detection set and the direction is reported as degraded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("detection source unavailable: {0}")]
    Unavailable(String),

    #[error("detection source did not answer within {0:?}")]
    Timeout(Duration),
}

/// Errors raised while loading or validating a `JunctionConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
