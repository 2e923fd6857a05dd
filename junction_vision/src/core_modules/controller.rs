// THEORY:
// The `controller` module is the decision layer of the junction. It holds the
// two-phase signal state and, once per tick, looks at both directions' latest
// metrics to decide whether the green should move.
//
// Key architectural principles:
// 1.  **Two States**: exactly one of `DirectionAGreen`/`DirectionBGreen` holds at
//     any instant. The enum makes any third state unrepresentable.
// 2.  **Transition Rules** (in priority order):
//     - *Early release*: the green side has fallen below the congestion
//       threshold while the red side has reached it. Switch now.
//     - *Timed switch*: the green has lasted its allotted duration. Switch.
//     - Otherwise hold.
// 3.  **Demand-Proportional Timing**: on every switch the new green duration is
//     `min + ratio * (max - min)` where `ratio` is the incoming green side's
//     share of total demand, clamped to `[min, max]`. Zero total demand falls
//     back to the default duration.
// 4.  **Injected Clock**: every time-dependent call takes `now` so ticks can be
//     replayed deterministically.

use crate::core_modules::aggregator::DirectionalMetrics;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Lower bound on the speed used in the demand ratio.
pub const DEMAND_SPEED_FLOOR: f64 = 0.1;

/// One of the two monitored approaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    A,
    B,
}

impl Direction {
    pub fn other(self) -> Self {
        match self {
            Direction::A => Direction::B,
            Direction::B => Direction::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPhase {
    DirectionAGreen,
    DirectionBGreen,
}

impl SignalPhase {
    pub fn green(self) -> Direction {
        match self {
            SignalPhase::DirectionAGreen => Direction::A,
            SignalPhase::DirectionBGreen => Direction::B,
        }
    }

    pub fn with_green(direction: Direction) -> Self {
        match direction {
            Direction::A => SignalPhase::DirectionAGreen,
            Direction::B => SignalPhase::DirectionBGreen,
        }
    }

    pub fn next(self) -> Self {
        Self::with_green(self.green().other())
    }
}

/// What caused the most recent phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    EarlyRelease,
    Timed,
}

/// Timing constants of the controller, all in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalTiming {
    pub min_green_secs: f64,
    pub max_green_secs: f64,
    /// Used at startup and whenever neither direction shows demand.
    pub default_green_secs: f64,
    /// Vehicle count at which a direction counts as congested.
    pub congestion_threshold: usize,
    pub initial_phase: SignalPhase,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            min_green_secs: 10.0,
            max_green_secs: 45.0,
            default_green_secs: 20.0,
            congestion_threshold: 3,
            initial_phase: SignalPhase::DirectionAGreen,
        }
    }
}

impl SignalTiming {
    /// Higher queue or lower speed means higher demand.
    pub fn demand(metrics: &DirectionalMetrics) -> f64 {
        metrics.queue_length as f64 / metrics.avg_speed.max(DEMAND_SPEED_FLOOR)
    }

    /// Green duration for `green` given both directions' metrics.
    pub fn green_duration_for(
        &self,
        green: Direction,
        a: &DirectionalMetrics,
        b: &DirectionalMetrics,
    ) -> f64 {
        let demand_a = Self::demand(a);
        let demand_b = Self::demand(b);
        let total = demand_a + demand_b;

        if total <= 0.0 {
            return self.default_green_secs;
        }

        let share = match green {
            Direction::A => demand_a,
            Direction::B => demand_b,
        };
        let ratio = share / total;
        let duration = self.min_green_secs + ratio * (self.max_green_secs - self.min_green_secs);
        // Not `clamp`: disordered or NaN bounds must degrade, not panic.
        duration.max(self.min_green_secs).min(self.max_green_secs)
    }

    /// `true` when `min_green_secs <= max_green_secs` and neither is NaN.
    pub fn bounds_are_ordered(&self) -> bool {
        self.min_green_secs <= self.max_green_secs
    }
}

/// The controller's full mutable state.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub phase: SignalPhase,
    pub phase_started_at: Instant,
    pub green_duration_secs: f64,
    pub direction_a: DirectionalMetrics,
    pub direction_b: DirectionalMetrics,
    /// Set only on the tick that switched the phase.
    pub last_transition: Option<Transition>,
}

impl ControllerState {
    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.phase_started_at).as_secs_f64()
    }

    pub fn time_remaining_secs(&self, now: Instant) -> f64 {
        (self.green_duration_secs - self.elapsed_secs(now)).max(0.0)
    }

    pub fn metrics(&self, direction: Direction) -> &DirectionalMetrics {
        match direction {
            Direction::A => &self.direction_a,
            Direction::B => &self.direction_b,
        }
    }
}

/// Two-phase adaptive signal controller.
pub struct AdaptiveSignalController {
    timing: SignalTiming,
    state: ControllerState,
}

impl AdaptiveSignalController {
    pub fn new(timing: SignalTiming, now: Instant) -> Self {
        if !timing.bounds_are_ordered() {
            warn!(
                min = timing.min_green_secs,
                max = timing.max_green_secs,
                "green bounds are disordered, durations will pin to the maximum"
            );
        }
        let state = ControllerState {
            phase: timing.initial_phase,
            phase_started_at: now,
            green_duration_secs: timing.default_green_secs,
            direction_a: DirectionalMetrics::default(),
            direction_b: DirectionalMetrics::default(),
            last_transition: None,
        };
        Self { timing, state }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    /// Records this tick's metrics and applies at most one phase change.
    pub fn update(
        &mut self,
        a: DirectionalMetrics,
        b: DirectionalMetrics,
        now: Instant,
    ) -> Option<Transition> {
        self.state.direction_a = a;
        self.state.direction_b = b;

        let transition = self.evaluate(now);
        if let Some(kind) = transition {
            self.switch(kind, now);
        }
        self.state.last_transition = transition;
        transition
    }

    fn evaluate(&self, now: Instant) -> Option<Transition> {
        let green = self.state.phase.green();
        let threshold = self.timing.congestion_threshold;
        let green_count = self.state.metrics(green).vehicle_count;
        let red_count = self.state.metrics(green.other()).vehicle_count;

        if green_count < threshold && red_count >= threshold {
            Some(Transition::EarlyRelease)
        } else if self.state.elapsed_secs(now) >= self.state.green_duration_secs {
            Some(Transition::Timed)
        } else {
            None
        }
    }

    fn switch(&mut self, kind: Transition, now: Instant) {
        let elapsed = self.state.elapsed_secs(now);
        let next = self.state.phase.next();
        let duration = self.timing.green_duration_for(
            next.green(),
            &self.state.direction_a,
            &self.state.direction_b,
        );
        debug_assert!(
            !self.timing.bounds_are_ordered()
                || (duration >= self.timing.min_green_secs
                    && duration <= self.timing.max_green_secs),
            "green duration {duration} escaped its bounds"
        );

        info!(
            from = ?self.state.phase,
            to = ?next,
            cause = ?kind,
            held_secs = elapsed,
            green_secs = duration,
            "signal phase switched"
        );

        self.state.phase = next;
        self.state.phase_started_at = now;
        self.state.green_duration_secs = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn metrics(queue_length: usize, avg_speed: f64, vehicle_count: usize) -> DirectionalMetrics {
        DirectionalMetrics {
            queue_length,
            avg_speed,
            vehicle_count,
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn proportional_timing_matches_worked_example() {
        let timing = SignalTiming::default();
        let a = metrics(8, 2.0, 0);
        let b = metrics(2, 1.0, 0);
        let duration = timing.green_duration_for(Direction::A, &a, &b);
        assert_relative_eq!(duration, 10.0 + (4.0 / 6.0) * 35.0, epsilon = 1e-9);
        assert_relative_eq!(duration, 33.333, epsilon = 1e-3);
        let other = timing.green_duration_for(Direction::B, &a, &b);
        assert_relative_eq!(other, 10.0 + (2.0 / 6.0) * 35.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_demand_uses_default_duration() {
        let timing = SignalTiming::default();
        let quiet = metrics(0, 1.0, 4);
        assert_eq!(
            timing.green_duration_for(Direction::A, &quiet, &quiet),
            20.0
        );
        assert_eq!(
            timing.green_duration_for(Direction::B, &quiet, &quiet),
            20.0
        );
    }

    #[test]
    fn durations_stay_within_bounds() {
        let timing = SignalTiming::default();
        let cases = [
            (metrics(50, 0.0, 0), metrics(0, 1.0, 0)),
            (metrics(0, 1.0, 0), metrics(50, 0.01, 0)),
            (metrics(1, 100.0, 0), metrics(1, 0.05, 0)),
            (metrics(3, 1.0, 0), metrics(3, 1.0, 0)),
        ];
        for (a, b) in cases {
            for green in [Direction::A, Direction::B] {
                let d = timing.green_duration_for(green, &a, &b);
                assert!((10.0..=45.0).contains(&d), "{d} out of range");
            }
        }
    }

    #[test]
    fn speed_floor_prevents_division_blowup() {
        let a = metrics(2, 0.0, 0);
        assert_relative_eq!(SignalTiming::demand(&a), 20.0);
    }

    #[test]
    fn holds_phase_before_green_expires() {
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        let transition = controller.update(metrics(4, 1.0, 4), metrics(4, 1.0, 4), t0 + secs(5.0));
        assert_eq!(transition, None);
        assert_eq!(controller.state().phase, SignalPhase::DirectionAGreen);
        assert_relative_eq!(
            controller.state().time_remaining_secs(t0 + secs(5.0)),
            15.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn switches_when_green_expires_and_recomputes_duration() {
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        let now = t0 + secs(20.0);
        let transition = controller.update(metrics(8, 2.0, 4), metrics(2, 1.0, 4), now);
        assert_eq!(transition, Some(Transition::Timed));
        let state = controller.state();
        assert_eq!(state.phase, SignalPhase::DirectionBGreen);
        assert_eq!(state.phase_started_at, now);
        assert_relative_eq!(
            state.green_duration_secs,
            10.0 + (2.0 / 6.0) * 35.0,
            epsilon = 1e-9
        );
        assert_eq!(state.last_transition, Some(Transition::Timed));
    }

    #[test]
    fn early_release_ignores_elapsed_time() {
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        let now = t0 + secs(1.0);
        let transition = controller.update(metrics(1, 1.0, 2), metrics(5, 1.0, 3), now);
        assert_eq!(transition, Some(Transition::EarlyRelease));
        assert_eq!(controller.state().phase, SignalPhase::DirectionBGreen);
        assert_relative_eq!(
            controller.state().green_duration_secs,
            10.0 + (5.0 / 6.0) * 35.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn no_early_release_when_both_sides_congested() {
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        let transition = controller.update(metrics(5, 1.0, 3), metrics(5, 1.0, 9), t0 + secs(1.0));
        assert_eq!(transition, None);
    }

    #[test]
    fn early_release_works_from_direction_b() {
        let t0 = Instant::now();
        let timing = SignalTiming {
            initial_phase: SignalPhase::DirectionBGreen,
            ..SignalTiming::default()
        };
        let mut controller = AdaptiveSignalController::new(timing, t0);
        let transition = controller.update(metrics(3, 1.0, 3), metrics(0, 1.0, 0), t0 + secs(0.5));
        assert_eq!(transition, Some(Transition::EarlyRelease));
        assert_eq!(controller.state().phase, SignalPhase::DirectionAGreen);
    }

    #[test]
    fn last_transition_clears_on_quiet_tick() {
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        controller.update(metrics(0, 1.0, 0), metrics(0, 1.0, 0), t0 + secs(21.0));
        assert_eq!(controller.state().last_transition, Some(Transition::Timed));
        controller.update(metrics(0, 1.0, 0), metrics(0, 1.0, 0), t0 + secs(22.0));
        assert_eq!(controller.state().last_transition, None);
    }

    #[test]
    fn time_remaining_never_negative() {
        let t0 = Instant::now();
        let controller = AdaptiveSignalController::new(SignalTiming::default(), t0);
        assert_eq!(
            controller.state().time_remaining_secs(t0 + secs(100.0)),
            0.0
        );
    }

    #[test]
    fn disordered_bounds_pin_to_the_maximum_without_panicking() {
        let timing = SignalTiming {
            min_green_secs: 50.0,
            max_green_secs: 40.0,
            default_green_secs: 45.0,
            ..SignalTiming::default()
        };
        assert!(!timing.bounds_are_ordered());
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(timing, t0);
        let busy = metrics(4, 1.0, 4);
        let transition = controller.update(busy, busy, t0 + secs(100.0));
        assert_eq!(transition, Some(Transition::Timed));
        assert_eq!(controller.state().green_duration_secs, 40.0);
    }

    #[test]
    fn nan_bound_does_not_panic() {
        let timing = SignalTiming {
            min_green_secs: f64::NAN,
            ..SignalTiming::default()
        };
        let t0 = Instant::now();
        let mut controller = AdaptiveSignalController::new(timing, t0);
        let busy = metrics(4, 1.0, 4);
        assert_eq!(
            controller.update(busy, busy, t0 + secs(100.0)),
            Some(Transition::Timed)
        );
        assert_eq!(controller.state().green_duration_secs, 45.0);
    }
}
