pub mod clock;
pub mod cursor;
pub mod engine;

pub use clock::RunClock;
pub use cursor::{RunCursor, Tick, TickFault};
pub use engine::{PlaybackEngine, TICK_INTERVAL};

use crate::core::Coordinate;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Upper bound on the configured base speed (km/h)
pub const MAX_SPEED_KMH: f64 = 30.0;

/// Lower bound on the spacing between device updates (ms)
pub const MIN_UPDATE_INTERVAL_MS: u64 = 100;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Running => "running",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    /// Average simulated speed
    pub base_speed_kmh: f64,
    /// Peak-to-peak amplitude of the slow speed oscillation
    pub speed_variance_kmh: f64,
    /// Bound on the random positional wander around the route
    pub route_offset_meters: f64,
    /// Number of passes over the route, 0 = forever
    pub loop_count: u32,
    /// Minimum spacing between position pushes to the device
    pub update_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_speed_kmh: 8.0,
            speed_variance_kmh: 1.0,
            route_offset_meters: 3.0,
            loop_count: 1,
            update_interval_ms: 1000,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.base_speed_kmh.is_finite()
            && self.base_speed_kmh > 0.0
            && self.base_speed_kmh <= MAX_SPEED_KMH)
        {
            return Err(EngineError::InvalidConfig(format!(
                "speed must be in (0, {}] km/h, got {}",
                MAX_SPEED_KMH, self.base_speed_kmh
            )));
        }
        if !(self.speed_variance_kmh.is_finite() && self.speed_variance_kmh >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "speed variance must be >= 0, got {}",
                self.speed_variance_kmh
            )));
        }
        if !(self.route_offset_meters.is_finite() && self.route_offset_meters >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "route offset must be >= 0, got {}",
                self.route_offset_meters
            )));
        }
        if self.update_interval_ms < MIN_UPDATE_INTERVAL_MS {
            return Err(EngineError::InvalidConfig(format!(
                "update interval must be at least {} ms, got {}",
                MIN_UPDATE_INTERVAL_MS, self.update_interval_ms
            )));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub current_loop: u32,
    pub point_index: usize,
    pub total_points: usize,
    pub segment_progress: f64,
    pub current_position: Option<Coordinate>,
    pub current_speed_kmh: f64,
    pub total_distance_meters: f64,
    pub elapsed_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlaybackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_ranges() {
        let bad = [
            PlaybackConfig { base_speed_kmh: 0.0, ..Default::default() },
            PlaybackConfig { base_speed_kmh: 30.5, ..Default::default() },
            PlaybackConfig { base_speed_kmh: f64::NAN, ..Default::default() },
            PlaybackConfig { speed_variance_kmh: -1.0, ..Default::default() },
            PlaybackConfig { route_offset_meters: -0.1, ..Default::default() },
            PlaybackConfig { update_interval_ms: 99, ..Default::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(EngineError::InvalidConfig(_))),
                "{:?} should be rejected",
                config
            );
        }

        let edge = PlaybackConfig {
            base_speed_kmh: 30.0,
            speed_variance_kmh: 0.0,
            route_offset_meters: 0.0,
            loop_count: 0,
            update_interval_ms: 100,
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_config_json_uses_camel_case_and_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"baseSpeedKmh": 12.5, "loopCount": 3}"#).unwrap();
        assert_eq!(config.base_speed_kmh, 12.5);
        assert_eq!(config.loop_count, 3);
        assert_eq!(config.update_interval_ms, 1000);

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("routeOffsetMeters").is_some());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PlaybackState::Paused.to_string(), "paused");
        assert_eq!(serde_json::to_string(&PlaybackState::Running).unwrap(), "\"running\"");
    }
}
