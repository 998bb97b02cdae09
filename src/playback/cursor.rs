//! Per-tick route stepping
//!
//! [`RunCursor`] holds everything a run accumulates (segment index, progress,
//! loop count, distance, positional jitter) and advances it by one fixed
//! tick at a time. It knows nothing about timers, locks or devices, so the
//! engine can drive it under its lock and tests can drive it directly.

use crate::core::{distance, interpolate, Coordinate};
use crate::playback::PlaybackConfig;
use crate::route::{Route, DEGENERATE_SEGMENT_METERS};
use std::time::Duration;
use thiserror::Error;

/// Floor for the oscillating speed so motion never stalls or reverses
pub const MIN_SPEED_KMH: f64 = 0.5;

/// Steps at or above this are not added to the travelled distance
pub const MAX_PLAUSIBLE_STEP_METERS: f64 = 50.0;

/// How often a new jitter target is drawn
pub const OFFSET_REFRESH: Duration = Duration::from_secs(3);

/// Weight kept from the previous jitter offset when smoothing
const OFFSET_SMOOTHING: f64 = 0.7;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Final loop finished; the run is over
    Completed,
    /// Reached the end of the route this tick, nothing to report
    RouteEnd,
    /// New position to report
    Moved(Coordinate),
}

/// A tick produced a state that cannot be reported
#[derive(Debug, Clone, PartialEq, Error)]
#[error("tick produced a non-finite position on segment {segment}")]
pub struct TickFault {
    pub segment: usize,
}

/// Instantaneous speed: slow sine around the base speed, floored
pub fn instantaneous_speed(config: &PlaybackConfig, elapsed: Duration) -> f64 {
    let swing = config.speed_variance_kmh * 0.5 * (0.5 * elapsed.as_secs_f64()).sin();
    (config.base_speed_kmh + swing).max(MIN_SPEED_KMH)
}

/// Slowly varying offset around the route, in meters
#[derive(Debug, Clone, Default)]
struct OffsetJitter {
    north_m: f64,
    east_m: f64,
    last_refresh: Duration,
}

impl OffsetJitter {
    fn sample(&mut self, max_m: f64, elapsed: Duration, rng: &mut fastrand::Rng) -> (f64, f64) {
        if max_m <= 0.0 {
            *self = Self { last_refresh: self.last_refresh, ..Self::default() };
            return (0.0, 0.0);
        }

        if elapsed.saturating_sub(self.last_refresh) > OFFSET_REFRESH {
            let target_north = (rng.f64() * 2.0 - 1.0) * max_m;
            let target_east = (rng.f64() * 2.0 - 1.0) * max_m;
            self.north_m = self.north_m * OFFSET_SMOOTHING + target_north * (1.0 - OFFSET_SMOOTHING);
            self.east_m = self.east_m * OFFSET_SMOOTHING + target_east * (1.0 - OFFSET_SMOOTHING);
            self.last_refresh = elapsed;
        }

        // a lowered bound takes effect immediately
        (self.north_m.clamp(-max_m, max_m), self.east_m.clamp(-max_m, max_m))
    }
}

/// Run-local traversal state
#[derive(Debug, Clone)]
pub struct RunCursor {
    /// Index of the segment being walked
    pub point_index: usize,
    /// Fraction of the current segment covered, in `[0, 1)`
    pub progress: f64,
    /// 1-based pass over the route
    pub current_loop: u32,
    pub total_distance: f64,
    pub speed_kmh: f64,
    /// Last reported position, offset included
    pub position: Option<Coordinate>,
    /// Where distance accounting last left off
    anchor: Coordinate,
    jitter: OffsetJitter,
    /// Offset applied to the last reported position, (north, east) meters
    applied_offset: (f64, f64),
}

impl RunCursor {
    pub fn new(start: Coordinate) -> Self {
        Self {
            point_index: 0,
            progress: 0.0,
            current_loop: 1,
            total_distance: 0.0,
            speed_kmh: 0.0,
            position: None,
            anchor: start,
            jitter: OffsetJitter::default(),
            applied_offset: (0.0, 0.0),
        }
    }

    /// Jump back to the start of a (possibly different) route, keeping counters
    pub fn restart_at(&mut self, start: Coordinate) {
        self.point_index = 0;
        self.progress = 0.0;
        self.anchor = start.offset_meters(self.applied_offset.0, self.applied_offset.1);
    }

    /// Advance by one tick of length `tick`
    ///
    /// `elapsed` is the active run time and drives the speed oscillation and
    /// jitter refresh. On error the cursor is left exactly as it was.
    pub fn advance(
        &mut self,
        route: &Route,
        config: &PlaybackConfig,
        elapsed: Duration,
        tick: Duration,
        rng: &mut fastrand::Rng,
    ) -> Result<Tick, TickFault> {
        let mut next = self.clone();
        let outcome = next.step(route, config, elapsed, tick, rng)?;
        *self = next;
        Ok(outcome)
    }

    fn step(
        &mut self,
        route: &Route,
        config: &PlaybackConfig,
        elapsed: Duration,
        tick: Duration,
        rng: &mut fastrand::Rng,
    ) -> Result<Tick, TickFault> {
        let segments = route.segment_count();

        if self.point_index >= segments {
            if config.loop_count > 0 && self.current_loop >= config.loop_count {
                return Ok(Tick::Completed);
            }
            self.current_loop += 1;
            self.restart_at(route.first());
        }

        self.speed_kmh = instantaneous_speed(config, elapsed);

        let Some(segment_length) = self.skip_degenerate(route) else {
            return Ok(Tick::RouteEnd);
        };

        let travel_m = self.speed_kmh / 3.6 * tick.as_secs_f64();
        self.progress += travel_m / segment_length;

        while self.progress >= 1.0 && self.point_index < segments {
            self.close_segment(route);
            self.progress -= 1.0;
            if self.skip_degenerate(route).is_none() {
                break;
            }
        }

        let Some((start, end)) = route.segment(self.point_index) else {
            return Ok(Tick::RouteEnd);
        };

        let on_route = interpolate(start, end, self.progress);
        let (north_m, east_m) = self.jitter.sample(config.route_offset_meters, elapsed, rng);
        let position = on_route.offset_meters(north_m, east_m);
        if !position.is_finite() {
            return Err(TickFault { segment: self.point_index });
        }
        self.applied_offset = (north_m, east_m);

        let step = distance(self.anchor, position);
        if step < MAX_PLAUSIBLE_STEP_METERS {
            self.total_distance += step;
        }
        self.anchor = position;
        self.position = Some(position);

        Ok(Tick::Moved(position))
    }

    /// Account for the rest of the current segment and move onto the next
    ///
    /// The segment end is measured in the same offset frame as the reported
    /// positions, so jitter does not add a detour at every vertex.
    fn close_segment(&mut self, route: &Route) {
        if let Some((_, end)) = route.segment(self.point_index) {
            let end = end.offset_meters(self.applied_offset.0, self.applied_offset.1);
            self.total_distance += distance(self.anchor, end);
            self.anchor = end;
        }
        self.point_index += 1;
    }

    /// Step over near-zero segments; returns the current segment's length,
    /// or `None` once the route is exhausted
    fn skip_degenerate(&mut self, route: &Route) -> Option<f64> {
        loop {
            route.segment(self.point_index)?;
            let length = route.segment_length(self.point_index);
            if length >= DEGENERATE_SEGMENT_METERS {
                return Some(length);
            }
            self.close_segment(route);
            self.progress = 0.0;
        }
    }
}
