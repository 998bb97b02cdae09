use std::time::Duration;
use tokio::time::Instant;

/// Wall clock for one run that leaves out paused stretches
///
/// Instants are passed in rather than read so the arithmetic can be driven
/// from tests; the engine feeds it `tokio::time::Instant::now()`.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started: Instant,
    /// Sum of completed pauses
    paused_total: Duration,
    /// Set while paused or after the run ended
    frozen_at: Option<Instant>,
}

impl RunClock {
    pub fn start(now: Instant) -> Self {
        Self {
            started: now,
            paused_total: Duration::ZERO,
            frozen_at: None,
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.frozen_at.is_none() {
            self.frozen_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(at) = self.frozen_at.take() {
            self.paused_total += now.saturating_duration_since(at);
        }
    }

    /// Stop the clock for good
    pub fn finish(&mut self, now: Instant) {
        self.pause(now);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_at.is_some()
    }

    /// Active (unpaused) run time
    pub fn elapsed(&self, now: Instant) -> Duration {
        let end = self.frozen_at.unwrap_or(now);
        end.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_excludes_pauses() {
        let t0 = Instant::now();
        let mut clock = RunClock::start(t0);

        assert_eq!(clock.elapsed(t0 + Duration::from_secs(5)), Duration::from_secs(5));

        clock.pause(t0 + Duration::from_secs(5));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(65)), Duration::from_secs(5));
        assert!(clock.is_frozen());

        clock.resume(t0 + Duration::from_secs(65));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(70)), Duration::from_secs(10));
    }

    #[test]
    fn test_repeated_pause_and_resume() {
        let t0 = Instant::now();
        let mut clock = RunClock::start(t0);

        clock.pause(t0 + Duration::from_secs(1));
        // second pause keeps the first freeze point
        clock.pause(t0 + Duration::from_secs(3));
        clock.resume(t0 + Duration::from_secs(4));
        // resume without a pause is ignored
        clock.resume(t0 + Duration::from_secs(6));

        assert_eq!(clock.elapsed(t0 + Duration::from_secs(10)), Duration::from_secs(7));
    }

    #[test]
    fn test_finish_freezes() {
        let t0 = Instant::now();
        let mut clock = RunClock::start(t0);
        clock.finish(t0 + Duration::from_secs(30));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(90)), Duration::from_secs(30));
    }
}
