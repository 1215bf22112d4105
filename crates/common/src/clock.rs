//! Clock and tick scheduling utilities.
//!
//! Two concerns live here:
//! - `RecordingClock`: a monotonic epoch captured when a recording starts.
//! - `TickSource`: the frame scheduler. Anything that would otherwise poll
//!   "once per display refresh" (the playback position, the export frame
//!   loop) asks a tick source for the next tick instead, so tests can drive
//!   frame timing deterministically.

use std::time::{Duration, Instant};

use crate::config::PlaybackSettings;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

/// Convert a position in seconds to whole microseconds.
///
/// Negative and non-finite positions map to zero.
pub fn secs_to_micros(secs: f64) -> i64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1_000_000.0) as i64
}

/// One scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Sequence number, starting at 0.
    pub index: u64,
    /// Time elapsed since the previous tick, or since the ticker was created.
    pub elapsed: Duration,
}

/// Source of frame ticks.
#[async_trait::async_trait]
pub trait TickSource: Send {
    /// Suspend until the next tick is due.
    async fn next_tick(&mut self) -> Tick;
}

/// Ticks at a display-like refresh rate, measuring real elapsed time.
pub struct DisplayTicker {
    period: Duration,
    interval: tokio::time::Interval,
    last: Instant,
    index: u64,
}

impl DisplayTicker {
    /// Create a ticker targeting the given Hz rate.
    pub fn new(refresh_hz: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / refresh_hz.max(1) as u64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self {
            period,
            interval,
            last: Instant::now(),
            index: 0,
        }
    }

    /// Tick at the configured display refresh rate.
    pub fn for_playback(settings: &PlaybackSettings) -> Self {
        Self::new(settings.refresh_hz)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait::async_trait]
impl TickSource for DisplayTicker {
    async fn next_tick(&mut self) -> Tick {
        self.interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;

        let tick = Tick {
            index: self.index,
            elapsed,
        };
        self.index += 1;
        tick
    }
}

/// Ticks as fast as the consumer asks, reporting a constant step.
///
/// Used for offline export (one tick per source frame) and in tests.
#[derive(Debug, Clone)]
pub struct FixedStepTicker {
    step: Duration,
    index: u64,
}

impl FixedStepTicker {
    pub fn new(step: Duration) -> Self {
        Self { step, index: 0 }
    }

    /// A ticker stepping once per frame at the given rate.
    pub fn per_frame(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Self::new(Duration::from_secs_f64(1.0 / fps))
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

#[async_trait::async_trait]
impl TickSource for FixedStepTicker {
    async fn next_tick(&mut self) -> Tick {
        // Still a suspension point, so other tasks (cancel requests) get to run.
        tokio::task::yield_now().await;
        let tick = Tick {
            index: self.index,
            elapsed: self.step,
        };
        self.index += 1;
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = RecordingClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_secs_to_micros() {
        assert_eq!(secs_to_micros(1.5), 1_500_000);
        assert_eq!(secs_to_micros(-2.0), 0);
        assert_eq!(secs_to_micros(f64::NAN), 0);
    }

    #[tokio::test]
    async fn test_fixed_step_ticker_reports_constant_step() {
        let mut ticker = FixedStepTicker::per_frame(20.0);
        let first = ticker.next_tick().await;
        let second = ticker.next_tick().await;
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(first.elapsed, second.elapsed);
        assert_eq!(second.elapsed.as_millis(), 50);
    }

    #[tokio::test]
    async fn test_display_ticker_follows_playback_refresh_rate() {
        let settings = PlaybackSettings {
            refresh_hz: 120,
            ..PlaybackSettings::default()
        };
        let ticker = DisplayTicker::for_playback(&settings);
        assert_eq!(ticker.period(), Duration::from_nanos(8_333_333));
    }

    #[tokio::test]
    async fn test_display_ticker_counts_up() {
        let mut ticker = DisplayTicker::new(1000);
        let a = ticker.next_tick().await;
        let b = ticker.next_tick().await;
        assert_eq!(a.index + 1, b.index);
        assert!(b.elapsed > Duration::ZERO);
    }
}
