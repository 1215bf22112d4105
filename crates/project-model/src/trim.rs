//! Trim range: the `[start, end]` window of the source that gets exported.
//!
//! Times are in seconds. Once a source duration is known the range keeps
//! `0 <= start`, `end <= duration` and `end - start >= MIN_GAP_SECS`.

use serde::{Deserialize, Serialize};

/// Smallest allowed distance between trim start and trim end.
pub const MIN_GAP_SECS: f64 = 0.1;

/// A clamped sub-range of the source duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    start: f64,
    end: f64,
    /// Duration of the source the range applies to (0 = not yet known).
    source_duration: f64,
}

impl TrimRange {
    /// Full-length range for a source of the given duration.
    pub fn new(source_duration: f64) -> Self {
        let duration = sanitize_duration(source_duration);
        Self {
            start: 0.0,
            end: duration,
            source_duration: duration,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    /// Move the start bound, keeping it at least `MIN_GAP_SECS` before the end.
    pub fn set_start(&mut self, time: f64) {
        self.start = clamp_trim_start(time, self.end);
    }

    /// Move the end bound, keeping it at least `MIN_GAP_SECS` after the start.
    pub fn set_end(&mut self, time: f64) {
        self.end = clamp_trim_end(time, self.start, self.source_duration);
    }

    /// Replace both bounds at once.
    ///
    /// Rejected (returns `false`, no state change) when `end <= start + MIN_GAP_SECS`.
    pub fn set_range(&mut self, start: f64, end: f64) -> bool {
        if !start.is_finite() || !end.is_finite() || end <= start + MIN_GAP_SECS {
            return false;
        }

        let start = start.max(0.0);
        let end = if self.source_duration > 0.0 {
            end.min(self.source_duration)
        } else {
            end
        };
        if end - start < MIN_GAP_SECS {
            return false;
        }

        self.start = start;
        self.end = end;
        true
    }

    /// Reinitialize to `[0, duration]`, e.g. when a new source finishes loading.
    pub fn reset(&mut self, duration: f64) {
        *self = Self::new(duration);
    }

    /// Length of the trimmed window.
    pub fn trimmed_duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether the range differs from the full source.
    pub fn is_trimmed(&self) -> bool {
        self.start > 0.0 || (self.end > 0.0 && self.end < self.source_duration)
    }

    /// Whether `time` lies inside `[start, end]`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

impl Default for TrimRange {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Clamp a requested start so it stays in `[0, end - MIN_GAP_SECS]`.
pub fn clamp_trim_start(time: f64, end: f64) -> f64 {
    let time = if time.is_finite() { time } else { 0.0 };
    time.min(end - MIN_GAP_SECS).max(0.0)
}

/// Clamp a requested end so it stays in `[start + MIN_GAP_SECS, duration]`.
///
/// An unknown duration (`<= 0`) leaves the upper side open.
pub fn clamp_trim_end(time: f64, start: f64, duration: f64) -> f64 {
    let lower = start + MIN_GAP_SECS;
    let time = if time.is_finite() { time } else { lower };
    let upper = if duration > 0.0 { duration } else { f64::INFINITY };
    time.min(upper).max(lower)
}

/// Resolve the window an export should cover.
///
/// `start = max(0, trim_start)`; `end = min(trim_end, duration)` when
/// `trim_end > 0`, else the full duration. Returns `None` for an empty window.
pub fn effective_window(trim_start: f64, trim_end: f64, duration: f64) -> Option<(f64, f64)> {
    let start = if trim_start.is_finite() {
        trim_start.max(0.0)
    } else {
        0.0
    };
    let end = if trim_end > 0.0 {
        trim_end.min(duration)
    } else {
        duration
    };

    if end.is_finite() && end - start > 0.0 {
        Some((start, end))
    } else {
        None
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}
