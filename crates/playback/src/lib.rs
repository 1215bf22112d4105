//! Snapreel Playback
//!
//! The player side of the editor: a [`MediaElement`] seam over a playable
//! video, the [`PlaybackClock`] that polls it once per tick, time formatting,
//! and still-frame capture for the crop editor.
//!
//! Two element implementations ship here: [`FfmpegMediaElement`] for video
//! files and [`SyntheticElement`], a generated test pattern.

pub mod clock;
pub mod element;
pub mod error;
pub mod ffmpeg;
pub mod format;
pub mod still;
pub mod synthetic;

pub use clock::{PlaybackClock, PlaybackState};
pub use element::{MediaElement, MediaEvent};
pub use error::{MediaError, MediaErrorKind};
pub use ffmpeg::{probe_source, FfmpegMediaElement};
pub use format::format_time;
pub use still::capture_still;
pub use synthetic::SyntheticElement;
