//! The media element seam: a playable video the clock and the export engine drive.

use image::RgbaImage;
use std::time::Duration;

use crate::error::MediaError;

/// Notifications a media element queues for its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedData,
    DurationChange,
    Play,
    Pause,
    Ended,
    Seeked,
    Error(MediaError),
}

/// A playable video resource.
///
/// Playback only moves forward when the owner calls [`advance`](Self::advance),
/// so the owner's tick source decides frame timing.
#[async_trait::async_trait]
pub trait MediaElement: Send {
    /// Duration in seconds. `NaN` or `0` while unknown.
    fn duration(&self) -> f64;

    /// Native frame size `(width, height)` in pixels.
    fn natural_size(&self) -> (u32, u32);

    /// Container/codec hint of the resource.
    fn mime_type(&self) -> &str;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Begin a seek. Complete it with [`wait_seeked`](Self::wait_seeked).
    fn set_current_time(&mut self, time: f64);

    /// Suspend until the pending seek (if any) has completed.
    async fn wait_seeked(&mut self) -> Result<(), MediaError>;

    /// Start or resume playback.
    async fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn ended(&self) -> bool;

    /// Move playback forward by `elapsed`. No-op while paused or ended.
    async fn advance(&mut self, elapsed: Duration) -> Result<(), MediaError>;

    /// The frame at the current position.
    fn current_frame(&self) -> Result<&RgbaImage, MediaError>;

    /// Next queued event, if any.
    fn poll_event(&mut self) -> Option<MediaEvent>;
}
