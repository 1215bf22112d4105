//! The capture device seam and the events it reports.

use std::time::Duration;

use snapreel_common::{CaptureSettings, SnapreelResult};
use tokio::sync::mpsc;

/// Something that happened to the stream or recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A chunk of encoded container bytes. May be empty.
    DataAvailable(Vec<u8>),
    /// The recorder flushed its last chunk and is inactive.
    RecorderStopped,
    /// The captured track ended outside our control (user stopped sharing).
    TrackEnded,
    /// The recorder failed.
    Error(String),
}

/// Queue the device reports into.
pub type EventSender = mpsc::UnboundedSender<CaptureEvent>;

/// Recorder parameters for one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Container/codec MIME type, e.g. `video/webm;codecs=vp9`.
    pub mime_type: String,

    /// Interval between `DataAvailable` chunks.
    pub timeslice: Duration,

    /// Capture frame rate.
    pub fps: u32,
}

impl RecorderConfig {
    /// MIME type of the assembled recording: the container part only.
    pub fn container_mime(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("video/webm")
    }
}

impl From<&CaptureSettings> for RecorderConfig {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            mime_type: settings.mime_type.clone(),
            timeslice: Duration::from_millis(settings.timeslice_ms.max(1)),
            fps: settings.fps.max(1),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from(&CaptureSettings::default())
    }
}

/// A screen (or camera) stream plus the recorder encoding it.
#[async_trait::async_trait]
pub trait CaptureDevice: Send {
    /// Device name for logs.
    fn name(&self) -> &str;

    /// Check if this device can capture on this system.
    fn is_available(&self) -> bool;

    /// Acquire the stream and start recording.
    ///
    /// Everything the recorder produces from here on goes to `events`.
    async fn start(&mut self, config: &RecorderConfig, events: EventSender) -> SnapreelResult<()>;

    fn pause(&mut self) -> SnapreelResult<()>;

    fn resume(&mut self) -> SnapreelResult<()>;

    /// Ask the recorder to stop. It reports any remaining data and then
    /// `RecorderStopped`; stopping an already inactive recorder is a no-op.
    fn stop(&mut self) -> SnapreelResult<()>;

    /// Stop the stream's tracks and drop anything still running.
    fn release(&mut self);
}
