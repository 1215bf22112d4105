//! Snapreel Capture Engine
//!
//! Turns a platform screen stream into a finished [`Recording`].
//! A [`CaptureDevice`] owns the stream and the recorder and reports what
//! happens to it as [`CaptureEvent`]s on a queue; the [`CaptureSession`]
//! state machine consumes that queue and assembles the recorded chunks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐  DataAvailable / TrackEnded  ┌─────────────────┐
//! │ CaptureDevice        │ ───────────────────────────▶ │ CaptureSession  │
//! │ (ffmpeg x11grab, ..) │  RecorderStopped / Error      │ state machine   │
//! └──────────────────────┘ ◀─────────────────────────── └────────┬────────┘
//!                          start / pause / resume / stop         │
//!                                                                ▼
//!                                                   Recording → SessionContext
//! ```
//!
//! [`Recording`]: snapreel_project_model::Recording

pub mod device;
pub mod ffmpeg;
pub mod session;

pub use device::{CaptureDevice, CaptureEvent, EventSender, RecorderConfig};
pub use ffmpeg::FfmpegScreenDevice;
pub use session::{CaptureSession, CaptureState};
