//! Snapreel Render Engine
//!
//! Re-encodes a source element into a new video: the trimmed window of the
//! source, cropped, fitted into a padded canvas over a background, encoded
//! and delivered as a file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! MediaElement ──┐
//!                ├── Seek to trim start, play
//! TickSource ────┘         │
//!                          ├── Background (gradient / cover image / fill)
//! ExportOptions ───────────┘         │
//!                                    ├── Crop + fit into padded canvas
//!                                    │
//!                                    ▼
//!                          FrameEncoder (VP9/WebM or H.264/MP4)
//!                                    │
//!                                    ▼
//!                          ArtifactSink (<title>.<ext>)
//! ```

pub mod background;
pub mod canvas;
pub mod compositor;
pub mod encoder;
pub mod export;
pub mod sink;

pub use encoder::{
    EncodedOutput, EncoderBackend, EncoderConfig, FfmpegEncoderBackend, FrameEncoder, VideoFrame,
};
pub use export::*;
pub use sink::{ArtifactSink, DirectorySink};
