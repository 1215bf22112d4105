//! Player-level media errors.
//!
//! These are surfaced as playback state rather than returned to callers of
//! the clock; the export path converts them into [`SnapreelError`] variants.

use serde::{Deserialize, Serialize};
use snapreel_common::SnapreelError;
use std::fmt;

/// Kinds of media failure, numbered like platform media error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    FormatUnsupported,
    Unknown,
}

impl MediaErrorKind {
    /// Map a numeric media error code (1..=4) to a kind.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::Aborted,
            2 => Self::Network,
            3 => Self::Decode,
            4 => Self::FormatUnsupported,
            _ => Self::Unknown,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Aborted => 1,
            Self::Network => 2,
            Self::Decode => 3,
            Self::FormatUnsupported => 4,
            Self::Unknown => 0,
        }
    }

    /// Human-readable description of the kind.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Aborted => "MEDIA_ERR_ABORTED - Video loading aborted",
            Self::Network => "MEDIA_ERR_NETWORK - Network error while loading video",
            Self::Decode => "MEDIA_ERR_DECODE - Video decoding failed",
            Self::FormatUnsupported => "MEDIA_ERR_SRC_NOT_SUPPORTED - Video format not supported",
            Self::Unknown => "Unknown error",
        }
    }
}

/// A media failure with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Video error: {} - {message}", .kind.code())]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind) -> Self {
        Self {
            kind,
            message: kind.describe().to_string(),
        }
    }

    /// Error whose message also names the offending file or detail.
    pub fn with_detail(kind: MediaErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            kind,
            message: format!("{}: {detail}", kind.describe()),
        }
    }

    pub fn from_code(code: u16) -> Self {
        Self::new(MediaErrorKind::from_code(code))
    }

    pub fn decode(detail: impl fmt::Display) -> Self {
        Self::with_detail(MediaErrorKind::Decode, detail)
    }

    pub fn unsupported(file: impl fmt::Display) -> Self {
        Self::with_detail(MediaErrorKind::FormatUnsupported, file)
    }
}

impl From<MediaError> for SnapreelError {
    fn from(err: MediaError) -> Self {
        let message = err.to_string();
        match err.kind {
            MediaErrorKind::Aborted => SnapreelError::SourceAborted { message },
            MediaErrorKind::Network => SnapreelError::SourceNetwork { message },
            MediaErrorKind::Decode => SnapreelError::SourceDecode { message },
            MediaErrorKind::FormatUnsupported => SnapreelError::SourceFormatUnsupported { message },
            MediaErrorKind::Unknown => SnapreelError::playback(message),
        }
    }
}
