//! Error types shared across Snapreel crates.

/// Top-level error type for Snapreel operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapreelError {
    #[error("Capability unavailable: {message}")]
    CapabilityUnavailable { message: String },

    #[error("Invalid trim range: start {start:.3}s, end {end:.3}s")]
    InvalidTrimRange { start: f64, end: f64 },

    #[error("Source decode error: {message}")]
    SourceDecode { message: String },

    #[error("Source format unsupported: {message}")]
    SourceFormatUnsupported { message: String },

    #[error("Source network error: {message}")]
    SourceNetwork { message: String },

    #[error("Source loading aborted: {message}")]
    SourceAborted { message: String },

    #[error("Background image failed to load: {uri}")]
    BackgroundImageLoadFailed { uri: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Export failed: {message}")]
    ExportFailed { message: String },

    #[error("An export is already in progress")]
    ExportBusy,

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SnapreelError.
pub type SnapreelResult<T> = Result<T, SnapreelError>;

impl SnapreelError {
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn export_failed(msg: impl Into<String>) -> Self {
        Self::ExportFailed {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Errors that degrade the current job instead of aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BackgroundImageLoadFailed { .. })
    }

    /// Whether the error originated from the source media rather than the pipeline.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceDecode { .. }
                | Self::SourceFormatUnsupported { .. }
                | Self::SourceNetwork { .. }
                | Self::SourceAborted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_background_image_failure_is_recoverable() {
        let degraded = SnapreelError::BackgroundImageLoadFailed {
            uri: "bg.png".to_string(),
        };
        assert!(degraded.is_recoverable());
        assert!(!SnapreelError::encode("boom").is_recoverable());
        assert!(!SnapreelError::ExportBusy.is_recoverable());
    }

    #[test]
    fn test_invalid_trim_range_message() {
        let err = SnapreelError::InvalidTrimRange {
            start: 2.0,
            end: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "Invalid trim range: start 2.000s, end 1.500s"
        );
    }

    #[test]
    fn test_source_error_classification() {
        let err = SnapreelError::SourceFormatUnsupported {
            message: "clip.avi".to_string(),
        };
        assert!(err.is_source_error());
        assert!(!SnapreelError::capability("no encoder").is_source_error());
    }
}
