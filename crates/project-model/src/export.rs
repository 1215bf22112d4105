//! Export options snapshot and output naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::background::BackgroundSpec;
use crate::crop::CropArea;

/// Everything one export run needs besides the source itself.
///
/// Taken as a snapshot; the engine never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub background: BackgroundSpec,

    /// Inset around the video, in output pixels.
    #[serde(default)]
    pub padding: u32,

    /// `None` exports the full frame.
    #[serde(default)]
    pub crop_area: Option<CropArea>,

    #[serde(default)]
    pub trim_start: f64,

    /// `0` means "until the end of the source".
    #[serde(default)]
    pub trim_end: f64,

    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Title the output is named after. Falls back to the configured default.
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Widest (and, inverted, tallest) fixed ratio an export canvas may take.
pub const MAX_ASPECT_RATIO: f64 = 4.0;

/// Output canvas shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AspectRatioRepr", into = "AspectRatioRepr")]
pub enum AspectRatio {
    /// Keep the source's native aspect ratio.
    #[default]
    Source,
    /// Reshape the canvas to `width:height`; the video is letterboxed inside.
    Fixed { width: u32, height: u32 },
}

/// Wire form of [`AspectRatio`], checked on the way in.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum AspectRatioRepr {
    Source,
    Fixed { width: u32, height: u32 },
}

impl TryFrom<AspectRatioRepr> for AspectRatio {
    type Error = AspectRatioParseError;

    fn try_from(repr: AspectRatioRepr) -> Result<Self, Self::Error> {
        match repr {
            AspectRatioRepr::Source => Ok(Self::Source),
            AspectRatioRepr::Fixed { width, height } => Self::fixed(width, height),
        }
    }
}

impl From<AspectRatio> for AspectRatioRepr {
    fn from(aspect: AspectRatio) -> Self {
        match aspect {
            AspectRatio::Source => Self::Source,
            AspectRatio::Fixed { width, height } => Self::Fixed { width, height },
        }
    }
}

impl AspectRatio {
    /// A fixed `width:height` ratio, rejecting zero sides and ratios beyond
    /// [`MAX_ASPECT_RATIO`] either way.
    pub fn fixed(width: u32, height: u32) -> Result<Self, AspectRatioParseError> {
        let aspect = Self::Fixed { width, height };
        aspect.validate()?;
        Ok(aspect)
    }

    /// Check a ratio built directly from the enum fields.
    pub fn validate(&self) -> Result<(), AspectRatioParseError> {
        match *self {
            Self::Source => Ok(()),
            Self::Fixed { width, height } => {
                let ratio = width as f64 / height as f64;
                if width == 0
                    || height == 0
                    || !(1.0 / MAX_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio)
                {
                    return Err(AspectRatioParseError(self.to_string()));
                }
                Ok(())
            }
        }
    }

    /// Width / height of a valid fixed ratio.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Source => None,
            Self::Fixed { width, height } if self.validate().is_ok() => {
                Some(*width as f64 / *height as f64)
            }
            Self::Fixed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid aspect ratio {0:?}, expected \"source\" or W:H between 1:4 and 4:1")]
pub struct AspectRatioParseError(pub String);

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("source") || trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Source);
        }

        let err = || AspectRatioParseError(s.to_string());
        let (w, h) = trimmed.split_once(':').ok_or_else(err)?;
        let width: u32 = w.trim().parse().map_err(|_| err())?;
        let height: u32 = h.trim().parse().map_err(|_| err())?;
        Self::fixed(width, height).map_err(|_| err())
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Fixed { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

/// Container of the exported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputContainer {
    Webm,
    Mp4,
}

impl OutputContainer {
    /// MP4 when the source MIME mentions mp4, WebM otherwise.
    pub fn from_mime(mime: &str) -> Self {
        if mime.to_ascii_lowercase().contains("mp4") {
            Self::Mp4
        } else {
            Self::Webm
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Mp4 => "video/mp4",
        }
    }
}

/// Make a title safe to use as a file name.
///
/// Keeps ASCII letters, digits, `-`, `_` and whitespace, then collapses each
/// whitespace run into a single `-`. `"My Recording!! 01"` becomes
/// `"My-Recording-01"`.
pub fn sanitize_file_name(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_') || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// `<sanitized title>.<ext>`, using `fallback` when the title sanitizes to nothing.
pub fn output_file_name(title: Option<&str>, fallback: &str, container: OutputContainer) -> String {
    let stem = title.map(sanitize_file_name).unwrap_or_default();
    let stem = if stem.is_empty() {
        sanitize_file_name(fallback)
    } else {
        stem
    };
    let stem = if stem.is_empty() {
        "export".to_string()
    } else {
        stem
    };
    format!("{stem}.{}", container.extension())
}
