//! Source media description.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::export::OutputContainer;

/// A playable video resource as seen by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMedia {
    /// Path or URL the media was opened from.
    pub uri: String,
    /// Container/codec hint, e.g. `video/webm;codecs=vp9`.
    pub mime_type: String,
    pub duration_secs: f64,
    pub natural_width: u32,
    pub natural_height: u32,
    /// Average frame rate reported by the container, if known.
    #[serde(default)]
    pub frame_rate: Option<f64>,
}

impl SourceMedia {
    /// Width / height of the native frame.
    pub fn aspect_ratio(&self) -> f64 {
        if self.natural_height == 0 {
            return 1.0;
        }
        self.natural_width as f64 / self.natural_height as f64
    }

    /// Container the export of this source should use.
    pub fn output_container(&self) -> OutputContainer {
        OutputContainer::from_mime(&self.mime_type)
    }

    /// File name component of the uri, used in error messages.
    pub fn display_name(&self) -> &str {
        Path::new(&self.uri)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.uri)
    }
}

/// Guess a MIME type from a file extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
