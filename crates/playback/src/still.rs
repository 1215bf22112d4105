//! Still-frame capture for the crop editor.

use std::io::Cursor;

use image::ImageFormat;
use snapreel_common::{SnapreelError, SnapreelResult};

use crate::element::MediaElement;

/// Encode the element's current frame, at native resolution, as PNG bytes.
pub fn capture_still(element: &dyn MediaElement) -> SnapreelResult<Vec<u8>> {
    let frame = element.current_frame()?;
    let mut bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| SnapreelError::playback(format!("Failed to encode still frame: {e}")))?;
    Ok(bytes)
}
