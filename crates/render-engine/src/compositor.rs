//! Frame compositor: background, crop and letterboxed video on one canvas.
//!
//! Layout is computed once per export from the source size and the export
//! options; each frame then repaints the background and draws the cropped
//! source into the destination rectangle.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use snapreel_project_model::{AspectRatio, CropArea, SourceRect};

use crate::canvas::{self, Rect};

/// Smallest drawable area side left after padding.
const MIN_DRAWABLE: u32 = 2;

/// Output canvas size for a source of `(width, height)`.
///
/// Sources taller than `max_height` are scaled down (never up), preserving
/// their aspect ratio; sides are floored to whole pixels. A fixed aspect
/// ratio keeps the resulting height and reshapes the width. Fixed ratios
/// that fail [`AspectRatio::validate`] fall back to the source shape.
pub fn output_size(source: (u32, u32), max_height: u32, aspect: AspectRatio) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let scale = (max_height.max(1) as f64 / sh).min(1.0);
    let height = (sh * scale).floor().max(1.0);
    let width = match aspect.value() {
        Some(ratio) => (height * ratio).floor(),
        None => (sw * scale).floor(),
    };
    (width.max(1.0) as u32, height as u32)
}

/// Padding actually applied, shrunk so the drawable area stays at least 2x2.
pub fn effective_padding(canvas: (u32, u32), padding: u32) -> u32 {
    let smallest = canvas.0.min(canvas.1);
    let max_padding = smallest.saturating_sub(MIN_DRAWABLE) / 2;
    padding.min(max_padding)
}

/// Fit a `src_w x src_h` rectangle into the padded canvas area, preserving
/// its aspect ratio and centering it.
pub fn fit_rect(src_w: f64, src_h: f64, canvas: (u32, u32), padding: u32) -> Rect {
    let pad = effective_padding(canvas, padding) as f64;
    let avail_w = canvas.0 as f64 - 2.0 * pad;
    let avail_h = canvas.1 as f64 - 2.0 * pad;
    if src_w <= 0.0 || src_h <= 0.0 {
        return Rect::new(pad, pad, avail_w, avail_h);
    }

    let src_ratio = src_w / src_h;
    let dst_ratio = avail_w / avail_h;
    let (draw_w, draw_h) = if src_ratio > dst_ratio {
        (avail_w, avail_w / src_ratio)
    } else {
        (avail_h * src_ratio, avail_h)
    };

    Rect::new(
        pad + (avail_w - draw_w) / 2.0,
        pad + (avail_h - draw_h) / 2.0,
        draw_w,
        draw_h,
    )
}

/// Geometry of one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub canvas: (u32, u32),
    pub source_rect: SourceRect,
    pub dest: Rect,
}

impl Layout {
    pub fn compute(
        source: (u32, u32),
        crop: Option<CropArea>,
        canvas: (u32, u32),
        padding: u32,
    ) -> Self {
        let source_rect = crop.unwrap_or_default().to_source_rect(source.0, source.1);
        let dest = fit_rect(source_rect.width, source_rect.height, canvas, padding);
        Self {
            canvas,
            source_rect,
            dest,
        }
    }
}

/// Owns the reusable canvas buffer for one export.
pub struct Compositor {
    layout: Layout,
    crop: Option<CropArea>,
    background: RgbaImage,
    canvas: RgbaImage,
}

impl Compositor {
    /// `background` is the pre-rendered background; one of the wrong size is
    /// stretched to the canvas so every frame starts fully covered.
    pub fn new(layout: Layout, crop: Option<CropArea>, background: RgbaImage) -> Self {
        let (w, h) = layout.canvas;
        let background = if background.dimensions() == (w, h) {
            background
        } else {
            tracing::warn!(
                background = ?background.dimensions(),
                canvas = ?layout.canvas,
                "Background does not match canvas, resizing"
            );
            imageops::resize(&background, w, h, FilterType::Triangle)
        };
        Self {
            layout,
            crop,
            background,
            canvas: RgbaImage::new(w, h),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Composite one source frame and return the finished canvas.
    pub fn draw_frame(&mut self, frame: &RgbaImage) -> &RgbaImage {
        self.canvas.copy_from_slice(&self.background);

        // Crop against the frame that arrived; decoded frames can differ from the probed size.
        let src_rect = self
            .crop
            .unwrap_or_default()
            .to_source_rect(frame.width(), frame.height());

        canvas::draw_region(&mut self.canvas, frame, src_rect, self.layout.dest);
        &self.canvas
    }
}
