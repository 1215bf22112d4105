//! Background resolution: descriptor + canvas size -> paint instruction.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use snapreel_project_model::{BackgroundSpec, Rgba};

use crate::canvas;

/// How to paint the full canvas before the video goes on top.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintInstruction {
    /// Flat colour over the whole canvas.
    Fill(Rgba),
    /// Linear gradient from `from` to `to` with stops at 0 and 1.
    LinearGradient {
        from: (f64, f64),
        to: (f64, f64),
        stops: [Rgba; 2],
    },
    /// Image scaled by `scale` and drawn at `offset` (may be negative).
    Image {
        scale: f64,
        offset: (f64, f64),
        size: (f64, f64),
    },
}

/// Resolve a background for a `canvas` of `(width, height)` pixels.
///
/// `image_size` is the size of the loaded background image, or `None` when
/// no image is available (never requested or failed to load). Anything that
/// cannot be resolved falls back to a flat `fallback` fill.
pub fn resolve_background(
    spec: &BackgroundSpec,
    canvas: (u32, u32),
    image_size: Option<(u32, u32)>,
    fallback: Rgba,
) -> PaintInstruction {
    let (w, h) = (canvas.0 as f64, canvas.1 as f64);
    match (spec, image_size) {
        (BackgroundSpec::Image { .. }, Some((iw, ih))) if iw > 0 && ih > 0 => {
            let (iw, ih) = (iw as f64, ih as f64);
            let scale = (w / iw).max(h / ih);
            let size = (iw * scale, ih * scale);
            PaintInstruction::Image {
                scale,
                offset: ((w - size.0) / 2.0, (h - size.1) / 2.0),
                size,
            }
        }
        (BackgroundSpec::Gradient { colors }, _) => PaintInstruction::LinearGradient {
            from: (0.0, 0.0),
            to: (w, h),
            stops: *colors,
        },
        _ => PaintInstruction::Fill(fallback),
    }
}

/// Render the background once into a canvas-sized buffer.
///
/// The compositor copies this buffer into the canvas at the start of every frame.
pub fn render_background(
    instruction: &PaintInstruction,
    canvas_size: (u32, u32),
    image: Option<&RgbaImage>,
) -> RgbaImage {
    let (w, h) = canvas_size;
    let mut out = RgbaImage::new(w, h);
    match (instruction, image) {
        (PaintInstruction::Fill(color), _) => canvas::fill(&mut out, *color),
        (PaintInstruction::LinearGradient { stops, .. }, _) => {
            canvas::fill_diagonal_gradient(&mut out, stops[0], stops[1]);
        }
        (PaintInstruction::Image { offset, size, .. }, Some(img)) => {
            let sw = size.0.ceil().max(1.0) as u32;
            let sh = size.1.ceil().max(1.0) as u32;
            let scaled = imageops::resize(img, sw, sh, FilterType::Triangle);
            canvas::fill(&mut out, Rgba::BLACK);
            imageops::overlay(
                &mut out,
                &scaled,
                offset.0.floor() as i64,
                offset.1.floor() as i64,
            );
        }
        (PaintInstruction::Image { .. }, None) => canvas::fill(&mut out, Rgba::BLACK),
    }
    out
}
