//! Software canvas operations over RGBA8 buffers.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use snapreel_project_model::{Rgba as Color, SourceRect};

/// A destination rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Snap to whole pixels: `(x, y, width, height)` with sides of at least 1.
    pub fn to_pixels(&self) -> (i64, i64, u32, u32) {
        let x0 = self.x.round();
        let y0 = self.y.round();
        let x1 = (self.x + self.width).round();
        let y1 = (self.y + self.height).round();
        (
            x0 as i64,
            y0 as i64,
            (x1 - x0).max(1.0) as u32,
            (y1 - y0).max(1.0) as u32,
        )
    }
}

pub fn pixel(color: Color) -> Rgba<u8> {
    Rgba(color.to_array())
}

/// Paint every pixel with `color`.
pub fn fill(canvas: &mut RgbaImage, color: Color) {
    let px = pixel(color);
    for p in canvas.pixels_mut() {
        *p = px;
    }
}

/// Two-stop linear gradient along the diagonal from `(0, 0)` to `(w, h)`.
///
/// Each pixel centre is projected onto the diagonal; stop 0 sits at the
/// top-left corner and stop 1 at the bottom-right corner.
pub fn fill_diagonal_gradient(canvas: &mut RgbaImage, from: Color, to: Color) {
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let len_sq = w * w + h * h;
    if len_sq <= 0.0 {
        return;
    }

    let a = from.to_array();
    let b = to.to_array();
    for (x, y, p) in canvas.enumerate_pixels_mut() {
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        let t = ((px * w + py * h) / len_sq).clamp(0.0, 1.0);
        let mut out = [0u8; 4];
        for i in 0..4 {
            out[i] = (a[i] as f64 + (b[i] as f64 - a[i] as f64) * t).round() as u8;
        }
        *p = Rgba(out);
    }
}

/// Draw `src_rect` of `src` scaled into `dst` on the canvas.
///
/// Pixels falling outside the canvas are clipped.
pub fn draw_region(canvas: &mut RgbaImage, src: &RgbaImage, src_rect: SourceRect, dst: Rect) {
    let sx = src_rect.x.floor().clamp(0.0, src.width() as f64) as u32;
    let sy = src_rect.y.floor().clamp(0.0, src.height() as f64) as u32;
    let sw = (src_rect.width.round() as u32).min(src.width() - sx);
    let sh = (src_rect.height.round() as u32).min(src.height() - sy);
    if sw == 0 || sh == 0 {
        return;
    }

    let (dx, dy, dw, dh) = dst.to_pixels();
    let region = imageops::crop_imm(src, sx, sy, sw, sh).to_image();
    if (sw, sh) == (dw, dh) {
        imageops::overlay(canvas, &region, dx, dy);
    } else {
        let scaled = imageops::resize(&region, dw, dh, FilterType::Triangle);
        imageops::overlay(canvas, &scaled, dx, dy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_covers_canvas() {
        let mut canvas = RgbaImage::new(4, 3);
        fill(&mut canvas, Color::rgb(255, 0, 0));
        assert!(canvas.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_gradient_runs_corner_to_corner() {
        let mut canvas = RgbaImage::new(200, 100);
        let black = Color::rgb(0, 0, 0);
        let white = Color::rgb(255, 255, 255);
        fill_diagonal_gradient(&mut canvas, black, white);

        let top_left = canvas.get_pixel(0, 0)[0];
        let bottom_right = canvas.get_pixel(199, 99)[0];
        let centre = canvas.get_pixel(100, 50)[0];
        assert!(top_left <= 2);
        assert!(bottom_right >= 253);
        assert!((126..=129).contains(&centre));
    }

    #[test]
    fn test_draw_region_scales_into_destination() {
        let mut src = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));
        for x in 0..5 {
            for y in 0..10 {
                src.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
        }
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let right_half = SourceRect {
            x: 5.0,
            y: 0.0,
            width: 5.0,
            height: 10.0,
        };
        draw_region(&mut canvas, &src, right_half, Rect::new(5.0, 0.0, 10.0, 20.0));

        assert_eq!(*canvas.get_pixel(0, 10), Rgba([0, 0, 0, 255]));
        let inside = canvas.get_pixel(10, 10);
        assert!(inside[0] < 5 && inside[1] < 5 && inside[2] > 250);
        assert_eq!(*canvas.get_pixel(19, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_rect_to_pixels_never_empty() {
        assert_eq!(Rect::new(0.4, 0.4, 0.2, 0.2).to_pixels(), (0, 0, 1, 1));
        assert_eq!(Rect::new(10.0, 5.5, 100.0, 50.0).to_pixels(), (10, 6, 100, 50));
    }
}
