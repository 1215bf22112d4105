//! Crop region over the source frame and the interactive crop editor.
//!
//! All values are in percent of the frame: `(0, 0)` is top-left and
//! `(100, 100)` is bottom-right. A valid area keeps `x + width <= 100`,
//! `y + height <= 100` and both sides at least [`MIN_CROP_SIZE`].

use serde::{Deserialize, Serialize};

/// Smallest allowed crop side, in percent.
pub const MIN_CROP_SIZE: f64 = 10.0;

/// A rectangular crop region in percent-of-frame units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A crop area resolved to source pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropArea {
    /// The whole frame. Treated as "no crop".
    pub const FULL: CropArea = CropArea {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    /// Create a crop area, clamping it into a valid rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let width = finite_or(width, 100.0).clamp(MIN_CROP_SIZE, 100.0);
        let height = finite_or(height, 100.0).clamp(MIN_CROP_SIZE, 100.0);
        Self {
            x: finite_or(x, 0.0).clamp(0.0, 100.0 - width),
            y: finite_or(y, 0.0).clamp(0.0, 100.0 - height),
            width,
            height,
        }
    }

    /// Whether this is the full frame, in which case no crop transform applies.
    pub fn is_identity(&self) -> bool {
        *self == Self::FULL
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Map onto a source frame of `width x height` pixels.
    pub fn to_source_rect(&self, width: u32, height: u32) -> SourceRect {
        let (w, h) = (width as f64, height as f64);
        if self.is_identity() {
            return SourceRect {
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
            };
        }
        SourceRect {
            x: self.x / 100.0 * w,
            y: self.y / 100.0 * h,
            width: self.width / 100.0 * w,
            height: self.height / 100.0 * h,
        }
    }
}

impl Default for CropArea {
    fn default() -> Self {
        Self::FULL
    }
}

/// Translate a crop by `(dx, dy)` percent, keeping it inside the frame.
pub fn apply_move_delta(crop: CropArea, dx: f64, dy: f64) -> CropArea {
    let dx = finite_or(dx, 0.0);
    let dy = finite_or(dy, 0.0);
    CropArea {
        x: (crop.x + dx).min(100.0 - crop.width).max(0.0),
        y: (crop.y + dy).min(100.0 - crop.height).max(0.0),
        ..crop
    }
}

/// Grow a crop by `(dx, dy)` percent from its bottom-right corner.
///
/// With `lock_ratio` set, height follows width so the rectangle's on-screen
/// shape matches the ratio inside a container of `container_aspect`
/// (container width / height in pixels).
pub fn apply_resize_delta(
    crop: CropArea,
    dx: f64,
    dy: f64,
    lock_ratio: Option<f64>,
    container_aspect: f64,
) -> CropArea {
    let dx = finite_or(dx, 0.0);
    let dy = finite_or(dy, 0.0);
    let max_width = 100.0 - crop.x;
    let max_height = 100.0 - crop.y;

    let mut width = (crop.width + dx).min(max_width).max(MIN_CROP_SIZE);
    let mut height = (crop.height + dy).min(max_height).max(MIN_CROP_SIZE);

    if let Some(ratio) = lock_ratio.filter(|r| r.is_finite() && *r > 0.0) {
        if container_aspect.is_finite() && container_aspect > 0.0 {
            let target = ratio / container_aspect;
            height = width / target;
            if crop.y + height > 100.0 {
                height = max_height;
                width = height * target;
            }
            // Extreme ratios can still push a side out of bounds.
            width = width.min(max_width).max(MIN_CROP_SIZE);
            height = height.min(max_height).max(MIN_CROP_SIZE);
        }
    }

    CropArea {
        width,
        height,
        ..crop
    }
}

/// Aspect ratio presets offered by the crop editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectPreset {
    Free,
    Widescreen,
    Vertical,
    Standard,
    Square,
}

impl AspectPreset {
    pub const ALL: [AspectPreset; 5] = [
        AspectPreset::Free,
        AspectPreset::Widescreen,
        AspectPreset::Vertical,
        AspectPreset::Standard,
        AspectPreset::Square,
    ];

    /// Width / height, or `None` for a free-form crop.
    pub fn ratio(&self) -> Option<f64> {
        match self {
            Self::Free => None,
            Self::Widescreen => Some(16.0 / 9.0),
            Self::Vertical => Some(9.0 / 16.0),
            Self::Standard => Some(4.0 / 3.0),
            Self::Square => Some(1.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Widescreen => "16:9",
            Self::Vertical => "9:16",
            Self::Standard => "4:3",
            Self::Square => "1:1",
        }
    }
}

/// What a pointer drag is doing to the pending crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    kind: DragKind,
    last_x: f64,
    last_y: f64,
}

/// One crop editing session.
///
/// Edits accumulate in a pending area; `apply` hands it back as the new
/// committed value and `cancel` discards it.
#[derive(Debug, Clone)]
pub struct CropEditor {
    committed: Option<CropArea>,
    pending: CropArea,
    preset: AspectPreset,
    drag: Option<DragState>,
}

impl CropEditor {
    /// Open an editor on the currently committed crop (full frame if none).
    pub fn open(committed: Option<CropArea>) -> Self {
        Self {
            committed,
            pending: committed.unwrap_or_default(),
            preset: AspectPreset::Free,
            drag: None,
        }
    }

    pub fn pending(&self) -> CropArea {
        self.pending
    }

    pub fn preset(&self) -> AspectPreset {
        self.preset
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn select_ratio(&mut self, preset: AspectPreset) {
        self.preset = preset;
    }

    /// Start a drag at pointer position `(x, y)` in container pixels.
    pub fn begin_drag(&mut self, kind: DragKind, x: f64, y: f64) {
        self.drag = Some(DragState {
            kind,
            last_x: x,
            last_y: y,
        });
    }

    /// Continue the drag to `(x, y)`; `container` is the on-screen frame size in pixels.
    pub fn drag_to(&mut self, x: f64, y: f64, container: (f64, f64)) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let (cw, ch) = container;
        if !(cw > 0.0 && ch > 0.0) {
            return;
        }

        let dx = (x - drag.last_x) / cw * 100.0;
        let dy = (y - drag.last_y) / ch * 100.0;
        drag.last_x = x;
        drag.last_y = y;

        self.pending = match drag.kind {
            DragKind::Move => apply_move_delta(self.pending, dx, dy),
            DragKind::Resize => {
                apply_resize_delta(self.pending, dx, dy, self.preset.ratio(), cw / ch)
            }
        };
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Back to the full frame, clearing any ratio lock.
    pub fn reset(&mut self) {
        self.pending = CropArea::FULL;
        self.preset = AspectPreset::Free;
        self.drag = None;
    }

    /// Commit the pending area.
    pub fn apply(self) -> CropArea {
        self.pending
    }

    /// Discard edits and return the previously committed value.
    pub fn cancel(self) -> Option<CropArea> {
        self.committed
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_maps_to_full_frame() {
        let rect = CropArea::FULL.to_source_rect(1920, 1080);
        assert_eq!(
            rect,
            SourceRect {
                x: 0.0,
                y: 0.0,
                width: 1920.0,
                height: 1080.0
            }
        );
        assert!(CropArea::default().is_identity());
    }

    #[test]
    fn test_source_rect_scales_percentages() {
        let crop = CropArea::new(25.0, 10.0, 50.0, 40.0);
        let rect = crop.to_source_rect(800, 600);
        assert!((rect.x - 200.0).abs() < 1e-9);
        assert!((rect.y - 60.0).abs() < 1e-9);
        assert!((rect.width - 400.0).abs() < 1e-9);
        assert!((rect.height - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_move_clamps_to_frame() {
        let crop = CropArea::new(10.0, 10.0, 50.0, 50.0);
        let moved = apply_move_delta(crop, 80.0, -30.0);
        assert_eq!(moved.x, 50.0);
        assert_eq!(moved.y, 0.0);
        assert_eq!(moved.width, 50.0);
    }

    #[test]
    fn test_resize_respects_minimum_and_edge() {
        let crop = CropArea::new(30.0, 30.0, 40.0, 40.0);
        let shrunk = apply_resize_delta(crop, -90.0, -90.0, None, 16.0 / 9.0);
        assert_eq!((shrunk.width, shrunk.height), (MIN_CROP_SIZE, MIN_CROP_SIZE));

        let grown = apply_resize_delta(crop, 90.0, 90.0, None, 16.0 / 9.0);
        assert_eq!((grown.width, grown.height), (70.0, 70.0));
    }

    #[test]
    fn test_locked_ratio_matches_on_screen_shape() {
        let container = (1600.0, 900.0);
        let crop = CropArea::new(0.0, 0.0, 20.0, 20.0);
        let resized = apply_resize_delta(crop, 20.0, 0.0, Some(1.0), container.0 / container.1);

        let px_w = resized.width / 100.0 * container.0;
        let px_h = resized.height / 100.0 * container.1;
        assert!((px_w / px_h - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_locked_ratio_clamps_at_bottom_edge() {
        let crop = CropArea::new(0.0, 60.0, 20.0, 20.0);
        let resized = apply_resize_delta(crop, 60.0, 0.0, Some(9.0 / 16.0), 16.0 / 9.0);
        assert!(resized.bottom() <= 100.0 + 1e-9);
        assert!((resized.height - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_editor_drag_and_apply() {
        let mut editor = CropEditor::open(None);
        editor.begin_drag(DragKind::Resize, 400.0, 300.0);
        editor.drag_to(200.0, 150.0, (400.0, 300.0));
        editor.end_drag();
        assert_eq!(editor.pending(), CropArea::new(0.0, 0.0, 50.0, 50.0));

        editor.begin_drag(DragKind::Move, 0.0, 0.0);
        editor.drag_to(100.0, 30.0, (400.0, 300.0));
        editor.end_drag();

        let applied = editor.apply();
        assert_eq!(applied, CropArea::new(25.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn test_editor_cancel_keeps_committed() {
        let committed = CropArea::new(5.0, 5.0, 60.0, 60.0);
        let mut editor = CropEditor::open(Some(committed));
        editor.begin_drag(DragKind::Move, 0.0, 0.0);
        editor.drag_to(50.0, 50.0, (100.0, 100.0));
        assert_ne!(editor.pending(), committed);
        assert_eq!(editor.cancel(), Some(committed));
    }

    #[test]
    fn test_editor_reset_clears_ratio_lock() {
        let mut editor = CropEditor::open(Some(CropArea::new(5.0, 5.0, 60.0, 60.0)));
        editor.select_ratio(AspectPreset::Square);
        editor.reset();
        assert_eq!(editor.preset(), AspectPreset::Free);
        assert!(editor.pending().is_identity());
    }

    #[test]
    fn test_drag_without_begin_is_ignored() {
        let mut editor = CropEditor::open(None);
        editor.drag_to(50.0, 50.0, (100.0, 100.0));
        assert!(editor.pending().is_identity());
    }
}
