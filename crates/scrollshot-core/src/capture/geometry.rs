//! Viewport-to-pixel crop geometry
//!
//! Maps a target rectangle in viewport (CSS) coordinates to the pixel
//! rectangle to extract from a raw viewport snapshot taken at device scale
//! `d`.

use crate::model::{PixelRect, Viewport, ViewportRect, to_pixels};

/// Absorbs float noise from scaling so exact pixel edges are not rounded
/// outward (e.g. `333.33 * 1.5`).
const EDGE_EPSILON: f64 = 1e-6;

/// Computes the pixel-space crop rectangle for `target`
///
/// The target is intersected with `[0, 0, viewport.width, viewport.height]`
/// and scaled by the device scale. The origin is floored and the far edge
/// ceiled so partially covered pixels are kept, then the result is clamped
/// to the raw snapshot size (`ceil(viewport * d)`).
///
/// Returns [`PixelRect::zero`] when the target does not intersect the
/// viewport; no snapshot should be requested for such a frame.
///
/// # Examples
///
/// ```
/// use scrollshot_core::{
///     capture::compute_crop_rect,
///     model::{PixelRect, Viewport, ViewportRect},
/// };
///
/// let viewport = Viewport::new(800.0, 600.0, 2.0);
/// let crop = compute_crop_rect(ViewportRect::new(100.0, 50.0, 300.0, 200.0), &viewport);
/// assert_eq!(crop, PixelRect::new(200, 100, 600, 400));
///
/// let hidden = compute_crop_rect(ViewportRect::new(0.0, 700.0, 300.0, 200.0), &viewport);
/// assert!(hidden.is_empty());
/// ```
pub fn compute_crop_rect(target: ViewportRect, viewport: &Viewport) -> PixelRect {
    let Some(visible) = target.intersect(&viewport.bounds()) else {
        return PixelRect::zero();
    };

    let d = viewport.device_scale;
    let x0 = (visible.left * d + EDGE_EPSILON).floor();
    let y0 = (visible.top * d + EDGE_EPSILON).floor();
    let x1 = (visible.right() * d - EDGE_EPSILON).ceil();
    let y1 = (visible.bottom() * d - EDGE_EPSILON).ceil();

    let (raw_width, raw_height) = viewport.pixel_size();
    let x = to_pixels(x0);
    let y = to_pixels(y0);
    let width = to_pixels(x1 - x0);
    let height = to_pixels(y1 - y0);

    PixelRect::new(x, y, width, height).clamped_to(raw_width, raw_height)
}
