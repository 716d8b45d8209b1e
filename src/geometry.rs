//! Geometry: points, sizes, the pan/zoom camera, and display sizing.
//!
//! DESIGN
//! ======
//! `fit_display_size` decides how large a dropped image appears on the
//! board. When the image and the viewport both exceed 960px on some axis,
//! the image's longer side is set to 960. Otherwise, when the image
//! overflows the viewport, landscape images take the viewport width and
//! portrait or square images take the viewport height. The other side
//! always follows from the aspect ratio. Images inside the viewport keep
//! their natural size.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Largest width or height, in screen pixels, a dropped image is shown at
/// when the viewport has room for more.
pub const MAX_DISPLAY_DIMENSION: f64 = 960.0;

// =============================================================================
// POINT / SIZE
// =============================================================================

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        self.width / self.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `WIDTHxHEIGHT`, e.g. `1920x1080`.
impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((w, h)) = s.split_once(['x', 'X']) else {
            return Err(format!("expected WIDTHxHEIGHT, got '{s}'"));
        };
        let width: f64 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
        let height: f64 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
        if !(width > 0.0 && height > 0.0) {
            return Err(format!("size must be positive, got '{s}'"));
        }
        Ok(Self { width, height })
    }
}

// =============================================================================
// CAMERA
// =============================================================================

/// Camera state for pan/zoom on the infinite canvas.
///
/// `pan_x` / `pan_y` are in screen pixels.
/// `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.pan_x) / self.zoom, y: (screen.y - self.pan_y) / self.zoom }
    }
}

// =============================================================================
// DISPLAY SIZING
// =============================================================================

/// Compute the on-board size for an image of `natural` size dropped into a
/// viewport of `viewport` size. Aspect ratio is always preserved.
///
/// 1. Natural and viewport both exceed [`MAX_DISPLAY_DIMENSION`] on the same
///    axis: the longer natural side becomes 960.
/// 2. Natural exceeds the viewport on either axis: a landscape image takes
///    the viewport width, otherwise the viewport height. The result may
///    still overflow the other viewport axis.
/// 3. Otherwise the natural size is returned unchanged.
#[must_use]
pub fn fit_display_size(natural: Size, viewport: Size) -> Size {
    if !(natural.width > 0.0 && natural.height > 0.0) {
        return natural;
    }

    let max = MAX_DISPLAY_DIMENSION;
    let capped = (natural.width > max && viewport.width > max) || (natural.height > max && viewport.height > max);
    if capped {
        return scale_by_orientation(natural, max, max);
    }

    if natural.width > viewport.width || natural.height > viewport.height {
        return scale_by_orientation(natural, viewport.width, viewport.height);
    }

    natural
}

/// Landscape images get `width`; portrait and square images get `height`.
fn scale_by_orientation(natural: Size, width: f64, height: f64) -> Size {
    let ratio = natural.aspect_ratio();
    if ratio > 1.0 {
        Size::new(width, width / ratio)
    } else {
        Size::new(height * ratio, height)
    }
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod tests;
