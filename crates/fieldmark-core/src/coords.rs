//! Coordinate transformation between screen and PDF coordinate systems
//!
//! Screen space: origin at the page's top-left corner, y down, pixels.
//! PDF space: origin at the media box's bottom-left corner, y up, points.

use serde::{Deserialize, Serialize};

/// A page's media box in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    /// Media box with its origin at (0, 0)
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// Build from a `[llx, lly, urx, ury]` rectangle, normalizing inverted corners
    pub fn from_corners(rect: [f64; 4]) -> Self {
        let [x1, y1, x2, y2] = rect;
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// US Letter, the size most test documents use
    pub fn letter() -> Self {
        Self::sized(612.0, 792.0)
    }
}

/// Convert a screen point to PDF coordinates (flip Y axis)
pub fn screen_to_pdf(screen_x: f64, screen_y: f64, page: &PageBox, scale: f64) -> (f64, f64) {
    let pdf_x = page.x + screen_x / scale;
    let pdf_y = page.y + page.height - screen_y / scale;
    (pdf_x, pdf_y)
}

/// Convert PDF coordinates to a screen point
pub fn pdf_to_screen(pdf_x: f64, pdf_y: f64, page: &PageBox, scale: f64) -> (f64, f64) {
    let screen_x = (pdf_x - page.x) * scale;
    let screen_y = (page.y + page.height - pdf_y) * scale;
    (screen_x, screen_y)
}

/// Bottom-left anchor in PDF space for a box whose top-left corner sits at the
/// given screen point.
///
/// `box_height` is in points. With a zero-origin media box and scale 1 this is
/// `(x, page_height - y - box_height)`.
pub fn box_anchor(
    screen_x: f64,
    screen_y: f64,
    box_height: f64,
    page: &PageBox,
    scale: f64,
) -> (f64, f64) {
    let (pdf_x, top) = screen_to_pdf(screen_x, screen_y, page, scale);
    (pdf_x, top - box_height)
}
