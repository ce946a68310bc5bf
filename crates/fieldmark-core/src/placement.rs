//! Placement transform: screen click → (page, page-local x/y)
//!
//! Pages are stacked vertically inside one scrollable container. A click in
//! viewport coordinates is made container-local, bucketed into a page, and made
//! page-local.
//!
//! A uniform stack assumes every page renders at the same height. Documents with
//! mixed page sizes misattribute clicks under that assumption; callers that can
//! measure each rendered page should use [`PageStack::Measured`].

use serde::{Deserialize, Serialize};

/// A point in viewport coordinates (e.g. `MouseEvent.clientX/clientY`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Vertical arrangement of rendered pages in the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageStack {
    /// Every page is `container_height / total_pages` pixels tall.
    #[serde(rename_all = "camelCase")]
    Uniform {
        container_height: f64,
        total_pages: u32,
    },
    /// Measured height of each page, in order.
    #[serde(rename_all = "camelCase")]
    Measured { page_heights: Vec<f64> },
}

impl PageStack {
    pub fn uniform(container_height: f64, total_pages: u32) -> Self {
        PageStack::Uniform {
            container_height,
            total_pages,
        }
    }

    pub fn total_pages(&self) -> u32 {
        match self {
            PageStack::Uniform { total_pages, .. } => *total_pages,
            PageStack::Measured { page_heights } => page_heights.len() as u32,
        }
    }

    fn is_usable(&self) -> bool {
        match self {
            PageStack::Uniform {
                container_height,
                total_pages,
            } => *total_pages > 0 && container_height.is_finite() && *container_height > 0.0,
            PageStack::Measured { page_heights } => {
                !page_heights.is_empty()
                    && page_heights.iter().all(|h| h.is_finite() && *h > 0.0)
            }
        }
    }

    /// Container-local offset of the top edge of `page_number` (1-based).
    pub fn page_top(&self, page_number: u32) -> Option<f64> {
        if !self.is_usable() || page_number == 0 || page_number > self.total_pages() {
            return None;
        }
        let index = (page_number - 1) as usize;
        match self {
            PageStack::Uniform {
                container_height,
                total_pages,
            } => Some(index as f64 * (container_height / *total_pages as f64)),
            PageStack::Measured { page_heights } => Some(page_heights[..index].iter().sum::<f64>()),
        }
    }

    /// Zero-based page index for a container-local y, clamped to the stack.
    fn bucket(&self, local_y: f64) -> usize {
        match self {
            PageStack::Uniform {
                container_height,
                total_pages,
            } => {
                let page_height = container_height / *total_pages as f64;
                let raw = (local_y / page_height).floor();
                let last = (*total_pages - 1) as f64;
                raw.clamp(0.0, last) as usize
            }
            PageStack::Measured { page_heights } => {
                let mut top = 0.0;
                for (index, height) in page_heights.iter().enumerate() {
                    top += height;
                    if local_y < top {
                        return index;
                    }
                }
                page_heights.len() - 1
            }
        }
    }
}

/// The scrollable rendering container as seen from the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGeometry {
    pub top: f64,
    pub left: f64,
    pub pages: PageStack,
}

impl ContainerGeometry {
    pub fn new(top: f64, left: f64, pages: PageStack) -> Self {
        Self { top, left, pages }
    }

    /// Uniform stack of `total_pages` pages filling `height` pixels.
    pub fn uniform(top: f64, left: f64, height: f64, total_pages: u32) -> Self {
        Self::new(top, left, PageStack::uniform(height, total_pages))
    }
}

/// Result of placing a click: page and page-local screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
}

/// Map a viewport click onto a page.
///
/// Returns `None` only for degenerate geometry (no pages, non-positive heights).
/// Clicks above or below the stack clamp to the first or last page.
pub fn place(click: ScreenPoint, geometry: &ContainerGeometry) -> Option<Placement> {
    place_local(click.x - geometry.left, click.y - geometry.top, &geometry.pages)
}

/// Same as [`place`] for a point already in container-local coordinates.
pub fn place_local(local_x: f64, local_y: f64, pages: &PageStack) -> Option<Placement> {
    if !pages.is_usable() || !local_x.is_finite() || !local_y.is_finite() {
        return None;
    }
    let index = pages.bucket(local_y);
    let page_number = index as u32 + 1;
    let page_top = pages.page_top(page_number)?;

    Some(Placement {
        page_number,
        x: local_x,
        y: local_y - page_top,
    })
}
