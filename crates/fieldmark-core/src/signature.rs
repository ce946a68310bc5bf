//! Signature capture sources
//!
//! The exporter only needs to know whether anything was drawn and, if so, a
//! PNG of the ink cropped to its bounding box.

use crate::error::{FieldmarkError, Result};
use crate::placement::ScreenPoint;
use crate::raster::encode_png;
use base64::Engine;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// Anything that can supply the signature image at export time
pub trait SignatureCapture {
    /// `true` when there is no ink to embed
    fn is_empty(&self) -> bool;

    /// PNG bytes of the cropped signature
    fn to_png(&self) -> Result<Vec<u8>>;
}

/// No signature was captured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignature;

impl SignatureCapture for NoSignature {
    fn is_empty(&self) -> bool {
        true
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        Err(FieldmarkError::Signature("No signature captured".into()))
    }
}

/// An already-rendered signature image (e.g. exported from a browser canvas)
#[derive(Debug, Clone)]
pub struct PngSignature {
    png: Vec<u8>,
}

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

impl PngSignature {
    pub fn from_bytes(png: Vec<u8>) -> Self {
        Self { png }
    }

    /// Accepts `data:image/png;base64,...` as produced by `canvas.toDataURL()`.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let encoded = url.strip_prefix(DATA_URL_PREFIX).ok_or_else(|| {
            FieldmarkError::Signature("Signature must be a PNG data URL".into())
        })?;
        let png = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| FieldmarkError::Signature(format!("Invalid base64: {}", e)))?;
        Ok(Self { png })
    }
}

impl SignatureCapture for PngSignature {
    fn is_empty(&self) -> bool {
        self.png.is_empty()
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        if self.png.is_empty() {
            return Err(FieldmarkError::Signature("Signature image is empty".into()));
        }
        Ok(self.png.clone())
    }
}

/// Freehand drawing surface recording pen strokes.
///
/// Coordinates are surface pixels. Points outside the surface are clipped when
/// rasterized.
#[derive(Debug, Clone)]
pub struct InkPad {
    width: u32,
    height: u32,
    pen_width: f64,
    strokes: Vec<Vec<ScreenPoint>>,
}

impl Default for InkPad {
    fn default() -> Self {
        Self::new(300, 150)
    }
}

impl InkPad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pen_width: 2.0,
            strokes: Vec::new(),
        }
    }

    pub fn with_pen_width(mut self, pen_width: f64) -> Self {
        self.pen_width = pen_width.max(0.5);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn begin_stroke(&mut self, point: ScreenPoint) {
        self.strokes.push(vec![point]);
    }

    /// Extend the current stroke. Starts one if none is open.
    pub fn extend_stroke(&mut self, point: ScreenPoint) {
        match self.strokes.last_mut() {
            Some(stroke) => stroke.push(point),
            None => self.strokes.push(vec![point]),
        }
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// Where ink can still reach the surface; the pen overhangs each edge.
    fn clip_rect(&self) -> ClipRect {
        ClipRect {
            left: -self.pen_width,
            top: -self.pen_width,
            right: self.width as f64 + self.pen_width,
            bottom: self.height as f64 + self.pen_width,
        }
    }

    /// Rasterize the strokes onto a transparent surface.
    fn rasterize(&self) -> Result<Pixmap> {
        let mut pixmap = Pixmap::new(self.width, self.height)
            .ok_or_else(|| FieldmarkError::Signature("Signature pad has zero size".into()))?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        let pen = Stroke {
            width: self.pen_width as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let radius = (self.pen_width / 2.0) as f32;
        let clip = self.clip_rect();

        let mut lines = PathBuilder::new();
        let mut dots = PathBuilder::new();
        for stroke in &self.strokes {
            let points: Vec<ScreenPoint> = stroke
                .iter()
                .copied()
                .filter(|p| p.x.is_finite() && p.y.is_finite())
                .collect();
            if let [only] = points.as_slice() {
                if clip.contains(*only) {
                    dots.push_circle(only.x as f32, only.y as f32, radius);
                }
            }
            for pair in points.windows(2) {
                let Some((a, b)) = clip.clip(pair[0], pair[1]) else {
                    continue;
                };
                if a == b {
                    dots.push_circle(a.x as f32, a.y as f32, radius);
                } else {
                    lines.move_to(a.x as f32, a.y as f32);
                    lines.line_to(b.x as f32, b.y as f32);
                }
            }
        }

        if let Some(path) = lines.finish() {
            pixmap.stroke_path(&path, &paint, &pen, Transform::identity(), None);
        }
        if let Some(path) = dots.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
        Ok(pixmap)
    }
}

/// Axis-aligned rectangle stroke segments are clipped to before drawing
#[derive(Debug, Clone, Copy)]
struct ClipRect {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl ClipRect {
    fn contains(&self, p: ScreenPoint) -> bool {
        (self.left..=self.right).contains(&p.x) && (self.top..=self.bottom).contains(&p.y)
    }

    /// The part of segment `a → b` inside the rectangle (Liang-Barsky).
    fn clip(&self, a: ScreenPoint, b: ScreenPoint) -> Option<(ScreenPoint, ScreenPoint)> {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        if !dx.is_finite() || !dy.is_finite() {
            return None;
        }
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        let edges = [
            (-dx, a.x - self.left),
            (dx, self.right - a.x),
            (-dy, a.y - self.top),
            (dy, self.bottom - a.y),
        ];
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
        Some((
            ScreenPoint::new(a.x + t0 * dx, a.y + t0 * dy),
            ScreenPoint::new(a.x + t1 * dx, a.y + t1 * dy),
        ))
    }
}

/// Un-premultiply the surface into an RGBA image.
fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, color) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = color.demultiply();
        *pixel = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

/// Bounding box `(x, y, width, height)` of the non-transparent pixels
fn ink_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let (x0, y0, x1, y1) = image
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel[3] > 0)
        .fold(None, |bounds: Option<(u32, u32, u32, u32)>, (x, y, _)| {
            Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            })
        })?;
    Some((x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

impl SignatureCapture for InkPad {
    fn is_empty(&self) -> bool {
        self.strokes.iter().all(|s| s.is_empty())
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        let image = to_rgba_image(&self.rasterize()?);
        let (x, y, width, height) = ink_bounds(&image)
            .ok_or_else(|| FieldmarkError::Signature("Signature has no visible ink".into()))?;
        let cropped = imageops::crop_imm(&image, x, y, width, height).to_image();
        encode_png(&DynamicImage::ImageRgba8(cropped))
    }
}
