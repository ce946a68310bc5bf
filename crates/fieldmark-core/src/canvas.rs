//! Drawing surface for burning fields into an existing PDF
//!
//! [`PdfCanvas`] is the narrow set of primitives the exporter needs. The
//! production implementation, [`LopdfCanvas`], appends one content stream per
//! drawn primitive. Each stream is wrapped in `q`/`Q`, and the page's original
//! content is isolated the first time a page is touched. A failed draw
//! therefore leaves the page as it was.

use crate::coords::PageBox;
use crate::error::{FieldmarkError, Result};
use crate::raster;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashSet};

/// RGB color with components in 0.0..=1.0
pub type Rgb = [f64; 3];

/// Opaque handle to an image embedded in the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

/// Primitive drawing operations over a loaded document.
///
/// Pages are 1-indexed. Coordinates are PDF points with the origin at the
/// page's bottom-left.
pub trait PdfCanvas {
    fn page_count(&self) -> u32;

    /// Media box of a page, `None` if the page does not exist
    fn page_box(&self, page_number: u32) -> Option<PageBox>;

    /// Draw a single line of text with its baseline at `(x, y)`.
    fn draw_text(
        &mut self,
        page_number: u32,
        text: &str,
        x: f64,
        y: f64,
        size: f64,
        color: Rgb,
    ) -> Result<()>;

    fn draw_rectangle(
        &mut self,
        page_number: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgb,
    ) -> Result<()>;

    fn draw_ellipse(
        &mut self,
        page_number: u32,
        center_x: f64,
        center_y: f64,
        x_radius: f64,
        y_radius: f64,
        color: Rgb,
    ) -> Result<()>;

    /// Embed PNG bytes, returning a handle usable on any page.
    fn embed_png(&mut self, png: &[u8]) -> Result<ImageHandle>;

    fn draw_image(
        &mut self,
        page_number: u32,
        image: ImageHandle,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()>;

    /// Serialize the document with everything drawn so far.
    fn save(&mut self) -> Result<Vec<u8>>;
}

/// Resource name of the shared text font
const FONT_RESOURCE: &str = "FmHelv";

/// Bezier control-point ratio for approximating a quarter ellipse
const KAPPA: f64 = 0.552_284_75;

/// Maximum depth followed when resolving inherited page attributes
const MAX_INHERIT_DEPTH: usize = 32;

/// Where a page's resource dictionary lives
enum ResourceSlot {
    /// Inline in the page dictionary
    Page,
    /// A separate (possibly shared) object
    Object(ObjectId),
}

/// [`PdfCanvas`] over an in-memory `lopdf` document
pub struct LopdfCanvas {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    isolated: HashSet<ObjectId>,
    images: Vec<ObjectId>,
}

impl LopdfCanvas {
    /// Parse PDF bytes into a canvas.
    ///
    /// # Errors
    ///
    /// [`FieldmarkError::ParseError`] when the bytes are not a loadable PDF.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| FieldmarkError::ParseError(format!("Failed to parse PDF: {}", e)))?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        Self {
            doc,
            pages,
            isolated: HashSet::new(),
            images: Vec::new(),
        }
    }

    /// Media boxes of every page, in page order
    pub fn page_boxes(&self) -> Vec<PageBox> {
        self.pages
            .keys()
            .map(|&n| self.page_box(n).unwrap_or_else(PageBox::letter))
            .collect()
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        self.pages
            .get(&page_number)
            .copied()
            .ok_or(FieldmarkError::PageOutOfRange {
                page: page_number,
                page_count: self.pages.len() as u32,
            })
    }

    /// Look up a page attribute, walking up the `Parent` chain.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        for _ in 0..MAX_INHERIT_DEPTH {
            let dict = self.doc.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    /// Find the page's resource dictionary, copying inherited resources onto
    /// the page when it has none of its own.
    fn resource_slot(&mut self, page_id: ObjectId) -> Result<ResourceSlot> {
        let own = self
            .doc
            .get_object(page_id)?
            .as_dict()?
            .get(b"Resources")
            .ok()
            .cloned();

        let value = match own {
            Some(value) => value,
            None => {
                let inherited = match self.inherited(page_id, b"Resources") {
                    Some(Object::Reference(id)) => Object::Reference(id),
                    Some(Object::Dictionary(dict)) => Object::Dictionary(dict),
                    _ => Object::Dictionary(Dictionary::new()),
                };
                self.doc
                    .get_object_mut(page_id)?
                    .as_dict_mut()?
                    .set("Resources", inherited.clone());
                inherited
            }
        };

        match value {
            Object::Reference(id) => match self.doc.get_object(id)? {
                Object::Dictionary(_) => Ok(ResourceSlot::Object(id)),
                _ => Err(FieldmarkError::OperationError(
                    "Page Resources is not a dictionary".into(),
                )),
            },
            Object::Dictionary(_) => Ok(ResourceSlot::Page),
            _ => Err(FieldmarkError::OperationError(
                "Page Resources is not a dictionary".into(),
            )),
        }
    }

    fn resources_mut(&mut self, page_id: ObjectId, slot: &ResourceSlot) -> Result<&mut Dictionary> {
        let dict = match slot {
            ResourceSlot::Object(id) => self.doc.get_object_mut(*id)?.as_dict_mut()?,
            ResourceSlot::Page => self
                .doc
                .get_object_mut(page_id)?
                .as_dict_mut()?
                .get_mut(b"Resources")?
                .as_dict_mut()?,
        };
        Ok(dict)
    }

    /// Register `value` under `/category/name` in the page's resources.
    fn add_resource(
        &mut self,
        page_id: ObjectId,
        category: &str,
        name: &str,
        value: Object,
    ) -> Result<()> {
        let slot = self.resource_slot(page_id)?;

        // The category sub-dictionary may itself be indirect
        let indirect = match self.resources_mut(page_id, &slot)?.get(category.as_bytes()) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if let Some(id) = indirect {
            if let Ok(dict) = self.doc.get_object_mut(id).and_then(Object::as_dict_mut) {
                dict.set(name, value);
                return Ok(());
            }
        }

        let resources = self.resources_mut(page_id, &slot)?;
        match resources.get_mut(category.as_bytes()) {
            Ok(Object::Dictionary(dict)) => dict.set(name, value),
            _ => resources.set(category, dictionary! { name => value }),
        }
        Ok(())
    }

    /// Current page content as a list of stream references
    fn content_refs(&mut self, page_id: ObjectId) -> Result<Vec<Object>> {
        let existing = self
            .doc
            .get_object(page_id)?
            .as_dict()?
            .get(b"Contents")
            .ok()
            .cloned();

        let refs = match existing {
            None => Vec::new(),
            Some(Object::Array(items)) => items,
            Some(Object::Reference(id)) => match self.doc.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Some(inline) => vec![Object::Reference(self.doc.add_object(inline))],
        };
        Ok(refs)
    }

    /// Wrap the original content in `q`/`Q` so its graphics state cannot leak
    /// into what we draw.
    fn isolate_original(&mut self, page_id: ObjectId) -> Result<()> {
        if self.isolated.contains(&page_id) {
            return Ok(());
        }
        let mut refs = self.content_refs(page_id)?;
        if !refs.is_empty() {
            let open = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let close = self.doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            refs.insert(0, Object::Reference(open));
            refs.push(Object::Reference(close));
            self.doc
                .get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Contents", Object::Array(refs));
        }
        self.isolated.insert(page_id);
        Ok(())
    }

    /// Append a `q ... Q` wrapped content stream to a page.
    fn append_operations(&mut self, page_number: u32, operations: Vec<Operation>) -> Result<()> {
        let page_id = self.page_id(page_number)?;

        let mut wrapped = Vec::with_capacity(operations.len() + 2);
        wrapped.push(Operation::new("q", vec![]));
        wrapped.extend(operations);
        wrapped.push(Operation::new("Q", vec![]));
        let encoded = Content {
            operations: wrapped,
        }
        .encode()?;

        self.isolate_original(page_id)?;
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));
        let mut refs = self.content_refs(page_id)?;
        refs.push(Object::Reference(stream_id));
        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Array(refs));
        Ok(())
    }

    fn ensure_font(&mut self, page_id: ObjectId) -> Result<()> {
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        };
        self.add_resource(page_id, "Font", FONT_RESOURCE, Object::Dictionary(font))
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn fill_color(color: Rgb) -> Operation {
    Operation::new("rg", color.iter().map(|&c| real(c.clamp(0.0, 1.0))).collect())
}

fn validate(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(FieldmarkError::OperationError(
            "Non-finite drawing coordinate".into(),
        ))
    }
}

/// Encode text for a WinAnsi Type1 font. Characters outside Latin-1 become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

/// Four Bezier segments inscribed in the ellipse's bounding box
fn ellipse_path(cx: f64, cy: f64, rx: f64, ry: f64) -> Vec<Operation> {
    let ox = rx * KAPPA;
    let oy = ry * KAPPA;
    let curve = |points: [f64; 6]| Operation::new("c", points.iter().map(|&p| real(p)).collect());
    vec![
        Operation::new("m", vec![real(cx + rx), real(cy)]),
        curve([cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry]),
        curve([cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy]),
        curve([cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry]),
        curve([cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy]),
        Operation::new("h", vec![]),
    ]
}

impl PdfCanvas for LopdfCanvas {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_box(&self, page_number: u32) -> Option<PageBox> {
        let page_id = *self.pages.get(&page_number)?;
        let media_box = match self.inherited(page_id, b"MediaBox") {
            Some(object) => object,
            None => return Some(PageBox::letter()),
        };
        let corners: Vec<f64> = match self.resolve(&media_box) {
            Object::Array(items) => items.iter().filter_map(|o| number(self.resolve(o))).collect(),
            _ => Vec::new(),
        };
        match corners.as_slice() {
            [x1, y1, x2, y2] => Some(PageBox::from_corners([*x1, *y1, *x2, *y2])),
            _ => Some(PageBox::letter()),
        }
    }

    fn draw_text(
        &mut self,
        page_number: u32,
        text: &str,
        x: f64,
        y: f64,
        size: f64,
        color: Rgb,
    ) -> Result<()> {
        validate(&[x, y, size])?;
        let encoded = encode_win_ansi(text);
        if encoded.is_empty() {
            return Ok(());
        }
        let page_id = self.page_id(page_number)?;
        self.ensure_font(page_id)?;

        let operations = vec![
            fill_color(color),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.into()), real(size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(encoded)]),
            Operation::new("ET", vec![]),
        ];
        self.append_operations(page_number, operations)
    }

    fn draw_rectangle(
        &mut self,
        page_number: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgb,
    ) -> Result<()> {
        validate(&[x, y, width, height])?;
        let operations = vec![
            fill_color(color),
            Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
            Operation::new("f", vec![]),
        ];
        self.append_operations(page_number, operations)
    }

    fn draw_ellipse(
        &mut self,
        page_number: u32,
        center_x: f64,
        center_y: f64,
        x_radius: f64,
        y_radius: f64,
        color: Rgb,
    ) -> Result<()> {
        validate(&[center_x, center_y, x_radius, y_radius])?;
        let mut operations = vec![fill_color(color)];
        operations.extend(ellipse_path(center_x, center_y, x_radius, y_radius));
        operations.push(Operation::new("f", vec![]));
        self.append_operations(page_number, operations)
    }

    fn embed_png(&mut self, png: &[u8]) -> Result<ImageHandle> {
        let decoded = raster::decode_png(png)?;
        let id = raster::add_image_xobject(&mut self.doc, &decoded)?;
        self.images.push(id);
        Ok(ImageHandle(self.images.len() as u32 - 1))
    }

    fn draw_image(
        &mut self,
        page_number: u32,
        image: ImageHandle,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        validate(&[x, y, width, height])?;
        let image_id = *self
            .images
            .get(image.0 as usize)
            .ok_or_else(|| FieldmarkError::Image(format!("Unknown image handle {}", image.0)))?;
        let page_id = self.page_id(page_number)?;
        let name = format!("FmIm{}", image.0);
        self.add_resource(page_id, "XObject", &name, Object::Reference(image_id))?;

        let operations = vec![
            Operation::new(
                "cm",
                vec![real(width), real(0.0), real(0.0), real(height), real(x), real(y)],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
        ];
        self.append_operations(page_number, operations)
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| FieldmarkError::OperationError(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}

/// Parse a PDF and report each page's media box.
pub fn page_boxes(bytes: &[u8]) -> Result<Vec<PageBox>> {
    Ok(LopdfCanvas::load(bytes)?.page_boxes())
}
