//! Place form-like fields on a PDF and burn them into the document
//!
//! Fields (text, checkbox, radio, signature) are placed by clicking on pages
//! rendered in a scrollable container, kept in an ordered store mirrored to a
//! key-value slot, and drawn into the original PDF on export using lopdf.
//!
//! - [`placement`]: screen click → (page, page-local position)
//! - [`store`] / [`persist`]: the field list and its best-effort mirror
//! - [`export`] / [`canvas`]: per-field drawing onto the loaded document
//! - [`editor`]: the controller front ends drive

pub mod canvas;
pub mod config;
pub mod coords;
pub mod drag;
pub mod editor;
pub mod error;
pub mod export;
pub mod field;
pub mod persist;
pub mod placement;
pub mod raster;
pub mod signature;
pub mod store;

pub use canvas::{page_boxes, LopdfCanvas, PdfCanvas};
pub use config::{ExportConfig, FieldmarkConfig};
pub use coords::PageBox;
pub use editor::{is_pdf_mime, Editor, ExportJob};
pub use error::FieldmarkError;
pub use export::{export_fields, validate_fields, ExportOutput, ExportWarning, SkipReason};
pub use field::{Field, FieldId, FieldKind};
pub use persist::{FileStore, KeyValueStore, MemoryStore};
pub use placement::{place, ContainerGeometry, PageStack, Placement, ScreenPoint};
pub use signature::{InkPad, NoSignature, PngSignature, SignatureCapture};
pub use store::FieldStore;

/// The only accepted input type and the type of the exported file
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, FieldmarkError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| FieldmarkError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
