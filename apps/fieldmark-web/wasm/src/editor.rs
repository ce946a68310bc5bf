//! Browser bindings for the editor controller
//!
//! The page keeps the pdf.js rendering and DOM overlays; this wraps the
//! [`Editor`] state machine and owns the signature pad. Field ids cross the
//! boundary as `u32`.

use crate::download::download_bytes;
use crate::storage;
use fieldmark_core::{
    validate_fields, ContainerGeometry, Editor, FieldId, FieldKind, FieldmarkConfig,
    FieldmarkError, InkPad, PageStack, PngSignature, ScreenPoint, SignatureCapture,
};
use wasm_bindgen::prelude::*;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Where the rendered page stack sits in the viewport
#[derive(Debug, Clone, Default)]
struct Container {
    top: f64,
    left: f64,
    height: f64,
    page_heights: Option<Vec<f64>>,
}

/// The built-in pad, unless an image from a JS canvas replaced it
#[derive(Default)]
struct Signature {
    pad: InkPad,
    image: Option<PngSignature>,
}

impl Signature {
    fn capture(&self) -> &dyn SignatureCapture {
        match &self.image {
            Some(image) => image,
            None => &self.pad,
        }
    }

    fn pad(&mut self) -> &mut InkPad {
        self.image = None;
        &mut self.pad
    }
}

#[wasm_bindgen]
pub struct WasmEditor {
    editor: Editor,
    container: Container,
    signature: Signature,
}

impl WasmEditor {
    /// Container geometry for the current document, once its pages are known
    fn geometry(&self) -> Option<ContainerGeometry> {
        let pages = match &self.container.page_heights {
            Some(heights) => PageStack::Measured {
                page_heights: heights.clone(),
            },
            None => {
                let total = self.editor.session()?.total_pages()?;
                PageStack::uniform(self.container.height, total)
            }
        };
        Some(ContainerGeometry::new(
            self.container.top,
            self.container.left,
            pages,
        ))
    }
}

#[wasm_bindgen]
impl WasmEditor {
    /// Create an editor, optionally configured from a TOML string.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<WasmEditor, JsValue> {
        let config = match config_toml {
            Some(toml) => FieldmarkConfig::parse(&toml).map_err(to_js)?,
            None => FieldmarkConfig::default(),
        };
        Ok(Self {
            editor: Editor::new(config, storage::best_available()),
            container: Container::default(),
            signature: Signature::default(),
        })
    }

    /// A file was selected. Rejects anything but `application/pdf`.
    #[wasm_bindgen(js_name = openDocument)]
    pub fn open_document(
        &mut self,
        file_name: String,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), JsValue> {
        self.container.page_heights = None;
        self.editor
            .open_document(file_name, mime_type, bytes)
            .map_err(to_js)
    }

    /// pdf.js reported the page count
    #[wasm_bindgen(js_name = documentRendered)]
    pub fn document_rendered(&mut self, total_pages: u32) -> Result<(), JsValue> {
        self.editor.document_rendered(total_pages).map_err(to_js)
    }

    /// pdf.js failed; returns the message to show
    #[wasm_bindgen(js_name = renderFailed)]
    pub fn render_failed(&mut self, reason: String) -> String {
        let message = self.editor.render_failed(reason).to_string();
        web_sys::console::error_1(&message.clone().into());
        message
    }

    /// Record the container's viewport position and total height.
    /// Call after layout, scroll or zoom.
    #[wasm_bindgen(js_name = updateContainer)]
    pub fn update_container(&mut self, top: f64, left: f64, height: f64) {
        self.container.top = top;
        self.container.left = left;
        self.container.height = height;
    }

    /// Measured height of each rendered page. Pass an empty list to go back to
    /// equal-height pages.
    #[wasm_bindgen(js_name = setPageHeights)]
    pub fn set_page_heights(&mut self, heights: Vec<f64>) {
        self.container.page_heights = if heights.is_empty() {
            None
        } else {
            Some(heights)
        };
    }

    /// Arm a field kind: `text`, `checkbox`, `radio`, `signature` (or `esign`)
    pub fn arm(&mut self, kind: &str) -> Result<(), JsValue> {
        let kind: FieldKind = kind.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.editor.arm(kind);
        Ok(())
    }

    pub fn disarm(&mut self) {
        self.editor.disarm();
    }

    #[wasm_bindgen(js_name = armedKind)]
    pub fn armed_kind(&self) -> Option<String> {
        self.editor.armed_kind().map(|k| k.to_string())
    }

    /// Click on the container. Returns the new field, or `null` when nothing
    /// was placed.
    pub fn click(&mut self, client_x: f64, client_y: f64) -> Result<JsValue, JsValue> {
        let Some(geometry) = self.geometry() else {
            return Ok(JsValue::NULL);
        };
        match self
            .editor
            .click(ScreenPoint::new(client_x, client_y), &geometry)
        {
            Some(field) => serde_wasm_bindgen::to_value(&field).map_err(to_js),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = updateValue)]
    pub fn update_value(&mut self, id: u32, value: String) -> bool {
        self.editor.update_value(FieldId::from(id), value)
    }

    #[wasm_bindgen(js_name = removeField)]
    pub fn remove_field(&mut self, id: u32) -> bool {
        self.editor.remove_field(FieldId::from(id))
    }

    #[wasm_bindgen(js_name = getFields)]
    pub fn get_fields(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.editor.fields()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = getFieldsJson)]
    pub fn get_fields_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.editor.fields()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, id: u32, client_x: f64, client_y: f64) -> bool {
        match self.geometry() {
            Some(geometry) => self.editor.pointer_down(
                FieldId::from(id),
                ScreenPoint::new(client_x, client_y),
                &geometry,
            ),
            None => false,
        }
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, client_x: f64, client_y: f64) -> bool {
        match self.geometry() {
            Some(geometry) => self
                .editor
                .pointer_move(ScreenPoint::new(client_x, client_y), &geometry),
            None => false,
        }
    }

    /// Drop the dragged field; `true` if it was re-placed
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, client_x: f64, client_y: f64) -> bool {
        match self.geometry() {
            Some(geometry) => self
                .editor
                .pointer_up(ScreenPoint::new(client_x, client_y), &geometry)
                .is_some(),
            None => false,
        }
    }

    /// Whether mousemove events should be forwarded
    #[wasm_bindgen(js_name = wantsPointerMoves)]
    pub fn wants_pointer_moves(&self) -> bool {
        self.editor.wants_pointer_moves()
    }

    #[wasm_bindgen(js_name = beginStroke)]
    pub fn begin_stroke(&mut self, x: f64, y: f64) {
        self.signature.pad().begin_stroke(ScreenPoint::new(x, y));
    }

    #[wasm_bindgen(js_name = extendStroke)]
    pub fn extend_stroke(&mut self, x: f64, y: f64) {
        self.signature.pad().extend_stroke(ScreenPoint::new(x, y));
    }

    #[wasm_bindgen(js_name = clearSignature)]
    pub fn clear_signature(&mut self) {
        self.signature = Signature::default();
    }

    /// Use an image from `canvas.toDataURL()` instead of the built-in pad
    #[wasm_bindgen(js_name = setSignatureDataUrl)]
    pub fn set_signature_data_url(&mut self, data_url: &str) -> Result<(), JsValue> {
        let image = PngSignature::from_data_url(data_url).map_err(to_js)?;
        self.signature.image = Some(image);
        Ok(())
    }

    #[wasm_bindgen(js_name = signatureIsEmpty)]
    pub fn signature_is_empty(&self) -> bool {
        self.signature.capture().is_empty()
    }

    /// Pre-export report of errors and warnings
    pub fn validate(&self) -> Result<JsValue, JsValue> {
        let total = self
            .editor
            .session()
            .and_then(|s| s.total_pages())
            .unwrap_or(0);
        let report = validate_fields(self.editor.fields(), total, self.signature.capture());
        serde_wasm_bindgen::to_value(&report).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportInFlight)]
    pub fn export_in_flight(&self) -> bool {
        self.editor.export_in_flight()
    }

    /// Burn the fields into the document and download the result.
    ///
    /// Returns the report of drawn and skipped fields. The session is reset
    /// and the fields cleared only once the download has been handed to the
    /// browser.
    #[wasm_bindgen(js_name = exportAndDownload)]
    pub fn export_and_download(&mut self) -> Result<JsValue, JsValue> {
        let file_name = self.editor.output_file_name().to_string();
        let mime_type = self.editor.output_mime_type().to_string();
        let result = self
            .editor
            .export_and_deliver(self.signature.capture(), |output| {
                download_bytes(&output.bytes, &file_name, &mime_type).map_err(|e| {
                    FieldmarkError::Delivery(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
                })
            });
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                web_sys::console::error_1(&format!("Error saving modified PDF: {}", e).into());
                return Err(to_js(e));
            }
        };
        for warning in output.warnings() {
            web_sys::console::warn_1(
                &format!("Field {} skipped: {}", warning.field_id, warning.reason).into(),
            );
        }
        serde_wasm_bindgen::to_value(&output.report).map_err(to_js)
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    const MINIMAL_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

    fn editor_with_document() -> WasmEditor {
        let mut editor = WasmEditor::new(None).unwrap();
        editor
            .open_document("doc.pdf".into(), "application/pdf", MINIMAL_PDF.to_vec())
            .unwrap();
        editor.document_rendered(2).unwrap();
        editor.update_container(100.0, 0.0, 600.0);
        editor
    }

    #[wasm_bindgen_test]
    fn test_rejects_non_pdf() {
        let mut editor = WasmEditor::new(None).unwrap();
        assert!(editor
            .open_document("a.png".into(), "image/png", vec![1, 2, 3])
            .is_err());
    }

    #[wasm_bindgen_test]
    fn test_click_places_on_second_page() {
        let mut editor = editor_with_document();
        editor.arm("checkbox").unwrap();
        assert!(!editor.click(20.0, 450.0).unwrap().is_null());
        assert_eq!(editor.armed_kind(), None);
        let json = editor.get_fields_json().unwrap();
        assert!(json.contains("\"pageNumber\":2"), "{}", json);
    }

    #[wasm_bindgen_test]
    fn test_click_without_armed_kind_is_null() {
        let mut editor = editor_with_document();
        assert!(editor.click(20.0, 150.0).unwrap().is_null());
    }

    #[wasm_bindgen_test]
    fn test_signature_pad_strokes() {
        let mut editor = WasmEditor::new(None).unwrap();
        assert!(editor.signature_is_empty());
        editor.begin_stroke(10.0, 10.0);
        editor.extend_stroke(50.0, 20.0);
        assert!(!editor.signature_is_empty());
        editor.clear_signature();
        assert!(editor.signature_is_empty());
    }
}
