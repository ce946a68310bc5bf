//! Browser front end for fieldmark
//!
//! pdf.js renders the pages and the page script forwards clicks, drags and
//! signature strokes to [`WasmEditor`]. Fields are mirrored into
//! `localStorage`, and the exported PDF is delivered as a download.

use wasm_bindgen::prelude::*;

pub mod download;
pub mod editor;
pub mod storage;

pub use editor::WasmEditor;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"fieldmark WASM initialized".into());
}

/// Number of pages in a PDF, for pages loaded outside the editor
#[wasm_bindgen(js_name = getPageCount)]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    fieldmark_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Page sizes in PDF points as `[{x, y, width, height}, ...]`
#[wasm_bindgen(js_name = getPageBoxes)]
pub fn get_page_boxes(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let boxes = fieldmark_core::page_boxes(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&boxes).map_err(|e| JsValue::from_str(&e.to_string()))
}
