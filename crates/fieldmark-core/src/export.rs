//! Export transform: burn placed fields into the source document
//!
//! Each field is first planned as a [`DrawInstruction`] against its page's
//! media box, then replayed onto a [`PdfCanvas`]. Field-level problems (a page
//! the document does not have, an empty signature, an image that fails to
//! embed) skip only that field and are reported as [`ExportWarning`]s. Only a
//! document that cannot be parsed or saved fails the export as a whole.

use crate::canvas::{ImageHandle, LopdfCanvas, PdfCanvas, Rgb};
use crate::config::ExportConfig;
use crate::coords::{box_anchor, PageBox};
use crate::error::Result;
use crate::field::{Field, FieldId, FieldKind};
use crate::signature::SignatureCapture;
use serde::Serialize;
use std::fmt;

/// One field's contribution to a page, in PDF points
#[derive(Debug, Clone, PartialEq)]
pub enum DrawInstruction {
    Text {
        page_number: u32,
        text: String,
        x: f64,
        y: f64,
        size: f64,
        color: Rgb,
    },
    Rectangle {
        page_number: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgb,
    },
    Ellipse {
        page_number: u32,
        center_x: f64,
        center_y: f64,
        x_radius: f64,
        y_radius: f64,
        color: Rgb,
    },
    Signature {
        page_number: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl DrawInstruction {
    pub fn page_number(&self) -> u32 {
        match self {
            DrawInstruction::Text { page_number, .. }
            | DrawInstruction::Rectangle { page_number, .. }
            | DrawInstruction::Ellipse { page_number, .. }
            | DrawInstruction::Signature { page_number, .. } => *page_number,
        }
    }
}

/// Height in points of what a field of `kind` draws. The field's screen
/// position is the top-left of a box this tall.
pub fn shape_height(kind: FieldKind, config: &ExportConfig) -> f64 {
    match kind {
        FieldKind::Text => config.font_size,
        FieldKind::Checkbox => config.checkbox_size,
        FieldKind::Radio => config.radio_radius * 2.0,
        FieldKind::Signature => config.signature_height,
    }
}

/// Plan the drawing for one field on its page.
///
/// Returns `None` when the field draws nothing (a text field with no value).
pub fn plan_field(field: &Field, page: &PageBox, config: &ExportConfig) -> Option<DrawInstruction> {
    let height = shape_height(field.kind, config);
    let (x, y) = box_anchor(field.x, field.y, height, page, config.screen_scale);
    let page_number = field.page_number;

    let instruction = match field.kind {
        FieldKind::Text => {
            if field.value.is_empty() {
                return None;
            }
            DrawInstruction::Text {
                page_number,
                text: field.value.clone(),
                x,
                y,
                size: config.font_size,
                color: config.text_color,
            }
        }
        FieldKind::Checkbox => DrawInstruction::Rectangle {
            page_number,
            x,
            y,
            width: config.checkbox_size,
            height: config.checkbox_size,
            color: config.fill_color,
        },
        FieldKind::Radio => DrawInstruction::Ellipse {
            page_number,
            center_x: x + config.radio_radius,
            center_y: y + config.radio_radius,
            x_radius: config.radio_radius,
            y_radius: config.radio_radius,
            color: config.fill_color,
        },
        FieldKind::Signature => DrawInstruction::Signature {
            page_number,
            x,
            y,
            width: config.signature_width,
            height: config.signature_height,
        },
    };
    Some(instruction)
}

/// Why a field was left out of the export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SkipReason {
    #[serde(rename_all = "camelCase")]
    PageOutOfRange { page: u32, page_count: u32 },
    EmptySignature,
    EmbedFailed { message: String },
    DrawFailed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PageOutOfRange { page, page_count } => {
                write!(f, "page {} does not exist (document has {})", page, page_count)
            }
            SkipReason::EmptySignature => write!(f, "signature surface is empty"),
            SkipReason::EmbedFailed { message } => {
                write!(f, "signature image could not be embedded: {}", message)
            }
            SkipReason::DrawFailed { message } => write!(f, "drawing failed: {}", message),
        }
    }
}

/// A field that was skipped during export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportWarning {
    pub field_id: FieldId,
    pub reason: SkipReason,
}

/// What happened to the fields of one export
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub drawn: usize,
    pub warnings: Vec<ExportWarning>,
}

/// Result of a successful export
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

impl ExportOutput {
    pub fn warnings(&self) -> &[ExportWarning] {
        &self.report.warnings
    }
}

/// Embeds the signature the first time a signature field needs it
struct SignatureCache<'a> {
    capture: &'a dyn SignatureCapture,
    embedded: Option<std::result::Result<ImageHandle, SkipReason>>,
}

impl<'a> SignatureCache<'a> {
    fn new(capture: &'a dyn SignatureCapture) -> Self {
        Self {
            capture,
            embedded: None,
        }
    }

    fn handle<C: PdfCanvas + ?Sized>(
        &mut self,
        canvas: &mut C,
    ) -> std::result::Result<ImageHandle, SkipReason> {
        if let Some(embedded) = &self.embedded {
            return embedded.clone();
        }
        let embedded = if self.capture.is_empty() {
            Err(SkipReason::EmptySignature)
        } else {
            self.capture
                .to_png()
                .and_then(|png| canvas.embed_png(&png))
                .map_err(|e| SkipReason::EmbedFailed {
                    message: e.to_string(),
                })
        };
        self.embedded = Some(embedded.clone());
        embedded
    }
}

fn draw<C: PdfCanvas + ?Sized>(
    canvas: &mut C,
    instruction: &DrawInstruction,
    signature: &mut SignatureCache<'_>,
) -> std::result::Result<(), SkipReason> {
    let failed = |e: crate::error::FieldmarkError| SkipReason::DrawFailed {
        message: e.to_string(),
    };
    match instruction {
        DrawInstruction::Text {
            page_number,
            text,
            x,
            y,
            size,
            color,
        } => canvas
            .draw_text(*page_number, text, *x, *y, *size, *color)
            .map_err(failed),
        DrawInstruction::Rectangle {
            page_number,
            x,
            y,
            width,
            height,
            color,
        } => canvas
            .draw_rectangle(*page_number, *x, *y, *width, *height, *color)
            .map_err(failed),
        DrawInstruction::Ellipse {
            page_number,
            center_x,
            center_y,
            x_radius,
            y_radius,
            color,
        } => canvas
            .draw_ellipse(
                *page_number,
                *center_x,
                *center_y,
                *x_radius,
                *y_radius,
                *color,
            )
            .map_err(failed),
        DrawInstruction::Signature {
            page_number,
            x,
            y,
            width,
            height,
        } => {
            let handle = signature.handle(canvas)?;
            canvas
                .draw_image(*page_number, handle, *x, *y, *width, *height)
                .map_err(failed)
        }
    }
}

/// Draw every field onto the canvas in store order.
///
/// Never fails as a whole: each field either draws completely or is reported
/// in the returned warnings.
pub fn render_fields<C: PdfCanvas + ?Sized>(
    canvas: &mut C,
    fields: &[Field],
    signature: &dyn SignatureCapture,
    config: &ExportConfig,
) -> RenderReport {
    let page_count = canvas.page_count();
    let mut signature = SignatureCache::new(signature);
    let mut report = RenderReport::default();

    for field in fields {
        let outcome = match canvas.page_box(field.page_number) {
            None => Err(SkipReason::PageOutOfRange {
                page: field.page_number,
                page_count,
            }),
            Some(page) => match plan_field(field, &page, config) {
                None => continue,
                Some(instruction) => draw(canvas, &instruction, &mut signature),
            },
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(field_id = field.id, kind = %field.kind, page = field.page_number, "Drew field");
                report.drawn += 1;
            }
            Err(reason) => {
                tracing::warn!(field_id = field.id, kind = %field.kind, %reason, "Skipping field");
                report.warnings.push(ExportWarning {
                    field_id: field.id,
                    reason,
                });
            }
        }
    }
    report
}

/// Load `source`, draw the fields, and serialize the result.
///
/// # Errors
///
/// Only when the source cannot be parsed or the result cannot be saved.
/// Problems with individual fields are reported in the output instead.
pub fn export_fields(
    source: &[u8],
    fields: &[Field],
    signature: &dyn SignatureCapture,
    config: &ExportConfig,
) -> Result<ExportOutput> {
    let mut canvas = LopdfCanvas::load(source)?;
    tracing::info!(
        fields = fields.len(),
        pages = canvas.page_count(),
        "Exporting fields"
    );
    let report = render_fields(&mut canvas, fields, signature, config);
    let bytes = canvas.save()?;
    tracing::info!(
        drawn = report.drawn,
        skipped = report.warnings.len(),
        bytes = bytes.len(),
        "Export complete"
    );
    Ok(ExportOutput { bytes, report })
}

/// Pre-export check of a field list against a page count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub field_count: usize,
}

pub fn validate_fields(
    fields: &[Field],
    page_count: u32,
    signature: &dyn SignatureCapture,
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in fields {
        if field.page_number == 0 || field.page_number > page_count {
            errors.push(format!(
                "Field {} is on page {} but the document has {} pages",
                field.id, field.page_number, page_count
            ));
        }
        if !field.x.is_finite() || !field.y.is_finite() {
            errors.push(format!("Field {} has non-finite coordinates", field.id));
        } else if field.x < 0.0 || field.y < 0.0 {
            errors.push(format!("Field {} has negative coordinates", field.id));
        }

        match field.kind {
            FieldKind::Text if field.value.is_empty() => {
                warnings.push(format!("Field {} has no value", field.id));
            }
            FieldKind::Signature if signature.is_empty() => {
                warnings.push(format!("Signature field {} has no signature", field.id));
            }
            _ => {}
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        field_count: fields.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldmarkError;
    use crate::signature::{NoSignature, PngSignature};
    use pretty_assertions::assert_eq;

    /// Records calls instead of touching a document
    #[derive(Default)]
    struct RecordingCanvas {
        pages: Vec<PageBox>,
        calls: Vec<String>,
        embeds: usize,
        fail_embed: bool,
    }

    impl RecordingCanvas {
        fn letter(pages: usize) -> Self {
            Self {
                pages: vec![PageBox::letter(); pages],
                ..Default::default()
            }
        }
    }

    impl PdfCanvas for RecordingCanvas {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_box(&self, page_number: u32) -> Option<PageBox> {
            let index = page_number.checked_sub(1)? as usize;
            self.pages.get(index).copied()
        }

        fn draw_text(&mut self, page: u32, text: &str, x: f64, y: f64, _: f64, _: Rgb) -> Result<()> {
            self.calls.push(format!("text p{} {} at {},{}", page, text, x, y));
            Ok(())
        }

        fn draw_rectangle(&mut self, page: u32, x: f64, y: f64, w: f64, h: f64, _: Rgb) -> Result<()> {
            self.calls.push(format!("rect p{} {},{} {}x{}", page, x, y, w, h));
            Ok(())
        }

        fn draw_ellipse(&mut self, page: u32, cx: f64, cy: f64, rx: f64, ry: f64, _: Rgb) -> Result<()> {
            self.calls.push(format!("ellipse p{} {},{} {}x{}", page, cx, cy, rx, ry));
            Ok(())
        }

        fn embed_png(&mut self, _png: &[u8]) -> Result<ImageHandle> {
            if self.fail_embed {
                return Err(FieldmarkError::Image("corrupt".into()));
            }
            self.embeds += 1;
            Ok(ImageHandle(0))
        }

        fn draw_image(&mut self, page: u32, _: ImageHandle, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
            self.calls.push(format!("image p{} {},{} {}x{}", page, x, y, w, h));
            Ok(())
        }

        fn save(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn field(id: FieldId, kind: FieldKind, x: f64, y: f64, page: u32) -> Field {
        Field::new(id, kind, x, y, page)
    }

    fn text(id: FieldId, value: &str, x: f64, y: f64, page: u32) -> Field {
        let mut f = field(id, FieldKind::Text, x, y, page);
        f.value = value.to_string();
        f
    }

    fn inked() -> PngSignature {
        PngSignature::from_bytes(vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_text_plan_flips_against_font_size() {
        let plan = plan_field(
            &text(1, "Hello", 100.0, 50.0, 1),
            &PageBox::letter(),
            &ExportConfig::default(),
        );
        assert_eq!(
            plan,
            Some(DrawInstruction::Text {
                page_number: 1,
                text: "Hello".into(),
                x: 100.0,
                y: 730.0,
                size: 12.0,
                color: [0.0; 3],
            })
        );
    }

    #[test]
    fn test_empty_text_plans_nothing() {
        let plan = plan_field(&text(1, "", 1.0, 1.0, 1), &PageBox::letter(), &ExportConfig::default());
        assert_eq!(plan, None);
    }

    #[test]
    fn test_shape_plans() {
        let config = ExportConfig::default();
        let page = PageBox::letter();

        let checkbox = plan_field(&field(1, FieldKind::Checkbox, 20.0, 20.0, 1), &page, &config);
        assert_eq!(
            checkbox,
            Some(DrawInstruction::Rectangle {
                page_number: 1,
                x: 20.0,
                y: 762.0,
                width: 10.0,
                height: 10.0,
                color: [0.0; 3],
            })
        );

        let radio = plan_field(&field(2, FieldKind::Radio, 20.0, 20.0, 1), &page, &config);
        assert_eq!(
            radio,
            Some(DrawInstruction::Ellipse {
                page_number: 1,
                center_x: 30.0,
                center_y: 762.0,
                x_radius: 10.0,
                y_radius: 10.0,
                color: [0.0; 3],
            })
        );

        let signature = plan_field(&field(3, FieldKind::Signature, 20.0, 100.0, 1), &page, &config);
        assert_eq!(
            signature,
            Some(DrawInstruction::Signature {
                page_number: 1,
                x: 20.0,
                y: 642.0,
                width: 100.0,
                height: 50.0,
            })
        );
    }

    #[test]
    fn test_screen_scale_divides_before_flip() {
        let config = ExportConfig {
            screen_scale: 2.0,
            ..ExportConfig::default()
        };
        let plan = plan_field(&text(1, "Hi", 200.0, 100.0, 1), &PageBox::letter(), &config);
        match plan {
            Some(DrawInstruction::Text { x, y, .. }) => assert_eq!((x, y), (100.0, 730.0)),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_page_is_skipped_and_rest_drawn() {
        let mut canvas = RecordingCanvas::letter(1);
        let fields = vec![
            text(1, "first", 10.0, 10.0, 1),
            text(2, "ghost", 10.0, 10.0, 5),
            field(3, FieldKind::Checkbox, 10.0, 10.0, 1),
        ];
        let report = render_fields(&mut canvas, &fields, &NoSignature, &ExportConfig::default());

        assert_eq!(report.drawn, 2);
        assert_eq!(
            report.warnings,
            vec![ExportWarning {
                field_id: 2,
                reason: SkipReason::PageOutOfRange {
                    page: 5,
                    page_count: 1
                },
            }]
        );
        assert_eq!(canvas.calls.len(), 2);
        assert!(canvas.calls[0].starts_with("text p1 first"));
    }

    #[test]
    fn test_empty_signature_skipped_with_warning() {
        let mut canvas = RecordingCanvas::letter(1);
        let fields = vec![field(1, FieldKind::Signature, 0.0, 0.0, 1)];
        let report = render_fields(&mut canvas, &fields, &NoSignature, &ExportConfig::default());
        assert_eq!(report.drawn, 0);
        assert_eq!(report.warnings[0].reason, SkipReason::EmptySignature);
        assert!(canvas.calls.is_empty());
    }

    #[test]
    fn test_signature_embedded_once() {
        let mut canvas = RecordingCanvas::letter(2);
        let fields = vec![
            field(1, FieldKind::Signature, 0.0, 0.0, 1),
            field(2, FieldKind::Signature, 0.0, 0.0, 2),
        ];
        let report = render_fields(&mut canvas, &fields, &inked(), &ExportConfig::default());
        assert_eq!(report.drawn, 2);
        assert_eq!(canvas.embeds, 1);
    }

    #[test]
    fn test_embed_failure_skips_signatures_only() {
        let mut canvas = RecordingCanvas {
            fail_embed: true,
            ..RecordingCanvas::letter(1)
        };
        let fields = vec![
            field(1, FieldKind::Signature, 0.0, 0.0, 1),
            field(2, FieldKind::Radio, 0.0, 0.0, 1),
        ];
        let report = render_fields(&mut canvas, &fields, &inked(), &ExportConfig::default());
        assert_eq!(report.drawn, 1);
        assert!(matches!(
            report.warnings[0].reason,
            SkipReason::EmbedFailed { .. }
        ));
        assert!(canvas.calls[0].starts_with("ellipse"));
    }

    #[test]
    fn test_export_rejects_unparseable_source() {
        let err = export_fields(b"nope", &[], &NoSignature, &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, FieldmarkError::ParseError(_)));
    }

    #[test]
    fn test_validate_fields() {
        let fields = vec![
            text(1, "", 10.0, 10.0, 1),
            field(2, FieldKind::Signature, 10.0, 10.0, 1),
            field(3, FieldKind::Checkbox, -1.0, 10.0, 1),
            field(4, FieldKind::Radio, 10.0, 10.0, 3),
        ];
        let report = validate_fields(&fields, 2, &NoSignature);
        assert!(!report.valid);
        assert_eq!(report.field_count, 4);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.warnings.len(), 2);

        let clean = validate_fields(&[text(1, "ok", 1.0, 1.0, 1)], 1, &NoSignature);
        assert!(clean.valid);
        assert!(clean.warnings.is_empty());
    }

    #[test]
    fn test_skip_reason_serializes_tagged() {
        let json = serde_json::to_value(ExportWarning {
            field_id: 4,
            reason: SkipReason::PageOutOfRange {
                page: 9,
                page_count: 2,
            },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fieldId": 4,
                "reason": { "type": "pageOutOfRange", "page": 9, "pageCount": 2 }
            })
        );
    }
}
