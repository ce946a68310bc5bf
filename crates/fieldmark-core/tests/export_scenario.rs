//! End-to-end export tests: build a PDF, place fields, export, and read the
//! resulting content streams back.

use fieldmark_core::{
    export_fields, ContainerGeometry, Editor, ExportConfig, Field, FieldKind, FieldmarkConfig,
    InkPad, MemoryStore, NoSignature, ScreenPoint, SignatureCapture, SkipReason,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;

/// A document with one `[0 0 width height]` page per entry, each carrying a
/// line of text in its original content.
fn build_pdf(pages: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });

    let mut kids: Vec<Object> = Vec::new();
    for (index, (width, height)) in pages.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![50.into(), 50.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Original {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(*width),
                Object::Integer(*height),
            ]),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn letter_pdf(pages: usize) -> Vec<u8> {
    build_pdf(&vec![(612, 792); pages])
}

fn operations(pdf: &[u8], page_number: u32) -> Vec<Operation> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page_number];
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content).unwrap().operations
}

fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => *r as f64,
        other => panic!("not a number: {:?}", other),
    }
}

fn shown_text(ops: &[Operation]) -> Vec<String> {
    ops.iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match &op.operands[0] {
            Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect()
}

fn text_field(id: u64, value: &str, x: f64, y: f64, page: u32) -> Field {
    let mut field = Field::new(id, FieldKind::Text, x, y, page);
    field.value = value.to_string();
    field
}

#[test]
fn two_page_scenario() {
    let source = letter_pdf(2);
    let fields = vec![
        Field::new(1, FieldKind::Checkbox, 20.0, 20.0, 1),
        text_field(2, "Sign here", 30.0, 700.0, 2),
    ];

    let output = export_fields(&source, &fields, &NoSignature, &ExportConfig::default()).unwrap();
    assert_eq!(output.report.drawn, 2);
    assert!(output.warnings().is_empty());

    let doc = Document::load_mem(&output.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);

    // Page 1: one filled rectangle near the top-left
    let page_one = operations(&output.bytes, 1);
    let rects: Vec<&Operation> = page_one.iter().filter(|op| op.operator == "re").collect();
    assert_eq!(rects.len(), 1);
    let rect: Vec<f64> = rects[0].operands.iter().map(number).collect();
    assert_eq!(rect, vec![20.0, 762.0, 10.0, 10.0]);
    assert!(page_one.iter().any(|op| op.operator == "f"));
    assert_eq!(shown_text(&page_one), vec!["Original 1"]);

    // Page 2: the text near the bottom-left
    let page_two = operations(&output.bytes, 2);
    assert_eq!(shown_text(&page_two), vec!["Original 2", "Sign here"]);
    let td = page_two.iter().rev().find(|op| op.operator == "Td").unwrap();
    assert_eq!((number(&td.operands[0]), number(&td.operands[1])), (30.0, 80.0));
    assert!(!page_two.iter().any(|op| op.operator == "re"));
}

#[test]
fn text_anchor_on_letter_page() {
    let output = export_fields(
        &letter_pdf(1),
        &[text_field(1, "Hello", 100.0, 50.0, 1)],
        &NoSignature,
        &ExportConfig::default(),
    )
    .unwrap();
    let ops = operations(&output.bytes, 1);
    let td = ops.iter().rev().find(|op| op.operator == "Td").unwrap();
    assert_eq!(number(&td.operands[0]), 100.0);
    assert_eq!(number(&td.operands[1]), 730.0);
}

#[test]
fn field_beyond_page_count_is_skipped() {
    let output = export_fields(
        &letter_pdf(1),
        &[
            text_field(1, "ghost", 10.0, 10.0, 3),
            text_field(2, "kept", 10.0, 10.0, 1),
        ],
        &NoSignature,
        &ExportConfig::default(),
    )
    .unwrap();

    assert_eq!(output.report.drawn, 1);
    assert_eq!(output.warnings().len(), 1);
    assert_eq!(output.warnings()[0].field_id, 1);
    assert_eq!(
        output.warnings()[0].reason,
        SkipReason::PageOutOfRange {
            page: 3,
            page_count: 1
        }
    );
    assert_eq!(shown_text(&operations(&output.bytes, 1)), vec!["Original 1", "kept"]);
}

#[test]
fn empty_signature_is_skipped_and_output_produced() {
    let pad = InkPad::default();
    assert!(pad.is_empty());
    let output = export_fields(
        &letter_pdf(1),
        &[Field::new(1, FieldKind::Signature, 10.0, 10.0, 1)],
        &pad,
        &ExportConfig::default(),
    )
    .unwrap();

    assert_eq!(output.report.drawn, 0);
    assert_eq!(output.warnings()[0].reason, SkipReason::EmptySignature);
    assert!(Document::load_mem(&output.bytes).is_ok());
    assert!(!operations(&output.bytes, 1).iter().any(|op| op.operator == "Do"));
}

#[test]
fn inked_signature_is_drawn_into_its_box() {
    let mut pad = InkPad::default();
    pad.begin_stroke(ScreenPoint::new(20.0, 80.0));
    pad.extend_stroke(ScreenPoint::new(120.0, 60.0));
    pad.extend_stroke(ScreenPoint::new(200.0, 90.0));

    let output = export_fields(
        &letter_pdf(1),
        &[Field::new(1, FieldKind::Signature, 40.0, 100.0, 1)],
        &pad,
        &ExportConfig::default(),
    )
    .unwrap();
    assert_eq!(output.report.drawn, 1);

    let ops = operations(&output.bytes, 1);
    let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
    let matrix: Vec<f64> = cm.operands.iter().map(number).collect();
    assert_eq!(matrix, vec![100.0, 0.0, 0.0, 50.0, 40.0, 642.0]);
    assert!(ops.iter().any(|op| op.operator == "Do"));
}

#[test]
fn radio_is_closed_curve_inside_its_box() {
    let output = export_fields(
        &letter_pdf(1),
        &[Field::new(1, FieldKind::Radio, 100.0, 100.0, 1)],
        &NoSignature,
        &ExportConfig::default(),
    )
    .unwrap();
    let ops = operations(&output.bytes, 1);
    assert_eq!(ops.iter().filter(|op| op.operator == "c").count(), 4);
    let start = ops.iter().find(|op| op.operator == "m").unwrap();
    // Center (110, 682), radius 10: path starts at the rightmost point
    assert_eq!((number(&start.operands[0]), number(&start.operands[1])), (120.0, 682.0));
}

#[test]
fn mixed_page_sizes_flip_against_their_own_height() {
    let source = build_pdf(&[(612, 792), (842, 595)]);
    let output = export_fields(
        &source,
        &[Field::new(1, FieldKind::Checkbox, 0.0, 0.0, 2)],
        &NoSignature,
        &ExportConfig::default(),
    )
    .unwrap();
    let ops = operations(&output.bytes, 2);
    let rect = ops.iter().find(|op| op.operator == "re").unwrap();
    assert_eq!(number(&rect.operands[1]), 585.0);
}

#[test]
fn editor_click_to_export() {
    let mut editor = Editor::new(FieldmarkConfig::default(), Box::new(MemoryStore::new()));
    editor
        .open_document("lease.pdf", "application/pdf", letter_pdf(2))
        .unwrap();
    editor.document_rendered(2).unwrap();

    // Two 792px pages in a container 50px below the viewport top
    let geometry = ContainerGeometry::uniform(50.0, 0.0, 1584.0, 2);

    editor.arm(FieldKind::Checkbox);
    editor.click(ScreenPoint::new(20.0, 70.0), &geometry).unwrap();

    editor.arm(FieldKind::Text);
    let text = editor
        .click(ScreenPoint::new(30.0, 50.0 + 792.0 + 700.0), &geometry)
        .unwrap();
    assert_eq!(text.page_number, 2);
    assert_eq!(text.y, 700.0);
    editor.update_value(text.id, "Sign here");

    let output = editor.export(&NoSignature).unwrap();
    assert_eq!(output.report.drawn, 2);
    assert_eq!(
        shown_text(&operations(&output.bytes, 2)),
        vec!["Original 2", "Sign here"]
    );
    assert!(editor.session().is_none());
    assert!(editor.fields().is_empty());
}
