//! End-to-end scenario on a US Letter page through the host surface

use std::sync::Arc;

use amnesia_annotations::api::{self, ErrorCode};
use amnesia_annotations::color::{classify, ColorSample};
use amnesia_annotations::document::Page;
use amnesia_annotations::engine::{AnnotKind, MemoryAnnotation, TextSpan};
use amnesia_annotations::geometry::{NativeRect, Quad};
use amnesia_annotations::{
    Config, Document, Highlight, HighlightColor, MemoryEngine, Note, Rectangle,
};

fn letter_page(setup: impl FnOnce(&mut MemoryEngine, u32)) -> Page<MemoryEngine> {
    let mut engine = MemoryEngine::new();
    let index = engine.add_page(612.0, 792.0);
    setup(&mut engine, index);
    let doc = Arc::new(Document::new("scenario", engine));
    doc.load_page(index).unwrap()
}

fn scenario_page() -> Page<MemoryEngine> {
    letter_page(|engine, index| {
        engine
            .add_text(index, TextSpan::new("Call", NativeRect::new(102.0, 703.0, 130.0, 717.0)))
            .unwrap();
        engine
            .add_text(index, TextSpan::new("me", NativeRect::new(134.0, 703.0, 150.0, 717.0)))
            .unwrap();
        engine
            .add_text(index, TextSpan::new("Ishmael.", NativeRect::new(154.0, 703.0, 210.0, 717.0)))
            .unwrap();
        engine
            .add_annotation(
                index,
                MemoryAnnotation::markup(
                    AnnotKind::Highlight,
                    vec![Quad::from_rect(&NativeRect::new(100.0, 700.0, 300.0, 720.0))],
                    ColorSample::rgb(0.1, 0.9, 0.1),
                ),
            )
            .unwrap();
        engine
            .add_annotation(index, MemoryAnnotation::note(72.0, 72.0, 24.0, Some("chapter start")))
            .unwrap();
    })
}

#[test]
fn test_highlight_scenario() {
    let page = scenario_page();

    let highlights = api::get_annotations(&page).unwrap();
    assert_eq!(highlights.len(), 1);
    assert_eq!(highlights[0].rectangles, vec![Rectangle::new(100.0, 72.0, 300.0, 92.0)]);
    assert_eq!(highlights[0].color, HighlightColor::Green);
    assert_eq!(highlights[0].text.as_deref(), Some("Call me Ishmael."));
    assert_eq!(classify(&ColorSample::rgb(0.1, 0.9, 0.1)), HighlightColor::Green);

    let target = [Rectangle::new(100.0, 72.0, 300.0, 92.0)];
    assert_eq!(api::delete_annotation(&page, &target), Ok(()));
    assert_eq!(api::delete_annotation(&page, &target), Err(ErrorCode::Unknown));
    assert!(api::get_annotations(&page).unwrap().is_empty());

    // the note is not a markup and survives
    assert_eq!(api::get_notes(&page).unwrap().len(), 1);
}

#[test]
fn test_note_scenario() {
    let page = scenario_page();

    let notes = api::get_notes(&page).unwrap();
    assert_eq!(notes.len(), 1);
    let note = &notes[0];
    assert_eq!(note.id, "embedded-0-72-72");

    api::update_note_content(&page, note.x, note.y, "revised").unwrap();
    let after = api::get_notes(&page).unwrap();
    assert_eq!(after.len(), notes.len());
    assert_eq!(after[0].content.as_deref(), Some("revised"));

    api::delete_note(&page, note.x, note.y).unwrap();
    assert!(api::get_notes(&page).unwrap().is_empty());
    assert_eq!(api::delete_note(&page, note.x, note.y), Err(ErrorCode::Unknown));
}

#[test]
fn test_empty_note_export() {
    let page = scenario_page();
    let before = page.document().with_engine(|e| e.page_annotations(0).len());

    assert_eq!(api::export_notes(&page, &[]), Ok(()));
    assert_eq!(page.document().with_engine(|e| e.page_annotations(0).len()), before);
}

#[test]
fn test_export_to_second_document() {
    let source = scenario_page();
    let highlights = api::get_annotations(&source).unwrap();
    let notes = api::get_notes(&source).unwrap();

    let target = letter_page(|_, _| {});
    api::export_annotations(&target, &highlights).unwrap();
    api::export_notes(&target, &notes).unwrap();

    let copied = api::get_annotations(&target).unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].id, highlights[0].id);
    assert_eq!(copied[0].color, HighlightColor::Green);
    // exported contents are not read back; text comes from the page
    assert_eq!(copied[0].text, None);
    assert_eq!(api::get_notes(&target).unwrap(), notes);
}

#[test]
fn test_configured_tolerance() {
    let mut engine = MemoryEngine::new();
    let index = engine.add_page(612.0, 792.0);
    let config = Config {
        match_tolerance: 5.0,
        ..Config::default()
    };
    let doc = Arc::new(Document::with_config("loose", engine, config));
    let page = doc.load_page(index).unwrap();

    let highlight = Highlight::new(
        0,
        vec![Rectangle::new(100.0, 72.0, 300.0, 92.0)],
        HighlightColor::Red,
        page.height(),
    );
    api::export_annotations(&page, &[highlight]).unwrap();

    let nudged = [Rectangle::new(103.0, 70.0, 297.0, 95.0)];
    assert_eq!(api::delete_annotation(&page, &nudged), Ok(()));
}

#[test]
fn test_unbound_page() {
    let page = scenario_page();
    page.unload();

    assert_eq!(api::get_annotations(&page), Err(ErrorCode::InvalidArguments));
    assert_eq!(
        api::export_notes(&page, &[Note::new(0, 1.0, 1.0, None)]),
        Err(ErrorCode::InvalidArguments)
    );
}

#[test]
fn test_json_shape() {
    let page = scenario_page();
    let highlights = api::get_annotations(&page).unwrap();
    let json = serde_json::to_value(&highlights[0]).unwrap();

    assert_eq!(json["pageIndex"], 0);
    assert_eq!(json["color"], "green");
    assert_eq!(json["rectangles"][0]["y1"], 72.0);
    assert_eq!(json["id"], "highlight-0-100-700");
}

#[test]
fn test_export_fault_keeps_committed() {
    use amnesia_annotations::engine::FaultPoint;

    let page = letter_page(|engine, _| {
        engine.inject_fault_after(FaultPoint::CreateAnnotation, 1);
    });
    let highlights: Vec<Highlight> = [72.0, 172.0]
        .iter()
        .map(|y| {
            Highlight::new(
                0,
                vec![Rectangle::new(100.0, *y, 300.0, y + 20.0)],
                HighlightColor::Yellow,
                792.0,
            )
        })
        .collect();

    assert_eq!(api::export_annotations(&page, &highlights), Err(ErrorCode::Unknown));

    page.document().with_engine_mut(|e| e.clear_faults());
    let written = api::get_annotations(&page).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].id, highlights[0].id);
}
