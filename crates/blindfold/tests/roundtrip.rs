use blindfold::{
    Anonymizer, Category, CategorySet, EngineConfig, EntityLabel, EntityRecognizer, EntitySpan,
    ErrorKind, PdfDocument, Phase, RecognizerError, RecoveryChannel, RegionLedger,
};
use flate2::read::ZlibDecoder;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Read;

/// Labels fixed strings wherever they occur.
struct StubRecognizer {
    persons: Vec<&'static str>,
    orgs: Vec<&'static str>,
}

impl EntityRecognizer for StubRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, RecognizerError> {
        let mut spans = Vec::new();
        let labeled = self
            .persons
            .iter()
            .map(|p| (EntityLabel::Person, *p))
            .chain(self.orgs.iter().map(|o| (EntityLabel::Organization, *o)));
        for (label, needle) in labeled {
            for (start, found) in text.match_indices(needle) {
                spans.push(EntitySpan {
                    label,
                    text: found.to_string(),
                    start,
                    end: start + found.len(),
                });
            }
        }
        Ok(spans)
    }
}

struct FailingRecognizer;

impl EntityRecognizer for FailingRecognizer {
    fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>, RecognizerError> {
        Err(RecognizerError::Unavailable("model not loaded".into()))
    }
}

struct PageSpec {
    content: String,
    image: Option<(u32, u32, Vec<u8>)>,
}

fn text_page(content: &str) -> PageSpec {
    PageSpec {
        content: content.to_string(),
        image: None,
    }
}

/// 8x8 RGB checkerboard.
fn checkerboard() -> (u32, u32, Vec<u8>) {
    let mut data = Vec::new();
    for y in 0..8u32 {
        for x in 0..8u32 {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            data.extend_from_slice(&[v, v, v]);
        }
    }
    (8, 8, data)
}

fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for spec in pages {
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if let Some((width, height, data)) = &spec.image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => *width as i64,
                    "Height" => *height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                data.clone(),
            ));
            resources.set("XObject", dictionary! { "Im1" => image_id });
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, spec.content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            "Resources" => resources,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

const FRONT_PAGE: &str = "\
BT /F1 16 Tf 72 800 Td (A Study of Things) Tj ET
BT /F1 12 Tf 72 700 Td (John Smith) Tj ET
BT /F1 10 Tf 72 680 Td (john@example.com) Tj ET
BT /F1 10 Tf 72 660 Td (Example University) Tj ET
BT /F1 12 Tf 72 600 Td (Abstract) Tj ET
BT /F1 10 Tf 72 580 Td (We study things that matter.) Tj ET";

fn anonymizer(config: EngineConfig) -> Anonymizer {
    Anonymizer::with_recognizer(
        config,
        Box::new(StubRecognizer {
            persons: vec!["John Smith"],
            orgs: vec!["Example University"],
        }),
    )
}

fn all_text(pdf: &[u8]) -> String {
    let doc = PdfDocument::from_bytes(pdf).unwrap();
    doc.extract_pages()
        .unwrap()
        .iter()
        .map(|page| page.text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn image_pixels(pdf: &[u8], page_number: u32) -> Vec<u8> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page_number];
    let resolve = |obj: &Object| -> Object {
        match obj {
            Object::Reference(id) => doc.get_object(*id).unwrap().clone(),
            other => other.clone(),
        }
    };
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = resolve(page.get(b"Resources").unwrap());
    let xobjects = resolve(resources.as_dict().unwrap().get(b"XObject").unwrap());
    let image_ref: ObjectId = xobjects
        .as_dict()
        .unwrap()
        .get(b"Im1")
        .unwrap()
        .as_reference()
        .unwrap();
    let stream = doc.get_object(image_ref).unwrap().as_stream().unwrap();
    // lopdf leaves image streams compressed.
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(filter)) if filter == b"FlateDecode" => {
            let mut pixels = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut pixels)
                .unwrap();
            pixels
        }
        _ => stream.content.clone(),
    }
}

/// Lines of every page as `(y0, x0, text)` in tenths of a point, sorted.
fn positioned_lines(pdf: &[u8]) -> Vec<Vec<(i32, i32, String)>> {
    let doc = PdfDocument::from_bytes(pdf).unwrap();
    doc.extract_pages()
        .unwrap()
        .iter()
        .map(|page| {
            let mut lines: Vec<(i32, i32, String)> = page
                .lines
                .iter()
                .map(|l| {
                    let y0 = (l.rect.y0 * 10.0).round() as i32;
                    let x0 = (l.rect.x0 * 10.0).round() as i32;
                    (y0, x0, l.text.clone())
                })
                .collect();
            lines.sort();
            lines
        })
        .collect()
}

/// `re` operands of every `BfRestore` block, per page number, sorted.
fn restore_block_rects(pdf: &[u8]) -> Vec<(u32, [i32; 4])> {
    let number = |o: &Object| match o {
        Object::Integer(i) => *i as f32,
        Object::Real(r) => *r,
        _ => f32::NAN,
    };
    let doc = Document::load_mem(pdf).unwrap();
    let mut rects = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        let mut in_block = false;
        for op in &content.operations {
            match op.operator.as_str() {
                "BMC" => {
                    in_block = op.operands.first().and_then(|o| o.as_name().ok())
                        == Some(b"BfRestore".as_slice());
                }
                "re" if in_block => {
                    let mut rect = [0; 4];
                    for (slot, o) in rect.iter_mut().zip(&op.operands) {
                        *slot = (number(o) * 10.0).round() as i32;
                    }
                    rects.push((page_number, rect));
                    in_block = false;
                }
                _ => {}
            }
        }
    }
    rects.sort();
    rects
}

#[test]
fn one_page_scenario_produces_three_regions() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let result = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let categories: Vec<Category> = result.ledger.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![Category::Name, Category::Contact, Category::Institution]
    );
    assert!(result.verification.ok());
    assert_eq!(result.verification.checked, 3);

    let text = all_text(&result.pdf);
    assert!(!text.contains("John Smith"));
    assert!(!text.contains("john@example.com"));
    assert!(!text.contains("Example University"));
    assert!(text.contains("A Study of Things"));
    assert!(text.contains("We study things that matter."));
}

#[test]
fn full_restore_reproduces_original_strings() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let restored = engine
        .restore_bytes(
            "paper.pdf",
            &anonymized.pdf,
            &original,
            &anonymized.ledger,
            CategorySet::all(),
        )
        .unwrap();
    assert_eq!(restored.report.restored, vec![0, 1, 2]);
    assert!(restored.report.skipped.is_empty());
    assert!(restored.report.unreadable.is_empty());

    let text = all_text(&restored.pdf);
    assert!(text.contains("John Smith"));
    assert!(text.contains("john@example.com"));
    assert!(text.contains("Example University"));
}

#[test]
fn restore_by_category_and_union() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let contact_only = engine
        .restore_bytes(
            "paper.pdf",
            &anonymized.pdf,
            &original,
            &anonymized.ledger,
            CategorySet::empty().with(Category::Contact),
        )
        .unwrap();
    let text = all_text(&contact_only.pdf);
    assert!(text.contains("john@example.com"));
    assert!(!text.contains("John Smith"));
    assert!(!text.contains("Example University"));

    // The remaining categories restored on top.
    let rest = engine
        .restore_bytes(
            "paper.pdf",
            &contact_only.pdf,
            &original,
            &anonymized.ledger,
            CategorySet::empty()
                .with(Category::Name)
                .with(Category::Institution),
        )
        .unwrap();
    let text = all_text(&rest.pdf);
    assert!(text.contains("John Smith"));
    assert!(text.contains("john@example.com"));
    assert!(text.contains("Example University"));
}

#[test]
fn restore_in_two_passes_equals_one_pass() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();
    let restore = |target: &[u8], categories: CategorySet| {
        engine
            .restore_bytes("paper.pdf", target, &original, &anonymized.ledger, categories)
            .unwrap()
    };

    let names = restore(&anonymized.pdf, CategorySet::empty().with(Category::Name));
    let two_pass = restore(&names.pdf, CategorySet::empty().with(Category::Contact));
    let one_pass = restore(
        &anonymized.pdf,
        CategorySet::empty()
            .with(Category::Name)
            .with(Category::Contact),
    );

    assert_eq!(two_pass.report.restored, vec![1]);
    assert_eq!(one_pass.report.restored, vec![0, 1]);
    assert_eq!(positioned_lines(&two_pass.pdf), positioned_lines(&one_pass.pdf));
    let rects = restore_block_rects(&one_pass.pdf);
    assert_eq!(rects.len(), 2);
    assert_eq!(restore_block_rects(&two_pass.pdf), rects);
    assert!(all_text(&one_pass.pdf).contains("John Smith"));
    assert!(!all_text(&one_pass.pdf).contains("Example University"));
}

#[test]
fn cipher_channel_restores_without_ledger_text() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig {
        recovery_channel: RecoveryChannel::Cipher,
        ..EngineConfig::default()
    });
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let mut tokens_only = RegionLedger::new();
    for region in &anonymized.ledger {
        let mut region = region.clone();
        region.text = None;
        tokens_only.push(region);
    }
    let restored = engine
        .restore_bytes("paper.pdf", &anonymized.pdf, &original, &tokens_only, CategorySet::all())
        .unwrap();
    assert_eq!(restored.report.restored.len(), 3);
    assert!(all_text(&restored.pdf).contains("Example University"));
}

#[test]
fn images_only_after_references() {
    let original = build_pdf(&[
        PageSpec {
            content: format!("{}\nq 100 0 0 80 300 300 cm /Im1 Do Q", FRONT_PAGE),
            image: Some(checkerboard()),
        },
        text_page("BT /F1 12 Tf 72 742 Td (REFERENCES) Tj ET"),
        PageSpec {
            content: "q 200 0 0 150 72 500 cm /Im1 Do Q".to_string(),
            image: Some(checkerboard()),
        },
    ]);
    let engine = anonymizer(EngineConfig::default());
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let images: Vec<_> = anonymized
        .ledger
        .iter()
        .filter(|r| r.category == Category::Image)
        .collect();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].page, 2);
    assert!(images[0].text.is_none());

    let (_, _, pixels) = checkerboard();
    assert_eq!(image_pixels(&anonymized.pdf, 1), pixels);
    assert_ne!(image_pixels(&anonymized.pdf, 3), pixels);

    let restored = engine
        .restore_bytes(
            "paper.pdf",
            &anonymized.pdf,
            &original,
            &anonymized.ledger,
            CategorySet::empty().with(Category::Image),
        )
        .unwrap();
    assert_eq!(restored.report.restored.len(), 1);
    assert_eq!(image_pixels(&restored.pdf, 3), pixels);
}

#[test]
fn blur_disabled_records_no_images() {
    let original = build_pdf(&[
        text_page(FRONT_PAGE),
        text_page("BT /F1 12 Tf 72 742 Td (REFERENCES) Tj ET"),
        PageSpec {
            content: "q 200 0 0 150 72 500 cm /Im1 Do Q".to_string(),
            image: Some(checkerboard()),
        },
    ]);
    let mut config = EngineConfig::default();
    config.options.blur_images = false;
    let anonymized = anonymizer(config).anonymize_bytes("paper.pdf", &original).unwrap();
    assert_eq!(anonymized.ledger.count(Category::Image), 0);
}

#[test]
fn skip_page_is_never_redacted() {
    let original = build_pdf(&[
        text_page(FRONT_PAGE),
        text_page(
            "BT /F1 12 Tf 72 780 Td (Introduction) Tj ET\n\
             BT /F1 10 Tf 72 700 Td (As John Smith showed earlier.) Tj ET",
        ),
    ]);
    let anonymized = anonymizer(EngineConfig::default())
        .anonymize_bytes("paper.pdf", &original)
        .unwrap();
    assert!(anonymized.ledger.iter().all(|r| r.page == 0));
    assert!(all_text(&anonymized.pdf).contains("As John Smith showed earlier."));
}

#[test]
fn recognizer_failure_is_fatal() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = Anonymizer::with_recognizer(EngineConfig::default(), Box::new(FailingRecognizer));
    let err = engine.anonymize_bytes("paper.pdf", &original).unwrap_err();
    assert_eq!(err.phase, Phase::Detect);
    assert_eq!(err.document, "paper.pdf");
}

#[test]
fn unreadable_input_is_a_load_error() {
    let engine = anonymizer(EngineConfig::default());
    let err = engine.anonymize_bytes("junk.pdf", b"not a pdf").unwrap_err();
    assert_eq!(err.phase, Phase::Load);
}

#[test]
fn review_pages_keep_restore_working() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let reviewed = engine
        .merge_review_comments("paper.pdf", &anonymized.pdf, "Solid work. Please expand the evaluation.")
        .unwrap();
    let doc = Document::load_mem(&reviewed).unwrap();
    assert_eq!(doc.get_pages().len(), 2);

    let restored = engine
        .restore_bytes("paper.pdf", &reviewed, &original, &anonymized.ledger, CategorySet::all())
        .unwrap();
    let text = all_text(&restored.pdf);
    assert!(text.contains("John Smith"));
    assert!(text.contains("Reviewer Comments"));
    assert!(text.contains("Please expand the evaluation."));
}

#[test]
fn fewer_target_pages_is_an_input_error() {
    let original = build_pdf(&[text_page(FRONT_PAGE), text_page("BT /F1 12 Tf 72 742 Td (More) Tj ET")]);
    let truncated = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig::default());
    let err = engine
        .restore_bytes("paper.pdf", &truncated, &original, &RegionLedger::new(), CategorySet::all())
        .unwrap_err();
    assert_eq!(err.phase, Phase::Restore);
    assert!(matches!(
        err.kind,
        ErrorKind::PageCountMismatch {
            target: 1,
            original: 2
        }
    ));
}

#[test]
fn sealed_ledger_round_trip() {
    let original = build_pdf(&[text_page(FRONT_PAGE)]);
    let engine = anonymizer(EngineConfig {
        ledger_passphrase: Some("deployment secret".into()),
        ..EngineConfig::default()
    });
    let anonymized = engine.anonymize_bytes("paper.pdf", &original).unwrap();

    let sealed = engine.seal_ledger(&anonymized.ledger).unwrap();
    assert!(!sealed.contains("John"));
    assert_eq!(engine.open_ledger(&sealed).unwrap(), anonymized.ledger);

    let other = anonymizer(EngineConfig {
        ledger_passphrase: Some("another secret".into()),
        ..EngineConfig::default()
    });
    let err = other.open_ledger(&sealed).unwrap_err();
    assert_eq!(err.phase, Phase::Open);

    let keyless = anonymizer(EngineConfig::default());
    assert_eq!(keyless.seal_ledger(&anonymized.ledger).unwrap_err().phase, Phase::Seal);
}

#[test]
fn file_operations_write_complete_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.pdf");
    let redacted = dir.path().join("paper.blind.pdf");
    std::fs::write(&input, build_pdf(&[text_page(FRONT_PAGE)])).unwrap();

    let engine = anonymizer(EngineConfig::default());
    let ledger = engine.anonymize_file(&input, &redacted).unwrap();
    assert_eq!(ledger.len(), 3);

    // Restore in place over the redacted file.
    let report = engine
        .restore_file(&redacted, &input, &ledger, CategorySet::all(), &redacted)
        .unwrap();
    assert_eq!(report.restored.len(), 3);
    assert!(all_text(&std::fs::read(&redacted).unwrap()).contains("John Smith"));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().ends_with(".pdf"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn keywords_from_declared_list() {
    let pdf = build_pdf(&[text_page(
        "BT /F1 12 Tf 72 700 Td (Abstract) Tj ET\n\
         BT /F1 10 Tf 72 680 Td (We anonymize papers.) Tj ET\n\
         BT /F1 10 Tf 72 660 Td (Keywords: privacy; redaction) Tj ET\n\
         BT /F1 12 Tf 72 600 Td (1. Introduction) Tj ET",
    )]);
    let engine = anonymizer(EngineConfig::default());
    let keywords = engine.extract_keywords("paper.pdf", &pdf, 5).unwrap();
    assert_eq!(keywords, vec!["privacy", "redaction"]);
}
