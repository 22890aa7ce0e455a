use image::{ImageFormat, Rgba, RgbaImage};
use medreport_analyzer::{
    extract::{
        decode_rgb, ExtractionError, ExtractionMethod, Extractor, MockOcrEngine, PdfExtractText,
        PdfTextSource, StaticPdfText,
    },
    report::Report,
};
use std::io::Cursor;

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 6, Rgba([255, 255, 255, 128]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Builds a one-page PDF whose content stream draws `text` in Helvetica.
fn make_test_pdf(text: &str) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    });
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Parent", pages_id);
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn pdf_extractor(pages: &[&str]) -> Extractor {
    Extractor::new(Box::new(StaticPdfText::new(pages.iter().copied())), None)
}

#[test]
fn textless_page_contributes_empty_string() {
    let extractor = pdf_extractor(&["page one", "", "page three"]);
    let out = extractor
        .extract(&Report::new("report.pdf", b"%PDF".to_vec()))
        .unwrap();
    assert_eq!(out.method, ExtractionMethod::PdfText);
    assert_eq!(out.page_count, 3);
    assert_eq!(out.text, "page one\n\npage three");
    assert_eq!(out.text.matches('\n').count(), 2);
}

#[test]
fn zero_page_pdf_is_empty_not_an_error() {
    let extractor = pdf_extractor(&[]);
    let out = extractor
        .extract(&Report::new("empty.pdf", Vec::new()))
        .unwrap();
    assert_eq!(out.text, "");
    assert_eq!(out.page_count, 0);
    assert!(out.is_blank());
}

#[test]
fn pdf_extension_is_case_insensitive() {
    let extractor = pdf_extractor(&["upper"]);
    let out = extractor
        .extract(&Report::new("SCAN.PDF", Vec::new()))
        .unwrap();
    assert_eq!(out.method, ExtractionMethod::PdfText);
}

#[test]
fn pdf_failure_is_typed() {
    let extractor = Extractor::new(Box::new(StaticPdfText::failing("bad xref")), None);
    let err = extractor
        .extract(&Report::new("report.pdf", Vec::new()))
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Pdf(ref m) if m == "bad xref"));
}

#[test]
fn image_goes_through_ocr() {
    let extractor = Extractor::new(
        Box::new(StaticPdfText::new(Vec::<String>::new())),
        Some(Box::new(MockOcrEngine::new("Glucose: 90 mg/dL"))),
    );
    let out = extractor
        .extract(&Report::new("scan.png", png_bytes()))
        .unwrap();
    assert_eq!(out.method, ExtractionMethod::Ocr);
    assert_eq!(out.page_count, 1);
    assert_eq!(out.text, "Glucose: 90 mg/dL");
}

#[test]
fn undecodable_image_is_an_error() {
    let extractor = Extractor::new(
        Box::new(StaticPdfText::new(Vec::<String>::new())),
        Some(Box::new(MockOcrEngine::new("never used"))),
    );
    let err = extractor
        .extract(&Report::new("scan.jpg", b"definitely not a jpeg".to_vec()))
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Image(_)));
}

#[test]
fn ocr_failure_is_typed() {
    let extractor = Extractor::new(
        Box::new(StaticPdfText::new(Vec::<String>::new())),
        Some(Box::new(MockOcrEngine::failing("engine crashed"))),
    );
    let err = extractor
        .extract(&Report::new("scan.png", png_bytes()))
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Ocr(_)));
}

#[test]
fn image_without_ocr_engine_is_refused() {
    let extractor = pdf_extractor(&[]);
    assert!(!extractor.ocr_available());
    let err = extractor
        .extract(&Report::new("scan.jpeg", png_bytes()))
        .unwrap_err();
    assert!(matches!(err, ExtractionError::OcrUnavailable));
}

#[test]
fn alpha_channel_is_dropped() {
    let rgb = decode_rgb(&png_bytes()).unwrap();
    assert_eq!((rgb.width(), rgb.height()), (8, 6));
    assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
}

#[test]
fn extracts_text_from_digital_pdf() {
    let pages = PdfExtractText
        .page_texts(&make_test_pdf("Hemoglobin 13.5"))
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert!(
        pages[0].contains("Hemoglobin"),
        "unexpected page text: {:?}",
        pages[0]
    );
}

#[test]
fn invalid_pdf_returns_error() {
    let err = PdfExtractText.page_texts(b"not a pdf").unwrap_err();
    assert!(matches!(err, ExtractionError::Pdf(_)));
}
