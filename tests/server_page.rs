use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use medreport_analyzer::{
    config::Config,
    extract::{Extractor, StaticPdfText},
    llm::MockLlmClient,
    pipeline::Pipeline,
    report::Report,
    server::{analyze_report, build_router, escape_html, render_page, LabSection, NO_LAB_VALUES},
};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "medreport-test-boundary";

fn pipeline(pages: &[&str], llm: MockLlmClient) -> Pipeline {
    let extractor = Extractor::new(Box::new(StaticPdfText::new(pages.iter().copied())), None);
    Pipeline::new(&Config::default(), extractor, Box::new(llm)).unwrap()
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn upload(field: &str, filename: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, filename, b"%PDF-1.4")))
        .unwrap()
}

#[tokio::test]
async fn index_shows_form_and_ocr_banner() {
    let app = build_router(Arc::new(pipeline(&[], MockLlmClient::new("unused"))));
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("name=\"report\""));
    assert!(html.contains("Tesseract OCR is not installed"));
}

#[tokio::test]
async fn health_is_ok() {
    let app = build_router(Arc::new(pipeline(&[], MockLlmClient::new("unused"))));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn upload_renders_all_sections() {
    let app = build_router(Arc::new(pipeline(
        &["Hemoglobin: 13.5 g/dL"],
        MockLlmClient::new("Your hemoglobin is normal."),
    )));
    let resp = app.oneshot(upload("report", "labs.pdf")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let html = body_text(resp).await;
    assert!(html.contains("Extracted Text"));
    assert!(html.contains("Parsed Lab Values"));
    assert!(html.contains("&quot;Hemoglobin&quot;: &quot;13.5 g/dL&quot;"));
    assert!(html.contains("Detailed Summary"));
    assert!(html.contains("Your hemoglobin is normal."));
}

#[tokio::test]
async fn upload_without_report_field_asks_for_a_file() {
    let app = build_router(Arc::new(pipeline(&["x"], MockLlmClient::new("unused"))));
    let resp = app.oneshot(upload("attachment", "labs.pdf")).await.unwrap();
    let html = body_text(resp).await;
    assert!(html.contains("Please choose a report to upload."));
    assert!(!html.contains("Extracted Text"));
}

#[tokio::test]
async fn image_upload_without_ocr_shows_install_message() {
    let app = build_router(Arc::new(pipeline(&[], MockLlmClient::new("unused"))));
    let resp = app.oneshot(upload("report", "scan.png")).await.unwrap();
    let html = body_text(resp).await;
    assert!(html.contains("Image OCR requires Tesseract OCR. Please install it first."));
}

#[test]
fn llm_failure_keeps_extracted_text_and_labs() {
    let p = pipeline(&["Glucose: 90 mg/dL"], MockLlmClient::failing("quota exceeded"));
    let view = analyze_report(&p, &Report::new("labs.pdf", Vec::new()));

    assert_eq!(view.raw_text.as_deref(), Some("Glucose: 90 mg/dL"));
    match &view.lab_section {
        Some(LabSection::Values(labs)) => assert_eq!(labs.get("Glucose"), Some("90 mg/dL")),
        other => panic!("expected lab values, got {other:?}"),
    }
    assert!(view.summary.is_none());
    assert!(matches!(
        view.errors.as_slice(),
        [m] if m.starts_with("❌ Error:") && m.contains("quota exceeded")
    ));
}

#[test]
fn free_text_fills_the_lab_slot_with_a_note() {
    let p = pipeline(&["Patient feels fine."], MockLlmClient::new("Fine."));
    let view = analyze_report(&p, &Report::new("note.pdf", Vec::new()));

    assert_eq!(view.lab_section, Some(LabSection::NoneDetected));
    assert_eq!(view.summary.as_deref(), Some("Fine."));
    assert!(view.errors.is_empty());
}

#[test]
fn no_lab_values_note_sits_between_text_and_summary() {
    let p = pipeline(&["Patient feels fine."], MockLlmClient::new("Fine."));
    let view = analyze_report(&p, &Report::new("note.pdf", Vec::new()));
    let html = render_page(true, Some(&view));

    let text_at = html.find("📜 Extracted Text").unwrap();
    let note_at = html.find(NO_LAB_VALUES).unwrap();
    let summary_at = html.find("📝 Detailed Summary").unwrap();
    assert!(text_at < note_at, "note rendered above the extracted text");
    assert!(note_at < summary_at);
    assert!(!html.contains("📊 Parsed Lab Values"));
}

#[test]
fn blank_report_stops_with_extraction_message() {
    let p = pipeline(&[""], MockLlmClient::new("unused"));
    let view = analyze_report(&p, &Report::new("blank.pdf", Vec::new()));

    assert!(view.raw_text.is_none());
    assert!(view.lab_section.is_none());
    assert_eq!(
        view.errors,
        vec!["No text found or error during extraction.".to_string()]
    );
}

#[test]
fn report_text_is_escaped() {
    let p = pipeline(&["<script>alert(1)</script>"], MockLlmClient::new("ok"));
    let view = analyze_report(&p, &Report::new("x.pdf", Vec::new()));
    let html = render_page(true, Some(&view));
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!html.contains("Tesseract OCR is not installed"));
}

#[test]
fn escape_html_covers_quotes_and_ampersands() {
    assert_eq!(
        escape_html(r#"a & b < "c" > 'd'"#),
        "a &amp; b &lt; &quot;c&quot; &gt; &#39;d&#39;"
    );
}
