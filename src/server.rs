//! Single-page upload form.
//!
//! `GET /` renders the form, `POST /analyze` takes one multipart field named
//! `report` and renders the same page with the results underneath. Each upload
//! runs the blocking pipeline on a `spawn_blocking` worker.

use crate::{labs::LabValueMap, pipeline::Pipeline, report::Report};
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    // Multipart framing adds a little on top of the file itself.
    let body_limit = pipeline.config().server.max_upload_bytes as usize + 64 * 1024;
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { pipeline })
}

pub async fn serve(bind: &str, pipeline: Arc<Pipeline>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(pipeline))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .with_context(|| "server error")?;
    Ok(())
}

pub const NO_LAB_VALUES: &str =
    "No structured lab values detected. Summary will be based on full text.";

/// The slot between the extracted text and the summary.
#[derive(Debug, Clone, PartialEq)]
pub enum LabSection {
    Values(LabValueMap),
    NoneDetected,
}

/// What the result section of the page shows, in display order.
#[derive(Debug, Default)]
pub struct PageView {
    pub errors: Vec<String>,
    pub raw_text: Option<String>,
    pub lab_section: Option<LabSection>,
    pub summary: Option<String>,
}

/// Runs the pipeline step by step so that earlier results stay on the page
/// when a later step fails.
pub fn analyze_report(pipeline: &Pipeline, report: &Report) -> PageView {
    let mut view = PageView::default();
    info!("report_id={} file={}", report.id(), report.filename);

    if let Err(e) = pipeline.admit(report) {
        view.errors.push(e.user_message());
        return view;
    }

    let extracted = match pipeline.extract(report) {
        Ok(t) => t,
        Err(e) => {
            view.errors.push(e.user_message());
            return view;
        }
    };

    let labs = pipeline.parse(&extracted.text);

    match pipeline.summarize(&extracted.text, &labs) {
        Ok(summary) => view.summary = Some(summary),
        Err(e) => {
            error!("summary generation failed: {e}");
            view.errors.push(e.user_message());
        }
    }

    view.raw_text = Some(extracted.text);
    view.lab_section = Some(if labs.is_empty() {
        LabSection::NoneDetected
    } else {
        LabSection::Values(labs)
    });
    view
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(state.pipeline.ocr_available(), None))
}

async fn analyze(State(state): State<AppState>, mut multipart: Multipart) -> Html<String> {
    let ocr_available = state.pipeline.ocr_available();

    let mut upload: Option<Report> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("report") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("report").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some(Report::new(filename, bytes.to_vec())),
                    Err(e) => {
                        warn!("failed to read upload: {e}");
                        return Html(render_page(
                            ocr_available,
                            Some(&error_view("Failed to read the uploaded file.")),
                        ));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart body: {e}");
                return Html(render_page(
                    ocr_available,
                    Some(&error_view("Failed to read the uploaded file.")),
                ));
            }
        }
    }

    let Some(report) = upload else {
        return Html(render_page(
            ocr_available,
            Some(&error_view("Please choose a report to upload.")),
        ));
    };

    let pipeline = state.pipeline.clone();
    let view = match tokio::task::spawn_blocking(move || analyze_report(&pipeline, &report)).await
    {
        Ok(view) => view,
        Err(e) => {
            error!("analysis task failed: {e}");
            error_view(&format!("❌ Error: {e}"))
        }
    };

    Html(render_page(ocr_available, Some(&view)))
}

fn error_view(message: &str) -> PageView {
    PageView {
        errors: vec![message.to_string()],
        ..Default::default()
    }
}

pub fn render_page(ocr_available: bool, view: Option<&PageView>) -> String {
    let mut body = String::new();
    body.push_str("<h1>🫁 Medical Report Analyzer</h1>\n");
    body.push_str(
        "<p>Upload a medical report (PDF or Image). This app extracts text, finds lab values, \
         and generates a <strong>detailed, patient-friendly summary</strong>.</p>\n",
    );
    if !ocr_available {
        body.push_str(
            "<div class=\"error\">⚠️ Tesseract OCR is not installed. Image reports cannot be \
             processed until it is available on PATH (e.g. <code>brew install tesseract</code> \
             or <code>apt install tesseract-ocr</code>). PDF reports still work.</div>\n",
        );
    }
    body.push_str(
        "<form method=\"post\" action=\"/analyze\" enctype=\"multipart/form-data\">\n\
         <label>Upload your report <input type=\"file\" name=\"report\" \
         accept=\".pdf,.png,.jpg,.jpeg\" required></label>\n\
         <button type=\"submit\">Analyze</button>\n</form>\n",
    );

    if let Some(view) = view {
        for message in &view.errors {
            body.push_str(&format!("<div class=\"error\">{}</div>\n", escape_html(message)));
        }
        if let Some(text) = &view.raw_text {
            body.push_str("<h2>📜 Extracted Text</h2>\n");
            body.push_str(&format!("<pre>{}</pre>\n", escape_html(text)));
        }
        match &view.lab_section {
            Some(LabSection::Values(labs)) => {
                let json = serde_json::to_string_pretty(labs).unwrap_or_default();
                body.push_str("<h2>📊 Parsed Lab Values</h2>\n");
                body.push_str(&format!("<pre>{}</pre>\n", escape_html(&json)));
            }
            Some(LabSection::NoneDetected) => {
                body.push_str(&format!("<div class=\"info\">{NO_LAB_VALUES}</div>\n"));
            }
            None => {}
        }
        if let Some(summary) = &view.summary {
            body.push_str("<h2>📝 Detailed Summary</h2>\n");
            body.push_str(&format!(
                "<div class=\"summary\">{}</div>\n",
                escape_html(summary).replace('\n', "<br>\n")
            ));
        }
    }

    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Medical Report Analyzer</title>\n<style>{STYLE}</style>\n</head>\n\
         <body>\n{body}</body>\n</html>\n"
    )
}

const STYLE: &str = "body{font-family:sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem}\
pre{white-space:pre-wrap;background:#f6f6f6;padding:1rem}\
.info{background:#e8f1fb;padding:.6rem;margin:.5rem 0}\
.error{background:#fdecea;padding:.6rem;margin:.5rem 0}";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
