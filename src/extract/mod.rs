pub mod ocr;
pub mod pdf;
pub mod types;

pub use ocr::{MockOcrEngine, TesseractCli};
pub use pdf::{PdfExtractText, StaticPdfText};
pub use types::{ExtractedText, ExtractionMethod, OcrEngine, PdfTextSource};

use crate::{
    config::Config,
    report::{Report, ReportFormat},
};
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("image decoding failed: {0}")]
    Image(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR engine is not available on this host")]
    OcrUnavailable,
}

/// Dispatches a report to PDF text extraction or image OCR.
pub struct Extractor {
    pdf: Box<dyn PdfTextSource>,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl Extractor {
    pub fn new(pdf: Box<dyn PdfTextSource>, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self { pdf, ocr }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let ocr = TesseractCli::locate(&cfg.ocr);
        match &ocr {
            Some(t) => debug!("tesseract resolved: {}", t.exe().display()),
            None => warn!("tesseract not found; image reports will be refused"),
        }
        Self {
            pdf: Box::new(PdfExtractText),
            ocr: ocr.map(|t| Box::new(t) as Box<dyn OcrEngine>),
        }
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_some()
    }

    pub fn extract(&self, report: &Report) -> Result<ExtractedText, ExtractionError> {
        match report.format() {
            ReportFormat::Pdf => {
                let pages = self.pdf.page_texts(&report.bytes)?;
                debug!("pdf pages={}", pages.len());
                Ok(ExtractedText {
                    method: ExtractionMethod::PdfText,
                    page_count: pages.len(),
                    text: pages.join("\n"),
                })
            }
            ReportFormat::Image => {
                let ocr = self.ocr.as_ref().ok_or(ExtractionError::OcrUnavailable)?;
                let image = decode_rgb(&report.bytes)?;
                debug!("image {}x{}", image.width(), image.height());
                Ok(ExtractedText {
                    method: ExtractionMethod::Ocr,
                    page_count: 1,
                    text: ocr.recognize(&image)?,
                })
            }
        }
    }
}

/// Decodes any supported raster format and normalises it to 3-channel RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ExtractionError> {
    let img = image::load_from_memory(bytes).map_err(|e| ExtractionError::Image(e.to_string()))?;
    Ok(img.to_rgb8())
}
