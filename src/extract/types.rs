use super::ExtractionError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    PdfText,
    Ocr,
}

/// Text pulled out of one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub method: ExtractionMethod,
    /// Number of PDF pages, or 1 for an image.
    pub page_count: usize,
    pub text: String,
}

impl ExtractedText {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Per-page text of a PDF. A page without a text layer yields `""`.
pub trait PdfTextSource: Send + Sync {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Turns an RGB raster into text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String, ExtractionError>;
}
