use super::types::PdfTextSource;
use super::ExtractionError;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Reads the embedded text layer with the pdf-extract crate.
pub struct PdfExtractText;

impl PdfTextSource for PdfExtractText {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract panics on some malformed fonts and encodings.
        let result = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }));
        match result {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(ExtractionError::Pdf(e.to_string())),
            Err(_) => Err(ExtractionError::Pdf("PDF text extraction panicked".into())),
        }
    }
}

/// Fixed page texts, for tests and dry runs.
pub struct StaticPdfText {
    outcome: Result<Vec<String>, String>,
}

impl StaticPdfText {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            outcome: Ok(pages.into_iter().map(Into::into).collect()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
        }
    }
}

impl PdfTextSource for StaticPdfText {
    fn page_texts(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        self.outcome.clone().map_err(ExtractionError::Pdf)
    }
}
