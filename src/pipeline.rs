use crate::{
    config::Config,
    extract::{ExtractedText, ExtractionError, Extractor},
    labs::{LabParser, LabValueMap},
    llm::{LlmClient, LlmError, OpenAiChatClient, Sampling},
    narrative,
    report::{Analysis, Report, ReportFormat},
    util::{extension_of, now_rfc3339},
};
use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("report rejected: {0}")]
    Rejected(String),

    #[error("image OCR requested but no OCR engine is available")]
    OcrUnavailable,

    #[error(transparent)]
    Extraction(ExtractionError),

    #[error("no text could be extracted from the report")]
    NoText,

    #[error(transparent)]
    Generation(#[from] LlmError),
}

impl PipelineError {
    /// The inline status line shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Rejected(reason) => format!("❌ Error: {reason}"),
            PipelineError::OcrUnavailable => {
                "Image OCR requires Tesseract OCR. Please install it first.".to_string()
            }
            PipelineError::Extraction(_) | PipelineError::NoText => {
                "No text found or error during extraction.".to_string()
            }
            PipelineError::Generation(e) => format!("❌ Error: {e}"),
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::OcrUnavailable => PipelineError::OcrUnavailable,
            other => PipelineError::Extraction(other),
        }
    }
}

/// Extractor, parser and LLM client, built once per process.
pub struct Pipeline {
    cfg: Config,
    extractor: Extractor,
    parser: LabParser,
    llm: Box<dyn LlmClient>,
    sampling: Sampling,
}

impl Pipeline {
    pub fn new(cfg: &Config, extractor: Extractor, llm: Box<dyn LlmClient>) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            extractor,
            parser: LabParser::from_config(&cfg.labs)?,
            llm,
            sampling: Sampling::from(&cfg.llm),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let extractor = Extractor::from_config(cfg);
        let llm = OpenAiChatClient::from_config(&cfg.llm)?;
        if !llm.has_api_key() {
            warn!(
                "{} is not set; summary generation will fail",
                cfg.llm.api_key_env
            );
        }
        Self::new(cfg, extractor, Box::new(llm))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn ocr_available(&self) -> bool {
        self.extractor.ocr_available()
    }

    /// Extension allow-list, size cap, and the OCR-availability gate for images.
    pub fn admit(&self, report: &Report) -> Result<(), PipelineError> {
        let ext = extension_of(&report.filename).unwrap_or_default();
        if !self
            .cfg
            .input
            .allowed_extensions
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&ext))
        {
            return Err(PipelineError::Rejected(format!(
                "unsupported file type: {}",
                report.filename
            )));
        }
        if report.bytes.len() as u64 > self.cfg.input.max_bytes {
            return Err(PipelineError::Rejected(format!(
                "file exceeds {} bytes",
                self.cfg.input.max_bytes
            )));
        }
        if report.format() == ReportFormat::Image && !self.ocr_available() {
            return Err(PipelineError::OcrUnavailable);
        }
        Ok(())
    }

    /// Extracted text, or an error when extraction failed or produced only whitespace.
    pub fn extract(&self, report: &Report) -> Result<ExtractedText, PipelineError> {
        let extracted = self.extractor.extract(report).inspect_err(|e| {
            warn!("extraction failed for {}: {e}", report.filename);
        })?;
        info!(
            "extracted method={:?} pages={} chars={}",
            extracted.method,
            extracted.page_count,
            extracted.text.len()
        );
        if extracted.is_blank() {
            return Err(PipelineError::NoText);
        }
        Ok(extracted)
    }

    pub fn parse(&self, raw_text: &str) -> LabValueMap {
        let labs = self.parser.parse(raw_text);
        if labs.is_empty() {
            info!("no structured lab values; summarising free text");
        } else {
            info!("lab values parsed count={}", labs.len());
        }
        labs
    }

    pub fn prompt(&self, raw_text: &str, labs: &LabValueMap) -> String {
        crate::prompt::build_prompt(raw_text, labs)
    }

    pub fn summarize(&self, raw_text: &str, labs: &LabValueMap) -> Result<String, PipelineError> {
        Ok(narrative::generate_summary(
            self.llm.as_ref(),
            &self.sampling,
            raw_text,
            labs,
        )?)
    }

    /// Extractor → parser → generator.
    pub fn run(&self, report: &Report) -> Result<Analysis, PipelineError> {
        let started = now_rfc3339();
        let report_id = report.id();
        info!("report_id={report_id} file={} bytes={}", report.filename, report.bytes.len());

        self.admit(report)?;
        let extracted = self.extract(report)?;
        let lab_values = self.parse(&extracted.text);
        let summary = self.summarize(&extracted.text, &lab_values)?;

        Ok(Analysis {
            report_id,
            filename: report.filename.clone(),
            format: report.format(),
            page_count: extracted.page_count,
            raw_text: extracted.text,
            lab_values,
            summary,
            started,
            finished: now_rfc3339(),
        })
    }
}
