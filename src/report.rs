use crate::{labs::LabValueMap, util::sha256_hex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Pdf,
    Image,
}

impl ReportFormat {
    /// `.pdf` (any case) is a PDF; every other name is treated as a raster image.
    pub fn from_filename(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".pdf") {
            ReportFormat::Pdf
        } else {
            ReportFormat::Image
        }
    }
}

/// One uploaded report. Lives for a single request.
#[derive(Debug, Clone)]
pub struct Report {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Report {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading input: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    pub fn format(&self) -> ReportFormat {
        ReportFormat::from_filename(&self.filename)
    }

    pub fn id(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub report_id: String,
    pub filename: String,
    pub format: ReportFormat,
    pub page_count: usize,
    pub raw_text: String,
    pub lab_values: LabValueMap,
    pub summary: String,
    pub started: String,
    pub finished: String,
}
