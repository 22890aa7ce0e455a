use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub labs: Labs,
    #[serde(default)]
    pub llm: Llm,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
    pub reject_url_inputs: bool,
}
impl Default for Input {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["pdf".into(), "png".into(), "jpg".into(), "jpeg".into()],
            max_bytes: 25 * 1024 * 1024,
            reject_url_inputs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    /// Path to the tesseract binary, or "auto" to search PATH.
    pub tesseract_cmd: String,
    pub langs: String,
    pub extra_args: Vec<String>,
    pub timeout_seconds: u64,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            tesseract_cmd: "auto".into(),
            langs: "eng".into(),
            extra_args: Vec::new(),
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Labs {
    /// "grammar" or "legacy".
    pub mode: String,
    pub max_name_words: usize,
    pub max_name_chars: usize,
    pub units: Vec<String>,
    pub ignore_names: Vec<String>,
}
impl Default for Labs {
    fn default() -> Self {
        Self {
            mode: "grammar".into(),
            max_name_words: 4,
            max_name_chars: 40,
            units: default_units(),
            ignore_names: [
                "page", "age", "date", "dob", "time", "phone", "tel", "fax", "room", "bed", "id",
                "mrn", "zip", "no", "number",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

fn default_units() -> Vec<String> {
    [
        "%", "g", "mg", "mcg", "µg", "ug", "ng", "pg", "kg", "lb", "lbs", "g/dL", "g/L", "mg/dL",
        "mg/L", "mg/g", "µg/dL", "ug/dL", "mcg/dL", "µg/L", "ug/L", "ng/dL", "ng/mL", "pg/mL",
        "mmol/L", "µmol/L", "umol/L", "nmol/L", "pmol/L", "mEq/L", "mOsm/kg", "IU/L", "IU/mL",
        "U/L", "mU/L", "mIU/L", "mIU/mL", "µIU/mL", "uIU/mL", "fL", "cm", "mm", "mmHg", "bpm",
        "/min", "sec", "s", "mL/min", "mL/min/1.73m2", "10^3/uL", "10^3/µL", "x10^3/uL",
        "10^6/uL", "10^6/µL", "x10^6/uL", "10^9/L", "x10^9/L", "10^12/L", "x10^12/L", "K/uL",
        "M/uL", "/uL", "/µL", "/mm3", "cells/uL", "ratio",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Llm {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}
impl Default for Llm {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.7,
            max_tokens: 800,
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub max_upload_bytes: u64,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".into(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "logs/medreport-analyzer.log".into(),
        }
    }
}
