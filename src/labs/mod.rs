pub mod grammar;
pub mod legacy;

use crate::config::Labs;
use anyhow::{Result, bail};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Test name to formatted value (`"13.5 g/dL"`, or just `"90"` without a unit).
///
/// Keeps first-insertion order; inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabValueMap {
    entries: Vec<(String, String)>,
}

impl LabValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for LabValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// `"<number> <unit>"`, or the bare number when there is no unit.
pub(crate) fn format_value(number: &str, unit: Option<&str>) -> String {
    format!("{} {}", number, unit.unwrap_or("")).trim().to_string()
}

/// The two lab-value scanners.
pub enum LabParser {
    Grammar(grammar::GrammarParser),
    Legacy(legacy::LegacyParser),
}

impl LabParser {
    pub fn from_config(cfg: &Labs) -> Result<Self> {
        match cfg.mode.as_str() {
            "grammar" => Ok(LabParser::Grammar(grammar::GrammarParser::new(cfg))),
            "legacy" => Ok(LabParser::Legacy(legacy::LegacyParser::new()?)),
            other => bail!("unknown labs.mode: {other}"),
        }
    }

    /// Never fails; an empty map means "summarise the free text".
    pub fn parse(&self, text: &str) -> LabValueMap {
        match self {
            LabParser::Grammar(p) => p.parse(text),
            LabParser::Legacy(p) => p.parse(text),
        }
    }
}
