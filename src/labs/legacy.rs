use super::{LabValueMap, format_value};
use anyhow::Result;
use regex::Regex;

/// The original single-pattern scan: `name [:] number [word]`.
///
/// Names are a greedy run of letters and whitespace (newlines included) and
/// units are not validated, so dates, ages and page numbers come through too.
pub struct LegacyParser {
    pattern: Regex,
}

impl LegacyParser {
    pub const PATTERN: &'static str = r"([A-Za-z\s]+):?\s*([\d.]+)\s*(\w+)?";

    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(Self::PATTERN)?,
        })
    }

    pub fn parse(&self, text: &str) -> LabValueMap {
        let mut map = LabValueMap::new();
        for caps in self.pattern.captures_iter(text) {
            let name = caps.get(1).map_or("", |m| m.as_str()).trim();
            let number = caps.get(2).map_or("", |m| m.as_str());
            let unit = caps.get(3).map(|m| m.as_str());
            map.insert(name.to_string(), format_value(number, unit));
        }
        map
    }
}
