//! Rules file loading.
//!
//! Two formats are accepted:
//! - JSON: `{"rules": [{"source": ..., "destination": ..., "exclude": {...}}, ...]}`
//! - Lines: one `source -> destination` mapping per line; blank lines and lines
//!   starting with `#` are ignored
//!
//! Both produce raw records for [`crate::rules::validate`]; no checks beyond
//! syntax happen here.

use crate::error::ConfigError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// Separator between source and destination in the line format.
pub const LINE_SEPARATOR: &str = "->";

/// Rules file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesFormat {
    Json,
    Lines,
}

impl RulesFormat {
    /// Pick a format from the file extension: `.json` is JSON, anything else lines.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RulesFormat::Json,
            _ => RulesFormat::Lines,
        }
    }

    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "lines" | "txt" => Some(Self::Lines),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RulesDocument {
    rules: Option<Vec<Value>>,
}

/// Parse a JSON rules document into raw records.
pub fn parse_json(content: &str) -> Result<Vec<Value>, ConfigError> {
    let document: RulesDocument = serde_json::from_str(content)?;
    document.rules.ok_or(ConfigError::MissingRules)
}

/// Parse the line format into raw records.
pub fn parse_lines(content: &str) -> Result<Vec<Value>, ConfigError> {
    let mut records = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (source, destination) =
            trimmed
                .split_once(LINE_SEPARATOR)
                .ok_or_else(|| ConfigError::MalformedLine {
                    line: number + 1,
                    content: line.to_string(),
                })?;

        records.push(json!({
            "source": source.trim(),
            "destination": destination.trim(),
        }));
    }

    Ok(records)
}

/// Read and parse a rules file.
pub fn load_rules(path: &Path, format: RulesFormat) -> Result<Vec<Value>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    match format {
        RulesFormat::Json => parse_json(&content),
        RulesFormat::Lines => parse_lines(&content),
    }
}
