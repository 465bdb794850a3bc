//! Requirement extraction from tabular text documents
//!
//! Understands YAML/JSON requirement lists and delimited text tables. The
//! richer document formats (PDF, spreadsheets, scanned images) belong to
//! external extraction services behind [`ExtractionService`].

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::models::Requirement;
use crate::services::ExtractionService;

const MISSING_DESCRIPTION: &str = "No description available";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse document: {0}")]
    Parse(String),
}

/// Entry shape accepted in YAML and JSON documents
#[derive(Debug, Deserialize)]
struct RequirementEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementExtractor;

impl RequirementExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse document text already read into memory.
    ///
    /// `extension` selects the format and is matched case-insensitively.
    pub fn parse(&self, extension: &str, content: &str) -> Result<Vec<Requirement>, ExtractError> {
        let requirements = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                let entries: Vec<RequirementEntry> = serde_yaml::from_str(content)
                    .map_err(|e| ExtractError::Parse(e.to_string()))?;
                from_entries(entries)
            }
            "json" => {
                let entries: Vec<RequirementEntry> = serde_json::from_str(content)
                    .map_err(|e| ExtractError::Parse(e.to_string()))?;
                from_entries(entries)
            }
            "csv" => from_table(content, ','),
            "tsv" | "txt" => from_table(content, '\t'),
            other => return Err(ExtractError::UnsupportedFileType(other.to_string())),
        };

        debug!(count = requirements.len(), extension, "extracted requirements");
        Ok(requirements)
    }
}

impl ExtractionService for RequirementExtractor {
    fn extract(&self, document: &Path) -> Result<Vec<Requirement>, ExtractError> {
        let extension = document
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        if !matches!(
            extension.to_lowercase().as_str(),
            "yaml" | "yml" | "json" | "csv" | "tsv" | "txt"
        ) {
            return Err(ExtractError::UnsupportedFileType(extension));
        }

        let content = fs::read_to_string(document)?;
        self.parse(&extension, &content)
    }
}

fn requirement(index: usize, id: Option<String>, description: Option<String>, category: Option<String>) -> Requirement {
    let id = id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("REQ_{:03}", index + 1));
    let description = description
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_DESCRIPTION.to_string());
    let category = category
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Requirement {
        id,
        description,
        category,
    }
}

fn from_entries(entries: Vec<RequirementEntry>) -> Vec<Requirement> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| requirement(i, e.id, e.description, e.category))
        .collect()
}

/// Split delimited text into records, honouring double-quoted cells.
///
/// Line breaks inside quotes stay part of the cell.
fn split_records(content: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                cells.push(std::mem::take(&mut current));
                records.push(std::mem::take(&mut cells));
            }
            c if c == delimiter && !in_quotes => cells.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if !current.is_empty() || !cells.is_empty() {
        cells.push(current);
        records.push(cells);
    }
    records
}

fn is_header(cells: &[String]) -> bool {
    cells
        .first()
        .map(|c| matches!(c.trim().to_lowercase().as_str(), "id" | "unique id"))
        .unwrap_or(false)
}

fn from_table(content: &str, delimiter: char) -> Vec<Requirement> {
    let mut rows: Vec<Vec<String>> = split_records(content, delimiter)
        .into_iter()
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .collect();

    if rows.first().map(|r| is_header(r)).unwrap_or(false) {
        rows.remove(0);
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, cells)| {
            let mut cells = cells.into_iter();
            let id = cells.next();
            let description = cells.next();
            let category = cells.next();
            requirement(i, id, description, category)
        })
        .collect()
}
