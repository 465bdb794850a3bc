//! Collaborator contracts consumed by the session
//!
//! Extraction, generation and modification are external services. The
//! session only depends on these traits; `AiClient` and
//! `RequirementExtractor` are the shipped implementations.

use std::fs;
use std::path::Path;

use crate::ai::AiError;
use crate::extract::ExtractError;
use crate::models::{Requirement, TestCase, TestCaseDraft, TestabilityType};
use crate::resolver::ModificationOutcome;

/// A file handed to a collaborator as supporting context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Reads a file and guesses its MIME type from the extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_type_for(path), data))
    }

    /// The attachment's text, when it is a plain-text file
    pub fn text(&self) -> Option<String> {
        if self.mime_type == "text/plain" {
            Some(String::from_utf8_lossy(&self.data).into_owned())
        } else {
            None
        }
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") | Some("csv") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Turns a requirements document into a requirement list
pub trait ExtractionService {
    fn extract(&self, document: &Path) -> Result<Vec<Requirement>, ExtractError>;
}

/// Generates test case drafts for selected requirements
pub trait GenerationService {
    fn generate(
        &self,
        requirements: &[Requirement],
        testability: TestabilityType,
        document: Option<&Attachment>,
    ) -> Result<Vec<TestCaseDraft>, AiError>;
}

/// Everything the modification service receives for one call
#[derive(Debug, Clone, Copy)]
pub struct ModificationRequest<'a> {
    pub test_cases: &'a [TestCase],
    pub instruction: &'a str,
    pub split: bool,
    pub attachments: &'a [Attachment],
}

/// Revises or replaces selected test cases following an instruction
pub trait ModificationService {
    fn modify(&self, request: &ModificationRequest<'_>) -> Result<ModificationOutcome, AiError>;
}
