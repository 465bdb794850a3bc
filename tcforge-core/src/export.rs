use crate::models::TestCase;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// File name used when the caller does not pick one
pub const DEFAULT_CSV_NAME: &str = "selected-test-cases.csv";

const CSV_HEADER: [&str; 8] = [
    "Test Case ID",
    "Requirement ID",
    "Description",
    "Preconditions",
    "Steps",
    "Expected Result",
    "Postconditions",
    "Testability Type",
];

/// The exported view of a test case.
///
/// Row ids, versions and timestamps are internal and never leave the tool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub test_case_id: String,
    pub requirement_id: String,
    pub description: String,
    pub preconditions: String,
    pub steps: Vec<String>,
    pub expected_result: String,
    pub postconditions: String,
    pub testability_type: String,
}

impl From<&TestCase> for ExportRow {
    fn from(tc: &TestCase) -> Self {
        Self {
            test_case_id: tc.test_case_id.clone(),
            requirement_id: tc.requirement_id.clone(),
            description: tc.content.description.clone(),
            preconditions: tc.content.preconditions.clone(),
            steps: tc.content.steps.clone(),
            expected_result: tc.content.expected_result.clone(),
            postconditions: tc.content.postconditions.clone(),
            testability_type: tc.content.testability_type.clone(),
        }
    }
}

impl ExportRow {
    fn cells(&self) -> [String; 8] {
        [
            self.test_case_id.clone(),
            self.requirement_id.clone(),
            self.description.clone(),
            self.preconditions.clone(),
            self.steps.join("; "),
            self.expected_result.clone(),
            self.postconditions.clone(),
            self.testability_type.clone(),
        ]
    }
}

/// Build export rows for `cases`, keeping their order
pub fn export_rows<'a, I>(cases: I) -> Vec<ExportRow>
where
    I: IntoIterator<Item = &'a TestCase>,
{
    cases.into_iter().map(ExportRow::from).collect()
}

/// Quote a CSV cell when it contains a comma, a quote or a line break
fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render rows as CSV text with a header line
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut output = CSV_HEADER.join(",");
    output.push('\n');

    for row in rows {
        let line: Vec<String> = row.cells().iter().map(|c| csv_cell(c)).collect();
        output.push_str(&line.join(","));
        output.push('\n');
    }

    output
}

/// Export rows to a CSV file
pub fn export_csv(rows: &[ExportRow], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    fs::write(output_path, to_csv(rows))
        .with_context(|| format!("Failed to write CSV export to {:?}", output_path))?;

    info!(path = %output_path.display(), rows = rows.len(), "exported CSV");
    Ok(())
}

/// Export rows to JSON format
pub fn export_json(rows: &[ExportRow], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON export to {:?}", output_path))?;

    info!(path = %output_path.display(), rows = rows.len(), "exported JSON");
    Ok(())
}
