//! Prompt Templates for AI Operations
//!
//! Builds the generation and modification prompts sent to the AI, including
//! inline context from attached documents.

use crate::models::{Requirement, TestCase, TestabilityType};
use crate::services::Attachment;

/// Describe an attachment for the prompt.
///
/// Plain-text files are inlined; anything else is referenced by name.
fn attachment_context(attachment: &Attachment) -> String {
    match attachment.text() {
        Some(text) => format!("Reference text file '{}':\n{}", attachment.name, text),
        None => format!(
            "Reference document: {} ({})",
            attachment.name, attachment.mime_type
        ),
    }
}

fn append_attachments<'a, I>(prompt: &mut String, attachments: I)
where
    I: IntoIterator<Item = &'a Attachment>,
{
    for attachment in attachments {
        prompt.push_str("\n\n");
        prompt.push_str(&attachment_context(attachment));
    }
}

/// Render test cases the way the modification prompts show them
fn format_test_cases(cases: &[TestCase]) -> String {
    let mut text = String::new();
    for tc in cases {
        text.push_str(&format!(
            r#"
Test Case ID: {}
Description: {}
Preconditions: {}
Steps: {}
Expected Result: {}
Postconditions: {}
---
"#,
            tc.test_case_id,
            tc.content.description,
            tc.content.preconditions,
            tc.content.steps.join("; "),
            tc.content.expected_result,
            tc.content.postconditions
        ));
    }
    text
}

/// Build the prompt for generating test cases
pub fn build_generation_prompt(
    requirements: &[Requirement],
    testability: TestabilityType,
    document: Option<&Attachment>,
) -> String {
    let requirements_json =
        serde_json::to_string_pretty(requirements).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        r#"Generate comprehensive test cases for the following requirements using the **{testability}** testing approach.

Requirements:
{requirements_json}

For each requirement, generate detailed test cases with:
- Unique test case ID
- Clear description
- Preconditions
- Step-by-step test input steps
- Step-by-step expected output
- Postconditions

Format the response as a JSON array of test cases with this structure:
[
  {{
    "testCaseId": "TC_001",
    "RequirmentId": "REQ_001",
    "description": "Test description",
    "preconditions": "System preconditions",
    "Input steps": ["Step 1", "Step 2"],
    "expectedResult Steps": ["Output 1", "Output 2"],
    "postconditions": "System postconditions"
  }}
]

Focus on {testability} testing characteristics:
- Blackbox: {blackbox}
- Graybox: {graybox}
- Whitebox: {whitebox}

Respond ONLY with the JSON array."#,
        blackbox = TestabilityType::Blackbox.focus(),
        graybox = TestabilityType::Graybox.focus(),
        whitebox = TestabilityType::Whitebox.focus(),
    );

    append_attachments(&mut prompt, document);
    prompt
}

/// Build the prompt for modifying or splitting one requirement group
pub fn build_modification_prompt(
    group: &[TestCase],
    requirement_id: &str,
    instruction: &str,
    split: bool,
    attachments: &[Attachment],
) -> String {
    let test_cases_text = format_test_cases(group);

    let mut prompt = if split {
        format!(
            r#"Below are test cases that need to be split according to the user's instruction.

Original Test Cases:
{test_cases_text}
User wants to split the test cases with this instruction:
"{instruction}"

Split each test case into multiple new test cases as requested. Each new test case should cover a different aspect or scenario of the original.

Return the new test cases as a JSON array. Each split test case should have:
- A unique testCaseId (e.g., TC_001_A, TC_001_B for splits of TC_001)
- The same requirementId as the original
- A focused description for its scenario
- Appropriate preconditions, steps, and expected result
- The same postconditions, or modified ones as needed

Format:
[
  {{
    "testCaseId": "TC_001_A",
    "requirementId": "{requirement_id}",
    "description": "Specific scenario A description",
    "preconditions": "Preconditions for scenario A",
    "steps": ["Step 1", "Step 2"],
    "expectedResult": "Expected result for scenario A",
    "postconditions": "Postconditions for scenario A"
  }}
]

Respond ONLY with the JSON array."#
        )
    } else {
        format!(
            r#"Below are test cases that need to be modified according to the user's instruction.

Original Test Cases:
{test_cases_text}
User wants to modify the test cases with this instruction:
"{instruction}"

Return the updated versions of these test cases, applying the requested modifications, as a JSON array with this exact structure:
[
  {{
    "testCaseId": "TC_001",
    "requirementId": "{requirement_id}",
    "description": "Updated description",
    "preconditions": "Updated preconditions",
    "steps": ["Step 1", "Step 2"],
    "expectedResult": "Updated expected result",
    "postconditions": "Updated postconditions"
  }}
]

Preserve the original test case IDs and requirement IDs.
Respond ONLY with the JSON array."#
        )
    };

    append_attachments(&mut prompt, attachments);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestCaseContent, TestCaseDraft};
    use chrono::Utc;
    use uuid::Uuid;

    fn group() -> Vec<TestCase> {
        let content = TestCaseContent {
            description: "Brake light turns on".to_string(),
            steps: vec!["Press pedal".to_string(), "Observe lamp".to_string()],
            ..Default::default()
        };
        vec![TestCase::from_draft(
            Uuid::new_v4(),
            TestCaseDraft::new("TC_001", "REQ_001", content),
            Utc::now(),
        )]
    }

    #[test]
    fn test_generation_prompt_contents() {
        let reqs = vec![Requirement::new("REQ_001", "Brake light on pedal press")];
        let prompt = build_generation_prompt(&reqs, TestabilityType::Whitebox, None);

        assert!(prompt.contains("**Whitebox** testing approach"));
        assert!(prompt.contains("\"id\": \"REQ_001\""));
        assert!(prompt.contains("\"Input steps\""));
        assert!(prompt.contains("internal code structure"));
    }

    #[test]
    fn test_modification_prompt_modes() {
        let cases = group();

        let modify = build_modification_prompt(&cases, "REQ_001", "add timing", false, &[]);
        assert!(modify.contains("Steps: Press pedal; Observe lamp"));
        assert!(modify.contains("\"add timing\""));
        assert!(modify.contains("Preserve the original test case IDs"));

        let split = build_modification_prompt(&cases, "REQ_001", "split into 2", true, &[]);
        assert!(split.contains("TC_001_A"));
        assert!(split.contains("\"requirementId\": \"REQ_001\""));
    }

    #[test]
    fn test_attachments_inline_text_only() {
        let attachments = vec![
            Attachment::new("limits.txt", "text/plain", b"max 120 km/h".to_vec()),
            Attachment::new("wiring.pdf", "application/pdf", vec![1, 2, 3]),
        ];
        let prompt = build_modification_prompt(&group(), "REQ_001", "x", false, &attachments);

        assert!(prompt.contains("Reference text file 'limits.txt':\nmax 120 km/h"));
        assert!(prompt.contains("Reference document: wiring.pdf (application/pdf)"));
    }
}
