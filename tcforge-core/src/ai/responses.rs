//! Response Parsing Module
//!
//! Parses the JSON test case arrays returned by the AI into drafts and
//! modification payloads.

use crate::ai::client::AiError;
use crate::models::{TestCase, TestCaseContent, TestCaseDraft, TestabilityType};
use crate::resolver::OutcomePayload;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// A field the AI may send either as one string or as a list of lines
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextOrLines {
    Text(String),
    Lines(Vec<Value>),
}

impl TextOrLines {
    fn lines(self) -> Vec<String> {
        match self {
            TextOrLines::Text(text) if text.trim().is_empty() => Vec::new(),
            TextOrLines::Text(text) => vec![text],
            TextOrLines::Lines(items) => items.into_iter().map(value_text).collect(),
        }
    }

    fn joined(self) -> String {
        match self {
            TextOrLines::Text(text) => text,
            TextOrLines::Lines(items) => items
                .into_iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// One test case object as the AI writes it.
///
/// Both the generation field names (`RequirmentId`, `Input steps`,
/// `expectedResult Steps`) and the modification names are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTestCase {
    #[serde(rename = "testCaseId")]
    pub test_case_id: Option<String>,
    #[serde(rename = "requirementId")]
    pub requirement_id: Option<String>,
    #[serde(rename = "RequirmentId")]
    pub requirement_id_alt: Option<String>,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    #[serde(rename = "Input steps")]
    pub input_steps: Option<TextOrLines>,
    pub steps: Option<TextOrLines>,
    #[serde(rename = "expectedResult Steps")]
    pub expected_result_steps: Option<TextOrLines>,
    #[serde(rename = "expectedResult")]
    pub expected_result: Option<TextOrLines>,
    pub postconditions: Option<String>,
}

impl RawTestCase {
    fn requirement(&mut self) -> Option<String> {
        self.requirement_id
            .take()
            .filter(|id| !id.is_empty())
            .or_else(|| self.requirement_id_alt.take())
    }

    fn steps(&mut self) -> Option<Vec<String>> {
        self.input_steps
            .take()
            .or_else(|| self.steps.take())
            .map(TextOrLines::lines)
    }

    fn expected(&mut self) -> Option<String> {
        self.expected_result_steps
            .take()
            .or_else(|| self.expected_result.take())
            .map(TextOrLines::joined)
    }

    /// Content with every missing field taken from `fallback`
    fn content_over(mut self, fallback: &TestCaseContent) -> TestCaseContent {
        TestCaseContent {
            steps: self.steps().unwrap_or_else(|| fallback.steps.clone()),
            expected_result: self
                .expected()
                .unwrap_or_else(|| fallback.expected_result.clone()),
            description: self
                .description
                .unwrap_or_else(|| fallback.description.clone()),
            preconditions: self
                .preconditions
                .unwrap_or_else(|| fallback.preconditions.clone()),
            postconditions: self
                .postconditions
                .unwrap_or_else(|| fallback.postconditions.clone()),
            testability_type: fallback.testability_type.clone(),
        }
    }
}

/// Extract the JSON array from a response that may contain prose or
/// markdown code blocks
fn extract_json_array(response: &str) -> &str {
    // Look for JSON in markdown code block
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            let block = response[json_start..json_start + end].trim();
            if block.starts_with('[') {
                return block;
            }
        }
    }

    // Outermost brackets
    if let Some(start) = response.find('[') {
        if let Some(end) = response.rfind(']') {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response.trim()
}

/// Parse a test case array from AI output
pub fn parse_raw_cases(response: &str) -> Result<Vec<RawTestCase>, AiError> {
    let json_str = extract_json_array(response);
    serde_json::from_str(json_str).map_err(|e| {
        AiError::InvalidResponse(format!(
            "Failed to parse test case array: {}. JSON: {}",
            e,
            &json_str[..floor_char_boundary(json_str, 200)]
        ))
    })
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Parse a generation response into drafts of the requested testability
pub fn parse_generated_cases(
    response: &str,
    testability: TestabilityType,
) -> Result<Vec<TestCaseDraft>, AiError> {
    let fallback = TestCaseContent {
        testability_type: testability.as_str().to_string(),
        ..Default::default()
    };

    Ok(parse_raw_cases(response)?
        .into_iter()
        .enumerate()
        .map(|(i, mut raw)| {
            let test_case_id = raw
                .test_case_id
                .take()
                .unwrap_or_else(|| format!("TC_{:03}", i + 1));
            let requirement_id = raw.requirement().unwrap_or_default();
            TestCaseDraft::new(test_case_id, requirement_id, raw.content_over(&fallback))
        })
        .collect())
}

/// Turn a split response for one requirement group into new-entity payloads.
///
/// `offset` is the number of split payloads produced for earlier groups and
/// only feeds the default `TC_{n:03}` id.
pub fn split_payloads(
    raws: Vec<RawTestCase>,
    group: &[TestCase],
    offset: usize,
) -> Vec<OutcomePayload> {
    let Some(first) = group.first() else {
        return Vec::new();
    };
    let fallback = TestCaseContent {
        testability_type: first.content.testability_type.clone(),
        ..Default::default()
    };

    raws.into_iter()
        .enumerate()
        .map(|(i, mut raw)| {
            let test_case_id = raw
                .test_case_id
                .take()
                .unwrap_or_else(|| format!("TC_{:03}", offset + i + 1));
            let requirement_id = raw
                .requirement()
                .unwrap_or_else(|| first.requirement_id.clone());
            OutcomePayload::new_case(TestCaseDraft::new(
                test_case_id,
                requirement_id,
                raw.content_over(&fallback),
            ))
        })
        .collect()
}

/// Map a modification response onto the cases of one group.
///
/// A case whose `testCaseId` matches is revised by it; otherwise the
/// payload takes the case at its own position, or the first case still
/// unmapped. Payloads left once every case is mapped are dropped.
pub fn revision_payloads(raws: Vec<RawTestCase>, group: &[TestCase]) -> Vec<OutcomePayload> {
    let mut mapped = vec![false; group.len()];
    let mut payloads = Vec::new();

    for (i, raw) in raws.into_iter().enumerate() {
        let by_key = raw.test_case_id.as_deref().and_then(|key| {
            group
                .iter()
                .enumerate()
                .position(|(j, c)| !mapped[j] && c.test_case_id == key)
        });
        let slot = by_key
            .or_else(|| (i < group.len() && !mapped[i]).then_some(i))
            .or_else(|| mapped.iter().position(|m| !m));

        let Some(slot) = slot else {
            warn!(
                index = i,
                test_case_id = raw.test_case_id.as_deref().unwrap_or("-"),
                "dropping modification payload with no matching test case"
            );
            continue;
        };
        mapped[slot] = true;

        let original = &group[slot];
        payloads.push(OutcomePayload::revision(
            original.id,
            TestCaseDraft::new(
                original.test_case_id.clone(),
                original.requirement_id.clone(),
                raw.content_over(&original.content),
            ),
        ));
    }

    payloads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PayloadTarget;
    use chrono::Utc;
    use uuid::Uuid;

    fn case(key: &str, description: &str, testability: &str) -> TestCase {
        let content = TestCaseContent {
            description: description.to_string(),
            preconditions: "ignition on".to_string(),
            steps: vec!["press start".to_string()],
            expected_result: "engine runs".to_string(),
            postconditions: "ignition off".to_string(),
            testability_type: testability.to_string(),
        };
        TestCase::from_draft(
            Uuid::new_v4(),
            TestCaseDraft::new(key, "REQ_001", content),
            Utc::now(),
        )
    }

    #[test]
    fn test_extract_json_array_from_markdown() {
        let response = r#"Here are the cases:

```json
[{"testCaseId": "TC_001"}]
```

Let me know if you need more."#;

        assert_eq!(extract_json_array(response), r#"[{"testCaseId": "TC_001"}]"#);
    }

    #[test]
    fn test_extract_json_array_from_prose() {
        let response = r#"Sure! [{"testCaseId": "TC_001", "steps": ["a"]}] Done."#;
        let json = extract_json_array(response);
        assert!(json.starts_with('['));
        assert!(json.ends_with(']'));
    }

    #[test]
    fn test_parse_generated_cases_with_generation_field_names() {
        let response = r#"```json
[
  {
    "testCaseId": "TC_001",
    "RequirmentId": "REQ_001",
    "description": "Valid login",
    "preconditions": "User exists",
    "Input steps": ["Open login page", "Submit credentials"],
    "expectedResult Steps": ["Dashboard shown", "Session cookie set"],
    "postconditions": "User logged in"
  },
  {
    "description": "Second case without id"
  }
]
```"#;

        let drafts = parse_generated_cases(response, TestabilityType::Graybox).unwrap();
        assert_eq!(drafts.len(), 2);

        let first = &drafts[0];
        assert_eq!(first.test_case_id, "TC_001");
        assert_eq!(first.requirement_id, "REQ_001");
        assert_eq!(first.content.steps.len(), 2);
        assert_eq!(
            first.content.expected_result,
            "Dashboard shown\nSession cookie set"
        );
        assert_eq!(first.content.testability_type, "graybox");

        assert_eq!(drafts[1].test_case_id, "TC_002");
        assert_eq!(drafts[1].requirement_id, "");
        assert!(drafts[1].content.steps.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let result = parse_raw_cases("I could not produce test cases.");
        assert!(matches!(result, Err(AiError::InvalidResponse(_))));
    }

    #[test]
    fn test_revision_payloads_match_by_id_then_position() {
        let group = vec![
            case("TC_001", "one", "blackbox"),
            case("TC_002", "two", "blackbox"),
        ];
        let raws = parse_raw_cases(
            r#"[
              {"testCaseId": "TC_002", "description": "two, revised"},
              {"testCaseId": "TC_999", "description": "one, revised", "expectedResult": ["a", "b"]},
              {"description": "extra"}
            ]"#,
        )
        .unwrap();

        let payloads = revision_payloads(raws, &group);

        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].target, PayloadTarget::Revision(group[1].id));
        assert_eq!(payloads[0].draft.content.description, "two, revised");
        assert_eq!(payloads[1].target, PayloadTarget::Revision(group[0].id));
        assert_eq!(payloads[1].draft.test_case_id, "TC_001");
        assert_eq!(payloads[1].draft.content.expected_result, "a\nb");
        // Missing fields come from the original
        assert_eq!(payloads[1].draft.content.preconditions, "ignition on");
        assert_eq!(payloads[1].draft.content.steps, vec!["press start"]);
    }

    #[test]
    fn test_split_payloads_inherit_group_defaults() {
        let group = vec![case("TC_001", "one", "whitebox")];
        let raws = parse_raw_cases(
            r#"[
              {"testCaseId": "TC_001_A", "description": "a", "steps": ["s1"]},
              {"description": "b", "requirementId": "REQ_009"}
            ]"#,
        )
        .unwrap();

        let payloads = split_payloads(raws, &group, 4);

        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.target == PayloadTarget::New));
        assert_eq!(payloads[0].draft.requirement_id, "REQ_001");
        assert_eq!(payloads[1].draft.test_case_id, "TC_006");
        assert_eq!(payloads[1].draft.requirement_id, "REQ_009");
        assert!(payloads
            .iter()
            .all(|p| p.draft.content.testability_type == "whitebox"));
        assert_eq!(payloads[1].draft.content.preconditions, "");
    }
}
