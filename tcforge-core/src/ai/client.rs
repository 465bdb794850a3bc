//! AI Client Module
//!
//! Runs an external AI command line per request and turns its answers into
//! test case drafts and modification outcomes.

use crate::ai::prompts;
use crate::ai::responses;
use crate::config::{AiSettings, AI_COMMAND_ENV};
use crate::models::{Requirement, TestCase, TestCaseDraft, TestabilityType};
use crate::resolver::ModificationOutcome;
use crate::services::{Attachment, GenerationService, ModificationRequest, ModificationService};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during AI operations
#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI command not found at {0}")]
    CliNotFound(PathBuf),

    #[error("AI command execution failed: {0}")]
    CliExecFailed(String),

    #[error("Invalid response from AI: {0}")]
    InvalidResponse(String),

    #[error("AI integration not available")]
    NotAvailable,
}

/// AI operation mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AiMode {
    /// Run `path` with `args` followed by the prompt, reading stdout
    Cli { path: PathBuf, args: Vec<String> },
    /// AI features disabled
    #[default]
    Disabled,
}

/// AI client backing the generation and modification services
#[derive(Debug, Clone, Default)]
pub struct AiClient {
    mode: AiMode,
}

impl AiClient {
    /// Create a client from settings; `TCFORGE_AI_COMMAND` wins over `ai.command`
    pub fn new(settings: &AiSettings) -> Self {
        let mode = Self::detect_mode(settings, std::env::var(AI_COMMAND_ENV).ok());
        Self { mode }
    }

    /// Create a client with a specific mode
    pub fn with_mode(mode: AiMode) -> Self {
        Self { mode }
    }

    fn detect_mode(settings: &AiSettings, env_command: Option<String>) -> AiMode {
        let command = env_command
            .filter(|c| !c.trim().is_empty())
            .or_else(|| settings.command.clone())
            .filter(|c| !c.trim().is_empty());

        match command {
            Some(command) => AiMode::Cli {
                path: PathBuf::from(command.trim()),
                args: settings.args.clone(),
            },
            None => AiMode::Disabled,
        }
    }

    /// Check if AI features are available
    pub fn is_available(&self) -> bool {
        match &self.mode {
            AiMode::Cli { path, .. } => resolve_command(path).is_some(),
            AiMode::Disabled => false,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> &AiMode {
        &self.mode
    }

    /// Get a description of the current mode
    pub fn mode_description(&self) -> String {
        match &self.mode {
            AiMode::Cli { path, .. } => format!("AI command ({})", path.display()),
            AiMode::Disabled => "Disabled".to_string(),
        }
    }

    /// Send a request to the AI
    fn send_request(&self, prompt: &str) -> Result<String, AiError> {
        match &self.mode {
            AiMode::Cli { path, args } => self.send_cli_request(path, args, prompt),
            AiMode::Disabled => Err(AiError::NotAvailable),
        }
    }

    /// Send request via the configured command line
    fn send_cli_request(&self, path: &Path, args: &[String], prompt: &str) -> Result<String, AiError> {
        let program = resolve_command(path).ok_or_else(|| AiError::CliNotFound(path.to_path_buf()))?;

        debug!(program = %program.display(), prompt_len = prompt.len(), "sending AI request");
        let output = Command::new(&program)
            .args(args)
            .arg(prompt)
            .output()
            .map_err(|e| AiError::CliExecFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AiError::CliExecFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).to_string();

        if response.trim().is_empty() {
            return Err(AiError::InvalidResponse("Empty response from AI command".to_string()));
        }

        Ok(response)
    }
}

/// Resolves a bare program name through `PATH`; explicit paths must exist
fn resolve_command(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 {
        return path.exists().then(|| path.to_path_buf());
    }

    let output = Command::new("which").arg(path).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let found = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    found.exists().then_some(found)
}

/// Split cases into requirement groups, keeping first-seen order
fn group_by_requirement(cases: &[TestCase]) -> Vec<(&str, Vec<TestCase>)> {
    let mut groups: Vec<(&str, Vec<TestCase>)> = Vec::new();
    for case in cases {
        match groups
            .iter_mut()
            .find(|(req, _)| *req == case.requirement_id.as_str())
        {
            Some((_, members)) => members.push(case.clone()),
            None => groups.push((case.requirement_id.as_str(), vec![case.clone()])),
        }
    }
    groups
}

impl GenerationService for AiClient {
    fn generate(
        &self,
        requirements: &[Requirement],
        testability: TestabilityType,
        document: Option<&Attachment>,
    ) -> Result<Vec<TestCaseDraft>, AiError> {
        let prompt = prompts::build_generation_prompt(requirements, testability, document);
        let response = self.send_request(&prompt)?;
        let drafts = responses::parse_generated_cases(&response, testability)?;
        info!(
            requirements = requirements.len(),
            generated = drafts.len(),
            "generated test cases"
        );
        Ok(drafts)
    }
}

impl ModificationService for AiClient {
    /// One AI call per requirement group; any failed group fails the whole
    /// request so nothing is applied partially.
    fn modify(&self, request: &ModificationRequest<'_>) -> Result<ModificationOutcome, AiError> {
        let mut payloads = Vec::new();

        for (requirement_id, group) in group_by_requirement(request.test_cases) {
            let prompt = prompts::build_modification_prompt(
                &group,
                requirement_id,
                request.instruction,
                request.split,
                request.attachments,
            );
            let response = self.send_request(&prompt)?;
            let raws = responses::parse_raw_cases(&response)?;

            let mut produced = if request.split {
                responses::split_payloads(raws, &group, payloads.len())
            } else {
                responses::revision_payloads(raws, &group)
            };
            debug!(requirement_id, produced = produced.len(), "modification group answered");
            payloads.append(&mut produced);
        }

        Ok(ModificationOutcome::new(payloads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestCaseContent;
    use crate::resolver::PayloadTarget;
    use chrono::Utc;
    use uuid::Uuid;

    fn case(key: &str, requirement: &str) -> TestCase {
        TestCase::from_draft(
            Uuid::new_v4(),
            TestCaseDraft::new(key, requirement, TestCaseContent::with_description(key)),
            Utc::now(),
        )
    }

    #[test]
    fn test_disabled_mode() {
        let client = AiClient::with_mode(AiMode::Disabled);
        assert!(!client.is_available());
        assert_eq!(client.mode_description(), "Disabled");

        let result = client.generate(&[], TestabilityType::Blackbox, None);
        assert!(matches!(result, Err(AiError::NotAvailable)));
    }

    #[test]
    fn test_mode_detection_prefers_env_command() {
        let settings = AiSettings {
            command: Some("claude".to_string()),
            args: vec!["--print".to_string(), "-p".to_string()],
        };
        let mode = AiClient::detect_mode(&settings, Some("other".to_string()));
        assert_eq!(
            mode,
            AiMode::Cli {
                path: PathBuf::from("other"),
                args: vec!["--print".to_string(), "-p".to_string()],
            }
        );

        let mode = AiClient::detect_mode(&settings, Some("  ".to_string()));
        assert!(matches!(mode, AiMode::Cli { ref path, .. } if path == Path::new("claude")));

        let mode = AiClient::detect_mode(&AiSettings::default(), Some("other".to_string()));
        assert!(matches!(mode, AiMode::Cli { ref path, .. } if path == Path::new("other")));

        let mode = AiClient::detect_mode(&AiSettings::default(), None);
        assert_eq!(mode, AiMode::Disabled);
    }

    #[test]
    fn test_missing_command_reports_not_found() {
        let client = AiClient::with_mode(AiMode::Cli {
            path: PathBuf::from("/nonexistent/tcforge-ai"),
            args: vec![],
        });
        assert!(!client.is_available());
        let result = client.generate(&[], TestabilityType::Blackbox, None);
        assert!(matches!(result, Err(AiError::CliNotFound(_))));
    }

    #[test]
    fn test_group_by_requirement_keeps_first_seen_order() {
        let cases = vec![
            case("TC_001", "REQ_002"),
            case("TC_002", "REQ_001"),
            case("TC_003", "REQ_002"),
        ];
        let groups = group_by_requirement(&cases);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "REQ_002");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "REQ_001");
    }

    #[cfg(unix)]
    fn echo_client(output: &str) -> AiClient {
        // `sh -c <script> <prompt>`: the prompt lands in $0 and is ignored
        AiClient::with_mode(AiMode::Cli {
            path: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), format!("printf '%s' '{}'", output)],
        })
    }

    #[cfg(unix)]
    #[test]
    fn test_generate_through_command() {
        let client = echo_client(
            r#"[{"testCaseId": "TC_001", "RequirmentId": "REQ_001", "description": "d", "Input steps": ["a"]}]"#,
        );
        let reqs = vec![Requirement::new("REQ_001", "desc")];

        let drafts = client
            .generate(&reqs, TestabilityType::Graybox, None)
            .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].requirement_id, "REQ_001");
        assert_eq!(drafts[0].content.steps, vec!["a"]);
        assert_eq!(drafts[0].content.testability_type, "graybox");
    }

    #[cfg(unix)]
    #[test]
    fn test_modify_through_command() {
        let client = echo_client(r#"[{"testCaseId": "TC_001", "description": "revised"}]"#);
        let cases = vec![case("TC_001", "REQ_001")];

        let outcome = client
            .modify(&ModificationRequest {
                test_cases: &cases,
                instruction: "rewrite",
                split: false,
                attachments: &[],
            })
            .unwrap();

        assert_eq!(outcome.payloads.len(), 1);
        assert_eq!(outcome.payloads[0].target, PayloadTarget::Revision(cases[0].id));
        assert_eq!(outcome.payloads[0].draft.content.description, "revised");
    }

    #[cfg(unix)]
    #[test]
    fn test_unparseable_answer_is_invalid_response() {
        let client = echo_client("sorry, no JSON today");
        let cases = vec![case("TC_001", "REQ_001")];

        let result = client.modify(&ModificationRequest {
            test_cases: &cases,
            instruction: "rewrite",
            split: true,
            attachments: &[],
        });

        assert!(matches!(result, Err(AiError::InvalidResponse(_))));
    }
}
