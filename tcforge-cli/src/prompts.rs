use anyhow::{Context, Result};
use inquire::{Confirm, MultiSelect, Select, Text};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use tcforge_core::{detect_split_intent, Attachment, Session, TestabilityType};

/// Main menu entries of the interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    SelectRequirements,
    Generate,
    ListTestCases,
    SelectTestCases,
    Modify,
    History,
    Restore,
    Export,
    Quit,
}

impl SessionAction {
    const ALL: [SessionAction; 9] = [
        SessionAction::SelectRequirements,
        SessionAction::Generate,
        SessionAction::ListTestCases,
        SessionAction::SelectTestCases,
        SessionAction::Modify,
        SessionAction::History,
        SessionAction::Restore,
        SessionAction::Export,
        SessionAction::Quit,
    ];
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionAction::SelectRequirements => "Select requirements",
            SessionAction::Generate => "Generate test cases",
            SessionAction::ListTestCases => "List test cases",
            SessionAction::SelectTestCases => "Select test cases",
            SessionAction::Modify => "Modify selected test cases",
            SessionAction::History => "Show version history",
            SessionAction::Restore => "Restore a version",
            SessionAction::Export => "Export selected test cases",
            SessionAction::Quit => "Quit",
        };
        write!(f, "{}", label)
    }
}

/// A labelled option carrying the key it stands for
struct Choice<K> {
    key: K,
    label: String,
}

impl<K> fmt::Display for Choice<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

pub fn prompt_action() -> Result<SessionAction> {
    Ok(Select::new("What next?", SessionAction::ALL.to_vec()).prompt()?)
}

pub fn prompt_testability(default: TestabilityType) -> Result<TestabilityType> {
    let cursor = TestabilityType::ALL
        .iter()
        .position(|t| *t == default)
        .unwrap_or(0);
    Ok(Select::new("Testing approach:", TestabilityType::ALL.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?)
}

/// Pick the requirements to generate for; the answer replaces the selection
pub fn prompt_requirement_selection(session: &Session) -> Result<Vec<String>> {
    let selection = session.requirement_selection();
    let choices: Vec<Choice<String>> = session
        .requirements()
        .iter()
        .map(|r| Choice {
            key: r.id.clone(),
            label: format!(
                "{} {}: {}",
                if selection.contains(&r.id) { "*" } else { " " },
                r.id,
                truncate(&r.description, 70)
            ),
        })
        .collect();

    let picked = MultiSelect::new("Requirements (* = currently selected):", choices).prompt()?;
    Ok(picked.into_iter().map(|c| c.key).collect())
}

/// Pick the test cases to work on; the answer replaces the selection
pub fn prompt_test_case_selection(session: &Session) -> Result<Vec<Uuid>> {
    let selection = session.selection();
    let choices: Vec<Choice<Uuid>> = session
        .test_cases()
        .iter()
        .map(|tc| Choice {
            key: tc.id,
            label: format!(
                "{} {} (v{}) {}",
                if selection.contains(&tc.id) { "*" } else { " " },
                tc.test_case_id,
                tc.version,
                truncate(&tc.content.description, 60)
            ),
        })
        .collect();

    let picked = MultiSelect::new("Test cases (* = currently selected):", choices).prompt()?;
    Ok(picked.into_iter().map(|c| c.key).collect())
}

pub fn prompt_instruction() -> Result<String> {
    Ok(inquire::Editor::new("Modification instruction:").prompt()?)
}

/// Confirm split mode, defaulting to what the instruction suggests
pub fn prompt_split(instruction: &str) -> Result<bool> {
    Ok(Confirm::new("Split into new test cases (replaces the selection)?")
        .with_default(detect_split_intent(instruction))
        .prompt()?)
}

/// Comma-separated attachment paths; empty input means none
pub fn prompt_attachments() -> Result<Vec<Attachment>> {
    let input = Text::new("Attachments (comma-separated paths, empty for none):").prompt()?;
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            Attachment::from_path(Path::new(p))
                .with_context(|| format!("Failed to read attachment {}", p))
        })
        .collect()
}

/// Pick one of the live test cases
pub fn prompt_test_case_key(session: &Session) -> Result<Option<String>> {
    let keys: Vec<String> = session
        .test_cases()
        .iter()
        .map(|tc| tc.test_case_id.clone())
        .collect();
    if keys.is_empty() {
        return Ok(None);
    }
    Ok(Some(Select::new("Test case:", keys).prompt()?))
}

/// Live test cases first, then ledger groups with no live entity
fn history_choices(session: &Session) -> Vec<Choice<String>> {
    let live = session.test_cases().iter().map(|tc| Choice {
        key: tc.test_case_id.clone(),
        label: format!("{} (v{})", tc.test_case_id, tc.version),
    });
    let orphaned = session.orphaned_groups().into_iter().map(|key| Choice {
        key: key.to_string(),
        label: format!("{} (no longer live)", key),
    });
    live.chain(orphaned).collect()
}

/// Pick any test case with history, including ones split away or replaced
pub fn prompt_history_key(session: &Session) -> Result<Option<String>> {
    let choices = history_choices(session);
    if choices.is_empty() {
        return Ok(None);
    }
    Ok(Some(Select::new("History of:", choices).prompt()?.key))
}

pub fn prompt_version(session: &Session, test_case_id: &str) -> Result<Option<u32>> {
    let choices: Vec<Choice<u32>> = session
        .history(test_case_id)
        .map(|r| Choice {
            key: r.version,
            label: format!(
                "v{} {} ({})",
                r.version,
                r.modification_reason,
                truncate(&r.content.description, 50)
            ),
        })
        .collect();
    if choices.is_empty() {
        return Ok(None);
    }
    Ok(Some(Select::new("Version to restore:", choices).prompt()?.key))
}

pub fn prompt_export_path(default: &str) -> Result<PathBuf> {
    let input = Text::new("Export to:").with_default(default).prompt()?;
    Ok(PathBuf::from(input))
}
