use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::TestabilityType;

/// Environment variable naming an alternate settings file
pub const CONFIG_ENV: &str = "TCFORGE_CONFIG";
/// Environment variable overriding `ai.command`
pub const AI_COMMAND_ENV: &str = "TCFORGE_AI_COMMAND";
/// Environment variable overriding `default_testability`
pub const TESTABILITY_ENV: &str = "TCFORGE_TESTABILITY";

/// How the AI collaborator is invoked
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AiSettings {
    /// Program to run; the prompt is passed as its last argument
    pub command: Option<String>,
    /// Arguments placed before the prompt (e.g. `["--print", "-p"]`)
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory for exported files; the working directory when unset
    pub directory: Option<PathBuf>,
}

/// User settings loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub ai: AiSettings,
    pub default_testability: Option<String>,
    pub export: ExportSettings,
}

impl Settings {
    /// Loads settings from `path`; a missing file yields defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))
    }

    /// Applies `TCFORGE_AI_COMMAND` / `TCFORGE_TESTABILITY` style overrides
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(command) = lookup(AI_COMMAND_ENV).filter(|c| !c.trim().is_empty()) {
            self.ai.command = Some(command);
        }
        if let Some(testability) = lookup(TESTABILITY_ENV).filter(|t| !t.trim().is_empty()) {
            self.default_testability = Some(testability);
        }
    }

    /// The configured default testability, Blackbox when unset or unknown
    pub fn testability(&self) -> TestabilityType {
        match self.default_testability.as_deref() {
            None => TestabilityType::default(),
            Some(raw) => TestabilityType::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "unknown testability type in settings");
                TestabilityType::default()
            }),
        }
    }

    /// Where an export named `file_name` should be written
    pub fn export_path(&self, file_name: &str) -> PathBuf {
        match &self.export.directory {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Save the settings to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Gets the path to the settings file
pub fn settings_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;

    Ok(config_dir.join("tcforge").join("config.yaml"))
}
