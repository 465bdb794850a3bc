mod cli;
mod logging;
mod prompts;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use tcforge_core::{
    export_csv, export_json, export_rows, settings_path, AiClient, Attachment, CoreError,
    Requirement, RequirementExtractor, Resolution, Session, Settings, TestabilityType,
    DEFAULT_CSV_NAME,
};

use crate::cli::{Cli, Command, ConfigCommand, ExportFormat};
use crate::logging::Verbosity;
use crate::prompts::SessionAction;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet), cli.no_color);

    let (settings_file, settings) = load_settings(cli.config.as_deref())?;

    match &cli.command {
        Command::Extract { file, json } => {
            handle_extract(file, *json)?;
        }
        Command::Generate {
            file,
            testability,
            requirements,
            document,
            output,
            format,
        } => {
            handle_generate(
                &settings,
                file,
                testability.as_deref(),
                requirements,
                document.as_deref(),
                output.as_deref(),
                *format,
            )?;
        }
        Command::Session { file, document } => {
            run_session(&settings, file, document.as_deref())?;
        }
        Command::Config(config_cmd) => {
            handle_config_command(config_cmd, &settings_file, &settings)?;
        }
    }

    Ok(())
}

fn load_settings(explicit: Option<&Path>) -> Result<(PathBuf, Settings)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => settings_path()?,
    };
    let mut settings = Settings::load(&path)?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    Ok((path, settings))
}

fn resolve_testability(requested: Option<&str>, settings: &Settings) -> Result<TestabilityType> {
    match requested {
        Some(raw) => TestabilityType::parse(raw)
            .with_context(|| format!("Unknown testability type '{}' (blackbox, graybox, whitebox)", raw)),
        None => Ok(settings.testability()),
    }
}

fn load_document(path: Option<&Path>) -> Result<Option<Attachment>> {
    path.map(|p| {
        Attachment::from_path(p).with_context(|| format!("Failed to read document {:?}", p))
    })
    .transpose()
}

fn ai_client(settings: &Settings) -> Result<AiClient> {
    let client = AiClient::new(&settings.ai);
    if !client.is_available() {
        bail!(
            "No usable AI command ({}). Set ai.command in the settings file or TCFORGE_AI_COMMAND.",
            client.mode_description()
        );
    }
    Ok(client)
}

fn load_session(file: &Path) -> Result<Session> {
    let mut session = Session::new();
    let count = session
        .extract_requirements(&RequirementExtractor::new(), file)
        .with_context(|| format!("Failed to extract requirements from {:?}", file))?;
    if count == 0 {
        bail!("No requirements found in {:?}", file);
    }
    Ok(session)
}

fn handle_extract(file: &Path, json: bool) -> Result<()> {
    let session = load_session(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.requirements())?);
    } else {
        print_requirements(&session, session.requirements());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_generate(
    settings: &Settings,
    file: &Path,
    testability: Option<&str>,
    requirement_ids: &[String],
    document: Option<&Path>,
    output: Option<&Path>,
    format: ExportFormat,
) -> Result<()> {
    let testability = resolve_testability(testability, settings)?;
    let document = load_document(document)?;
    let client = ai_client(settings)?;
    let mut session = load_session(file)?;

    if requirement_ids.is_empty() {
        session.select_all_requirements();
    } else {
        for id in requirement_ids {
            if !session.requirements().iter().any(|r| &r.id == id) {
                bail!("Requirement {} is not in {:?}", id, file);
            }
            session.toggle_requirement(id, true);
        }
    }

    println!(
        "Generating {} test cases for {} requirement(s)...",
        testability,
        session.requirement_selection().len()
    );
    let count = session.generate(&client, testability, document.as_ref())?;

    session.select_all();
    let rows = export_rows(session.selected());
    let default_name = match format {
        ExportFormat::Csv => DEFAULT_CSV_NAME,
        ExportFormat::Json => "selected-test-cases.json",
    };
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.export_path(default_name));

    match format {
        ExportFormat::Csv => export_csv(&rows, &path)?,
        ExportFormat::Json => export_json(&rows, &path)?,
    }

    println!("{}", format!("Generated {} test case(s)", count).green());
    println!("Exported to {}", path.display());
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommand, path: &Path, settings: &Settings) -> Result<()> {
    match cmd {
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
        ConfigCommand::Show => {
            println!("{}: {}", "Settings file".blue(), path.display());
            println!(
                "{}: {}",
                "AI".blue(),
                AiClient::new(&settings.ai).mode_description()
            );
            println!("{}: {}", "Default testability".blue(), settings.testability());
            print!("{}", serde_yaml::to_string(settings)?);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                println!(
                    "{}",
                    format!("{} already exists (use --force to overwrite)", path.display())
                        .yellow()
                );
                return Ok(());
            }
            let defaults = Settings {
                default_testability: Some(TestabilityType::default().as_str().to_string()),
                ..Default::default()
            };
            defaults.save(path)?;
            println!("{}", format!("Wrote {}", path.display()).green());
        }
    }
    Ok(())
}

// =========================================================================
// Interactive session
// =========================================================================

fn run_session(settings: &Settings, file: &Path, document: Option<&Path>) -> Result<()> {
    let mut session = load_session(file)?;
    let document = load_document(document)?;
    let client = AiClient::new(&settings.ai);

    println!(
        "Loaded {} requirement(s) from {}",
        session.requirements().len(),
        file.display()
    );
    if !client.is_available() {
        println!(
            "{}",
            "No AI command configured: generation and modification will fail.".yellow()
        );
    }

    loop {
        let action = match prompts::prompt_action() {
            Ok(action) => action,
            Err(e) if is_interrupt(&e) => break,
            Err(e) => return Err(e),
        };
        if action == SessionAction::Quit {
            break;
        }

        if let Err(e) = run_action(action, &mut session, &client, settings, document.as_ref()) {
            if is_interrupt(&e) {
                break;
            }
            report_error(&e);
        }
    }

    Ok(())
}

fn run_action(
    action: SessionAction,
    session: &mut Session,
    client: &AiClient,
    settings: &Settings,
    document: Option<&Attachment>,
) -> Result<()> {
    match action {
        SessionAction::SelectRequirements => {
            let picked = prompts::prompt_requirement_selection(session)?;
            session.clear_requirement_selection();
            for id in &picked {
                session.toggle_requirement(id, true);
            }
            println!("{} requirement(s) selected", picked.len());
        }
        SessionAction::Generate => {
            if !session.test_cases().is_empty()
                && !inquire::Confirm::new("Replace all current test cases? Their history stays viewable.")
                    .with_default(false)
                    .prompt()?
            {
                return Ok(());
            }
            let testability = prompts::prompt_testability(settings.testability())?;
            let count = session.generate(client, testability, document)?;
            println!("{}", format!("Generated {} test case(s)", count).green());
            print_test_cases(session);
        }
        SessionAction::ListTestCases => print_test_cases(session),
        SessionAction::SelectTestCases => {
            let picked = prompts::prompt_test_case_selection(session)?;
            session.clear_selection();
            for id in picked {
                session.toggle(id, true);
            }
            println!("{} test case(s) selected", session.selection().len());
        }
        SessionAction::Modify => {
            if session.selection().is_empty() {
                return Err(CoreError::EmptySelection.into());
            }
            let instruction = prompts::prompt_instruction()?;
            let split = prompts::prompt_split(&instruction)?;
            let attachments = prompts::prompt_attachments()?;

            match session.modify_selected(client, &instruction, split, &attachments)? {
                Resolution::InPlace { revised } => {
                    println!("{}", format!("Revised {} test case(s)", revised.len()).green());
                }
                Resolution::Split { removed, created } => {
                    println!(
                        "{}",
                        format!(
                            "Replaced {} test case(s) with {} new one(s)",
                            removed.len(),
                            created.len()
                        )
                        .green()
                    );
                }
            }
            print_test_cases(session);
        }
        SessionAction::History => {
            match prompts::prompt_history_key(session)? {
                Some(key) => print_history(session, &key),
                None => println!("{}", "No test cases yet.".yellow()),
            }
        }
        SessionAction::Restore => {
            let Some(key) = prompts::prompt_test_case_key(session)? else {
                println!("{}", "No test cases yet.".yellow());
                return Ok(());
            };
            if let Some(version) = prompts::prompt_version(session, &key)? {
                let receipt = session.restore(&key, version)?;
                println!(
                    "{}",
                    format!(
                        "Restored {} version {} as version {}",
                        receipt.test_case_id, receipt.restored_from, receipt.new_version
                    )
                    .green()
                );
            }
        }
        SessionAction::Export => {
            let selected = session.selected();
            if selected.is_empty() {
                return Err(CoreError::EmptySelection.into());
            }
            let rows = export_rows(selected);
            let default_path = settings.export_path(DEFAULT_CSV_NAME);
            let path = prompts::prompt_export_path(&default_path.display().to_string())?;

            let is_json = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json {
                export_json(&rows, &path)?;
            } else {
                export_csv(&rows, &path)?;
            }
            println!(
                "{}",
                format!("Exported {} test case(s) to {}", rows.len(), path.display()).green()
            );
        }
        SessionAction::Quit => {}
    }
    Ok(())
}

fn is_interrupt(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<inquire::InquireError>(),
        Some(inquire::InquireError::OperationInterrupted)
    )
}

fn report_error(err: &anyhow::Error) {
    if let Some(inquire::InquireError::OperationCanceled) = err.downcast_ref::<inquire::InquireError>() {
        return;
    }
    match err.downcast_ref::<CoreError>() {
        Some(core) if core.is_noop() => println!("{}", core.to_string().yellow()),
        _ => eprintln!("{} {:#}", "Error:".red(), err),
    }
}

// =========================================================================
// Output
// =========================================================================

fn print_requirements(session: &Session, requirements: &[Requirement]) {
    if requirements.is_empty() {
        println!("{}", "No requirements found.".yellow());
        return;
    }

    println!("{:<3} {:<14} {:<14} {}", "Sel", "ID", "Category", "Description");
    println!("{}", "-".repeat(100));
    for req in requirements {
        let marker = if session.requirement_selection().contains(&req.id) {
            "*".green()
        } else {
            " ".normal()
        };
        println!(
            "{:<3} {:<14} {:<14} {}",
            marker,
            req.id,
            req.category.as_deref().unwrap_or("-"),
            req.description
        );
    }
}

fn print_test_cases(session: &Session) {
    if session.test_cases().is_empty() {
        println!("{}", "No test cases yet.".yellow());
        return;
    }

    println!(
        "{:<3} {:<14} {:<14} {:<4} {:<9} {}",
        "Sel", "Test Case ID", "Requirement", "Ver", "Type", "Description"
    );
    println!("{}", "-".repeat(100));
    for tc in session.test_cases() {
        let marker = if session.selection().contains(&tc.id) {
            "*".green()
        } else {
            " ".normal()
        };
        println!(
            "{:<3} {:<14} {:<14} {:<4} {:<9} {}",
            marker,
            tc.test_case_id,
            tc.requirement_id,
            format!("v{}", tc.version),
            tc.content.testability_type,
            tc.content.description.lines().next().unwrap_or_default()
        );
    }
}

fn print_history(session: &Session, test_case_id: &str) {
    println!("{}: {}", "History".blue(), test_case_id);
    for record in session.history(test_case_id) {
        println!(
            "  v{:<3} {} {}",
            record.version,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.modification_reason.to_string().cyan()
        );
        println!("        {}", record.content.description);
    }
}
