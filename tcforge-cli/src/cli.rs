use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Generate, refine and version test cases from requirement documents"
)]
pub struct Cli {
    /// Settings file (defaults to $TCFORGE_CONFIG or the user config directory)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Only show errors
    #[clap(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored log output
    #[clap(long, global = true)]
    pub no_color: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the requirements found in a document
    Extract {
        /// Requirements document (.csv, .tsv, .txt, .yaml, .yml, .json)
        file: PathBuf,

        /// Print the requirements as JSON
        #[clap(long)]
        json: bool,
    },

    /// Generate test cases for a document and export them
    Generate {
        /// Requirements document
        file: PathBuf,

        /// Testing approach (blackbox, graybox, whitebox)
        #[clap(long, short = 't')]
        testability: Option<String>,

        /// Only generate for these requirement ids (repeatable)
        #[clap(long = "requirement", short = 'r')]
        requirements: Vec<String>,

        /// Supporting document passed to the AI
        #[clap(long)]
        document: Option<PathBuf>,

        /// Output file (defaults to selected-test-cases.csv)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output format
        #[clap(long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },

    /// Interactive session: select, generate, modify, split, restore, export
    Session {
        /// Requirements document to start from
        file: PathBuf,

        /// Supporting document passed to the AI on generation
        #[clap(long)]
        document: Option<PathBuf>,
    },

    /// Settings management
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the settings file path
    Path,

    /// Show the effective settings
    Show,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}
