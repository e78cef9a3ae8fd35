//! CLI Argument Structures
//!
//! Command and argument definitions for the subdiff binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use subdiff::{FacilityKind, StrategyKind};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Batch diff and similarity reports for archived submissions
#[derive(Parser)]
#[command(name = "subdiff")]
#[command(version = VERSION)]
#[command(about = "Batch diff and similarity reports for archived source-code submissions")]
#[command(long_about = "
Extract every submission archive in a folder, diff it against a baseline tree,
score how similar the submissions are to each other and write an HTML report.

Common Usage:

  # Report into ./submissions/html_diff using the alignment strategy
  subdiff run ./submissions --baseline ./linux-baseline

  # Delegate comparison to an external similarity tool
  subdiff run ./submissions -b ./baseline --strategy delegated --sim-command sim_c

  # Exclude generated files from the comparison
  subdiff run ./submissions -b ./baseline --filter Makefile --filter config.h

  # Start from a configuration file
  subdiff init-config --output subdiff.yml
  subdiff run ./submissions -b ./baseline --config subdiff.yml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a folder of submission archives and write the report
    Run(Box<RunArgs>),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate a subdiff configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Folder containing one archive per submission
    pub submissions: PathBuf,

    /// Baseline tree every submission is diffed against
    #[arg(short, long)]
    pub baseline: PathBuf,

    /// Report folder [default: <SUBMISSIONS>/html_diff]
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File name to exclude from reporting and comparison (repeatable)
    #[arg(long = "filter", value_name = "NAME")]
    pub filter: Vec<String>,

    /// Similarity strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Comparison facility for the delegated strategy
    #[arg(long, value_enum)]
    pub facility: Option<FacilityArg>,

    /// Executable of the external similarity tool
    #[arg(long, value_name = "CMD")]
    pub sim_command: Option<String>,

    /// Timeout in seconds for one external comparison
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory of Handlebars templates overriding the built-in ones
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// In-process alignment of normalized signatures
    Alignment,
    /// Per-pair comparison through a facility
    Delegated,
}

impl From<StrategyArg> for StrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Alignment => StrategyKind::Alignment,
            StrategyArg::Delegated => StrategyKind::Delegated,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FacilityArg {
    /// External similarity tool
    External,
    /// Built-in normalized token overlap
    TokenOverlap,
}

impl From<FacilityArg> for FacilityKind {
    fn from(value: FacilityArg) -> Self {
        match value {
            FacilityArg::External => FacilityKind::External,
            FacilityArg::TokenOverlap => FacilityKind::TokenOverlap,
        }
    }
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = "subdiff.yml")]
    pub output: PathBuf,

    /// Overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Path to configuration file to validate
    pub config: PathBuf,
}
