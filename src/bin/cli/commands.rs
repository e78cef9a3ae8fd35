//! Command Execution Logic

use anyhow::{bail, Context};
use console::Term;
use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};
use tracing::info;

use subdiff::{BatchOrchestrator, SubdiffConfig};

use crate::cli::args::{InitConfigArgs, RunArgs, ValidateConfigArgs};
use crate::cli::config_layer::{build_run_config, load_configuration};
use crate::cli::output::{display_config_summary, display_summary, print_header, progress_bar};

/// `subdiff run`
pub async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let show_progress = !args.quiet && Term::stderr().is_term();
    if !args.quiet {
        print_header();
    }

    let config = build_run_config(&args)?;
    if !args.quiet {
        display_config_summary(&config);
    }

    let mut orchestrator = BatchOrchestrator::new(config, &args.baseline)
        .with_filter_files(args.filter.clone());
    let report_dir = args
        .out
        .clone()
        .unwrap_or_else(|| orchestrator.default_report_dir(&args.submissions));

    let progress = if show_progress {
        let (pb, callback) = progress_bar()?;
        orchestrator = orchestrator.with_progress(callback);
        Some(pb)
    } else {
        None
    };

    info!(
        "Comparing submissions in {} against {}",
        args.submissions.display(),
        args.baseline.display()
    );
    let result = orchestrator.run(&args.submissions, &report_dir).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let summary = result.context("Batch run failed")?;

    if !args.quiet {
        display_summary(&summary);
    }
    Ok(())
}

/// `subdiff print-default-config`
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default subdiff configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!(
        "{}",
        "# Usage: subdiff run <SUBMISSIONS> --baseline <DIR> --config your-config.yml".dimmed()
    );
    println!();

    let yaml_output = serde_yaml::to_string(&SubdiffConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// `subdiff init-config`
pub async fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            args.output.display()
        );
    }

    let yaml_content = serde_yaml::to_string(&SubdiffConfig::default())?;
    tokio::fs::write(&args.output, yaml_content)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "{} {}",
        "Configuration saved to:".bright_green().bold(),
        args.output.display().to_string().cyan()
    );
    println!();

    #[derive(Tabled)]
    struct CustomizationRow {
        setting: &'static str,
        description: &'static str,
    }

    let rows = vec![
        CustomizationRow {
            setting: "similarity.strategy",
            description: "alignment (in-process) or delegated (per-pair facility)",
        },
        CustomizationRow {
            setting: "similarity.command",
            description: "External similarity tool for the delegated strategy",
        },
        CustomizationRow {
            setting: "diff.filter_files",
            description: "File names excluded from reporting and comparison",
        },
        CustomizationRow {
            setting: "normalizer.reserved_words",
            description: "Words kept verbatim in signatures",
        },
    ];
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    Ok(())
}

/// `subdiff validate-config`
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );

    let config = load_configuration(Some(&args.config))?;
    println!("{}", "Configuration file is valid".bright_green().bold());
    println!();
    display_config_summary(&config);
    Ok(())
}
