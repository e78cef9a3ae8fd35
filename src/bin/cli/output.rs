//! Output Formatting and Display Functions

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use subdiff::{BatchSummary, ProgressCallback, SubdiffConfig, SubmissionOutcome, SubmissionStatus};

/// Print the run header
pub fn print_header() {
    println!(
        "{} {}",
        "subdiff".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!();
}

/// Progress bar driven by the orchestrator's stage callback
pub fn progress_bar() -> anyhow::Result<(ProgressBar, ProgressCallback)> {
    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.blue} {msg:<10} [{bar:40.bright_blue/blue}] {pos:>3}% {elapsed_precise}",
    )?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let callback: ProgressCallback = Box::new({
        let pb = pb.clone();
        move |stage: &str, fraction: f64| {
            pb.set_message(stage.to_string());
            pb.set_position((fraction * 100.0).round() as u64);
        }
    });
    Ok((pb, callback))
}

#[derive(Tabled)]
struct SubmissionRow {
    #[tabled(rename = "#")]
    number: usize,
    archive: String,
    submitters: String,
    status: String,
    new: usize,
    changed: usize,
    note: String,
}

impl SubmissionRow {
    fn from_outcome(number: usize, outcome: &SubmissionOutcome) -> Self {
        let note = match (&outcome.failure, outcome.decode_warnings) {
            (Some(reason), _) => format!("{}: {}", reason.kind, reason.message),
            (None, 0) => String::new(),
            (None, n) => format!("{n} files decoded lossily"),
        };
        Self {
            number,
            archive: outcome.archive.clone(),
            submitters: outcome.submitters.join(" & "),
            status: status_label(outcome.status),
            new: outcome.new_files,
            changed: outcome.changed_files,
            note,
        }
    }
}

#[derive(Tabled)]
struct PairFailureRow {
    left: String,
    right: String,
    reason: String,
}

/// Display per-submission outcomes and pair failures
pub fn display_summary(summary: &BatchSummary) {
    println!("{}", "Submissions".bright_blue().bold());
    let rows: Vec<SubmissionRow> = summary
        .submissions
        .iter()
        .enumerate()
        .map(|(i, outcome)| SubmissionRow::from_outcome(i + 1, outcome))
        .collect();
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!();

    let failed = summary.failed().count();
    let reported = summary.reported().count();
    if failed == 0 {
        println!("{} {} submissions reported", "✓".bright_green(), reported);
    } else {
        println!(
            "{} {} submissions reported, {} failed",
            "!".yellow().bold(),
            reported,
            failed.to_string().red()
        );
    }

    if let Some(max) = summary.matrix.max_score() {
        println!("  Highest pairwise similarity: {:.2}", max);
    }

    if !summary.pair_failures.is_empty() {
        println!();
        println!("{}", "Comparison failures".yellow().bold());
        let rows: Vec<PairFailureRow> = summary
            .pair_failures
            .iter()
            .map(|failure| PairFailureRow {
                left: failure.left_archive.clone(),
                right: failure.right_archive.clone(),
                reason: failure.reason.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(TableStyle::rounded());
        println!("{}", table);
    }

    println!();
    println!(
        "{} {}",
        "Report:".bright_green().bold(),
        summary.report_index.display().to_string().cyan()
    );
}

#[derive(Tabled)]
struct ConfigRow {
    setting: String,
    value: String,
}

/// Display configuration summary in a formatted table
pub fn display_config_summary(config: &SubdiffConfig) {
    let similarity = &config.similarity;
    let rows = vec![
        ConfigRow {
            setting: "Archive extensions".to_string(),
            value: config.input.archive_extensions.join(", "),
        },
        ConfigRow {
            setting: "Nested archives".to_string(),
            value: config.staging.nested_archive_names.join(", "),
        },
        ConfigRow {
            setting: "Ignored suffixes".to_string(),
            value: config.diff.ignore_suffixes.join(", "),
        },
        ConfigRow {
            setting: "Strategy".to_string(),
            value: format!("{:?}", similarity.strategy).to_lowercase(),
        },
        ConfigRow {
            setting: "Facility".to_string(),
            value: format!(
                "{:?} ({} {})",
                similarity.facility,
                similarity.command,
                similarity.command_args.join(" ")
            ),
        },
        ConfigRow {
            setting: "Timeout".to_string(),
            value: format!("{}s", similarity.timeout_seconds),
        },
        ConfigRow {
            setting: "Matrix fill".to_string(),
            value: format!("{:?}", similarity.effective_matrix_fill()).to_lowercase(),
        },
        ConfigRow {
            setting: "Report folder".to_string(),
            value: config.report.dir_name.clone(),
        },
    ];

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!();
}

/// Colored status label
pub fn status_label(status: SubmissionStatus) -> String {
    match status {
        SubmissionStatus::Reported => status.to_string().green().to_string(),
        SubmissionStatus::Failed => status.to_string().red().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subdiff::core::submission::FailureReason;

    fn outcome(failure: Option<FailureReason>, decode_warnings: usize) -> SubmissionOutcome {
        SubmissionOutcome {
            archive: "team1.zip".into(),
            status: if failure.is_some() {
                SubmissionStatus::Failed
            } else {
                SubmissionStatus::Reported
            },
            failure,
            submitters: vec!["Ann".into(), "Bob".into()],
            new_files: 3,
            changed_files: 1,
            decode_warnings,
            page: None,
        }
    }

    #[test]
    fn test_row_notes() {
        let row = SubmissionRow::from_outcome(1, &outcome(None, 0));
        assert_eq!(row.submitters, "Ann & Bob");
        assert!(row.note.is_empty());

        let row = SubmissionRow::from_outcome(2, &outcome(None, 2));
        assert_eq!(row.note, "2 files decoded lossily");

        let failure = FailureReason {
            kind: "LayoutError".into(),
            message: "wrapped in a folder".into(),
        };
        let row = SubmissionRow::from_outcome(3, &outcome(Some(failure), 0));
        assert!(row.status.contains("failed"));
        assert_eq!(row.note, "LayoutError: wrapped in a folder");
    }

    #[test]
    fn test_status_label_keeps_text() {
        assert!(status_label(SubmissionStatus::Failed).contains("failed"));
        assert_eq!(status_label(SubmissionStatus::Scored), "scored");
    }
}
