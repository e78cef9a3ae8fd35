//! Batch orchestration: stage, diff, score and report every submission.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::api::results::{
    BatchSummary, PairFailure, SimilarityMatrix, SimilarityRecord, SubmissionOutcome,
};
use crate::core::config::{FacilityKind, StrategyKind, SubdiffConfig};
use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::sorted_entries;
use crate::core::submission::{Submission, SubmissionStatus};
use crate::detectors::normalizer::{Normalizer, Signature};
use crate::detectors::similarity::{
    score_alignment, score_delegated, ComparisonFacility, ExternalSimTool, FileOverlap,
    PairComparison, SubmissionMaterial, TokenOverlapFacility,
};
use crate::detectors::tree_diff::{diff, DiffFilter};
use crate::io::reports::{
    CLexerHighlighter, Highlighter, IndexEntry, IndexPage, ReportGenerator,
};
use crate::io::staging::{ArchiveExtractor, ArchiveStager, ZipTarExtractor};

/// Stage progress callback: stage name and completed fraction in `[0, 1]`
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Per-submission state carried from staging to reporting
struct Processed {
    submission: Submission,
    material: Option<SubmissionMaterial>,
    signature: Signature,
    filtered_tree: Option<PathBuf>,
}

/// Runs one batch over a folder of submission archives
pub struct BatchOrchestrator {
    config: Arc<SubdiffConfig>,
    baseline: PathBuf,
    extractor: Arc<dyn ArchiveExtractor>,
    facility: Option<Arc<dyn ComparisonFacility>>,
    highlighter: Arc<dyn Highlighter>,
    filter_files: Vec<String>,
    progress: Option<ProgressCallback>,
}

impl BatchOrchestrator {
    /// Create an orchestrator comparing submissions against `baseline`.
    ///
    /// Collaborators default to the zip/tar extractor, the C highlighter and
    /// the facility named by `similarity.facility`.
    pub fn new(config: SubdiffConfig, baseline: impl Into<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            baseline: baseline.into(),
            extractor: Arc::new(ZipTarExtractor),
            facility: None,
            highlighter: Arc::new(CLexerHighlighter),
            filter_files: Vec::new(),
            progress: None,
        }
    }

    /// Replace the archive extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Use this facility for the delegated strategy instead of the configured one
    pub fn with_facility(mut self, facility: Arc<dyn ComparisonFacility>) -> Self {
        self.facility = Some(facility);
        self
    }

    /// Replace the source highlighter
    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    /// File names excluded from reporting and comparison, on top of the configured ones
    pub fn with_filter_files(mut self, names: Vec<String>) -> Self {
        self.filter_files = names;
        self
    }

    /// Report `(stage, fraction)` progress while running
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &SubdiffConfig {
        &self.config
    }

    /// Report folder used when none is given: `<submissions>/<report.dir_name>`
    pub fn default_report_dir(&self, submissions_dir: &Path) -> PathBuf {
        submissions_dir.join(&self.config.report.dir_name)
    }

    fn report_progress(&self, stage: &str, fraction: f64) {
        if let Some(callback) = &self.progress {
            callback(stage, fraction.clamp(0.0, 1.0));
        }
    }

    fn resolve_facility(&self, normalizer: &Normalizer) -> Arc<dyn ComparisonFacility> {
        if let Some(facility) = &self.facility {
            return Arc::clone(facility);
        }
        let similarity = &self.config.similarity;
        match similarity.facility {
            FacilityKind::External => Arc::new(ExternalSimTool::from_config(similarity)),
            FacilityKind::TokenOverlap => Arc::new(TokenOverlapFacility::from_config(
                normalizer.clone(),
                similarity,
            )),
        }
    }

    /// Process every archive in `submissions_dir` and write the report into `report_dir`.
    ///
    /// Per-submission failures are recorded in the summary; only invalid
    /// configuration, a missing baseline or report write failures abort.
    pub async fn run(&self, submissions_dir: &Path, report_dir: &Path) -> Result<BatchSummary> {
        self.config.validate()?;
        if !self.baseline.is_dir() {
            return Err(SubdiffError::validation_field(
                format!("baseline is not a directory: {}", self.baseline.display()),
                "baseline",
            ));
        }
        if !submissions_dir.is_dir() {
            return Err(SubdiffError::validation_field(
                format!(
                    "submissions folder is not a directory: {}",
                    submissions_dir.display()
                ),
                "submissions",
            ));
        }

        let generator =
            ReportGenerator::new(&self.config.report, Arc::clone(&self.highlighter), report_dir)?;
        generator.prepare_output_dir()?;

        let archives = self.enumerate_archives(submissions_dir, report_dir)?;
        info!(
            "Processing {} submissions from {}",
            archives.len(),
            submissions_dir.display()
        );

        let workspace = TempDir::new()
            .map_err(|e| SubdiffError::io("Failed to create run workspace", e))?;
        let normalizer = Normalizer::new(&self.config.normalizer);
        let filter = DiffFilter::new(&self.config.diff, &self.filter_files);
        let stager = ArchiveStager::new(
            &self.config.staging,
            Arc::clone(&self.extractor),
            workspace.path(),
        );

        let total = archives.len().max(1) as f64;
        let mut processed = Vec::with_capacity(archives.len());
        for (k, archive) in archives.into_iter().enumerate() {
            self.report_progress("staging", k as f64 / total);
            let mut submission = Submission::new(archive);
            let filtered_root = workspace.path().join("filtered").join(k.to_string());

            match self.process(&stager, &filter, &normalizer, &mut submission, &filtered_root) {
                Ok((material, signature, filtered_tree)) => processed.push(Processed {
                    submission,
                    material: Some(material),
                    signature,
                    filtered_tree,
                }),
                Err(err) if err.is_fatal() => {
                    stager.clear()?;
                    return Err(err);
                }
                Err(err) => {
                    warn!("Submission {} failed: {}", submission.archive, err);
                    submission.fail(&err);
                    processed.push(Processed {
                        submission,
                        material: None,
                        signature: Signature::default(),
                        filtered_tree: None,
                    });
                }
            }
        }
        stager.clear()?;
        self.report_progress("staging", 1.0);

        let active: Vec<usize> = (0..processed.len())
            .filter(|&k| processed[k].submission.is_active())
            .collect();
        let labels: Vec<String> = active
            .iter()
            .map(|&k| processed[k].submission.archive.clone())
            .collect();

        self.report_progress("scoring", 0.0);
        let comparisons = self.score(&processed, &active, &normalizer).await;
        for &k in &active {
            processed[k].submission.advance(SubmissionStatus::Scored);
        }
        self.report_progress("scoring", 1.0);

        let mut matrix = SimilarityMatrix::new(labels, self.config.similarity.effective_matrix_fill());
        let mut pair_failures = Vec::new();
        for comparison in &comparisons {
            let detail_page = match self.config.similarity.strategy {
                StrategyKind::Delegated => Some(self.write_detail_page(
                    &generator,
                    &matrix.labels,
                    &processed,
                    &active,
                    comparison,
                )?),
                StrategyKind::Alignment => None,
            };
            if let Some(reason) = &comparison.failure {
                pair_failures.push(PairFailure {
                    left: comparison.left,
                    right: comparison.right,
                    left_archive: matrix.labels[comparison.left].clone(),
                    right_archive: matrix.labels[comparison.right].clone(),
                    reason: reason.clone(),
                });
            }
            matrix.records.push(SimilarityRecord {
                left: comparison.left,
                right: comparison.right,
                score: comparison.score,
                detail_page,
            });
        }

        let mut outcomes = Vec::with_capacity(processed.len());
        let mut entries = Vec::new();
        for (k, item) in processed.iter_mut().enumerate() {
            self.report_progress("reporting", k as f64 / total);
            let submission = &mut item.submission;
            // Failed submissions stay off the index.
            let Some(material) = item.material.as_ref() else {
                outcomes.push(SubmissionOutcome::from_submission(submission, 0, 0, None));
                continue;
            };

            let page = generator.allocate_page_name();
            let (new_links, changed_links) =
                generator.write_artifact_pages(&submission.archive, &page, &material.artifacts)?;
            let submitters = submission.submitters_label();
            generator.write_submission_page(
                &page,
                &submission.archive,
                &submitters,
                &new_links,
                &changed_links,
            )?;
            submission.advance(SubmissionStatus::Reported);

            entries.push(IndexEntry {
                number: entries.len() + 1,
                archive: submission.archive.clone(),
                submitters,
                href: page.clone(),
                new_files: new_links.len(),
                changed_files: changed_links.len(),
            });
            outcomes.push(SubmissionOutcome::from_submission(
                submission,
                new_links.len(),
                changed_links.len(),
                Some(page),
            ));
        }

        let figure = match self.config.similarity.strategy {
            StrategyKind::Alignment => Some(generator.write_figure(&matrix)?),
            StrategyKind::Delegated => None,
        };
        generator.write_stylesheet()?;
        let report_index = generator.write_index(&IndexPage {
            strategy: self.config.similarity.strategy,
            entries,
            matrix: &matrix,
            pair_failures: &pair_failures,
            figure,
        })?;
        self.report_progress("reporting", 1.0);

        info!(
            "Report written to {} ({} failed submissions, {} failed pairs)",
            report_index.display(),
            outcomes
                .iter()
                .filter(|o| o.status == SubmissionStatus::Failed)
                .count(),
            pair_failures.len()
        );

        Ok(BatchSummary {
            strategy: self.config.similarity.strategy,
            submissions: outcomes,
            matrix,
            pair_failures,
            report_index,
        })
    }

    /// Archive files of `submissions_dir` in file-name order
    fn enumerate_archives(&self, submissions_dir: &Path, report_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for path in sorted_entries(submissions_dir)? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if path == report_dir {
                debug!("Skipping report folder {}", name);
            } else if !path.is_file() || !self.config.input.is_archive(&name) {
                debug!("Skipping non-archive entry {}", name);
            } else {
                archives.push(path);
            }
        }
        Ok(archives)
    }

    /// Stage, diff and collect one submission
    fn process(
        &self,
        stager: &ArchiveStager,
        filter: &DiffFilter,
        normalizer: &Normalizer,
        submission: &mut Submission,
        filtered_root: &Path,
    ) -> Result<(SubmissionMaterial, Signature, Option<PathBuf>)> {
        let staged = stager.stage(&submission.archive_path)?;
        submission.submitters = staged.submitters;
        submission.staged_root = Some(staged.root.clone());
        submission.advance(SubmissionStatus::Staged);

        let tree = diff(&staged.root, &self.baseline)?;
        let material = SubmissionMaterial::collect(&tree, filter, &staged.root, &self.baseline)?;
        submission.decode_warnings = material.decode_warnings;
        debug!(
            "{}: {} new files, {} changed files",
            submission.archive,
            material.new_count(),
            material.changed_count()
        );

        let (signature, filtered_tree) = match self.config.similarity.strategy {
            StrategyKind::Alignment => (material.signature(normalizer), None),
            StrategyKind::Delegated => {
                material.write_filtered_tree(filtered_root)?;
                (Signature::default(), Some(filtered_root.to_path_buf()))
            }
        };

        submission.staged_root = None;
        submission.advance(SubmissionStatus::Diffed);
        Ok((material, signature, filtered_tree))
    }

    async fn score(
        &self,
        processed: &[Processed],
        active: &[usize],
        normalizer: &Normalizer,
    ) -> Vec<PairComparison> {
        match self.config.similarity.strategy {
            StrategyKind::Alignment => {
                let signatures: Vec<Signature> = active
                    .iter()
                    .map(|&k| processed[k].signature.clone())
                    .collect();
                score_alignment(&signatures, self.config.similarity.alignment_timeout())
            }
            StrategyKind::Delegated => {
                let trees: Vec<PathBuf> = active
                    .iter()
                    .map(|&k| processed[k].filtered_tree.clone().unwrap_or_default())
                    .collect();
                let facility = self.resolve_facility(normalizer);
                score_delegated(
                    facility.as_ref(),
                    &trees,
                    self.config.similarity.max_parallel_comparisons,
                )
                .await
            }
        }
    }

    fn write_detail_page(
        &self,
        generator: &ReportGenerator,
        labels: &[String],
        processed: &[Processed],
        active: &[usize],
        comparison: &PairComparison,
    ) -> Result<String> {
        let sides = [comparison.left, comparison.right].map(|i| {
            (
                labels[i].as_str(),
                processed[active[i]].filtered_tree.as_deref(),
            )
        });
        let lines: Vec<String> = comparison
            .overlaps
            .iter()
            .map(|overlap| describe_overlap(overlap, &sides))
            .collect();

        Ok(generator.write_comparison_page(
            sides[0].0,
            sides[1].0,
            comparison.score,
            &lines,
            comparison.failure.as_deref(),
        )?)
    }
}

/// Report line with tree paths replaced by archive names
fn describe_overlap(overlap: &FileOverlap, sides: &[(&str, Option<&Path>); 2]) -> String {
    let label = |path: &Path| {
        sides
            .iter()
            .find_map(|(archive, root)| {
                let relative = path.strip_prefix((*root)?).ok()?;
                Some(format!("{archive}/{}", relative.display()))
            })
            .unwrap_or_else(|| path.display().to_string())
    };
    format!(
        "{} consists for {} % of {} material",
        label(&overlap.left_file),
        overlap.percent,
        label(&overlap.right_file)
    )
}
