//! Report generation with template engine support.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::api::results::{PairFailure, SimilarityMatrix};
use crate::core::config::{ReportConfig, StrategyKind};
use crate::detectors::similarity::{ArtifactContent, FileArtifact};

use super::assets::write_stylesheet;
use super::diff_view::side_by_side;
use super::error::ReportError;
use super::helpers::{grey_hex, register_helpers, safe_json_value};
use super::highlight::{language_for, Highlighter};
use super::templates::{
    load_templates_from_dir, register_builtin_templates, COMPARISON_TEMPLATE, DIFF_TEMPLATE,
    FIGURE_TEMPLATE, INDEX_TEMPLATE, SOURCE_TEMPLATE, SUBMISSION_TEMPLATE,
};

const FIGURE_CELL: usize = 24;
const FIGURE_MARGIN: usize = 48;

/// A link to a generated page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLink {
    /// Text shown for the link, usually a relative file path
    pub caption: String,
    /// Page file name relative to the report root
    pub href: String,
}

/// One submission row of the global index
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    /// 1-based position in enumeration order
    pub number: usize,
    /// Archive file name
    pub archive: String,
    /// Submitter names joined for display
    pub submitters: String,
    /// Submission page
    pub href: String,
    /// Count of new files
    pub new_files: usize,
    /// Count of changed files
    pub changed_files: usize,
}

/// Everything the global index shows
#[derive(Debug, Clone)]
pub struct IndexPage<'a> {
    /// Strategy that produced the matrix
    pub strategy: StrategyKind,
    /// Reported submissions
    pub entries: Vec<IndexEntry>,
    /// Pairwise scores
    pub matrix: &'a SimilarityMatrix,
    /// Pairs the facility could not compare
    pub pair_failures: &'a [PairFailure],
    /// File name of the similarity figure, when one was written
    pub figure: Option<String>,
}

#[derive(Serialize)]
struct MatrixCellView {
    text: String,
    color: String,
    class: &'static str,
    href: Option<String>,
}

#[derive(Serialize)]
struct MatrixRowView {
    label: String,
    archive: String,
    cells: Vec<MatrixCellView>,
}

#[derive(Serialize)]
struct MatrixView {
    columns: Vec<String>,
    rows: Vec<MatrixRowView>,
}

#[derive(Serialize)]
struct FigureLabel {
    text: String,
    archive: String,
    row_x: usize,
    row_y: usize,
    column_x: usize,
    column_y: usize,
}

#[derive(Serialize)]
struct FigureCell {
    x: usize,
    y: usize,
    size: usize,
    color: String,
    title: String,
}

/// Renders report pages into one output directory
pub struct ReportGenerator {
    handlebars: Handlebars<'static>,
    config: ReportConfig,
    highlighter: Arc<dyn Highlighter>,
    output_dir: PathBuf,
}

impl ReportGenerator {
    /// Create a generator writing into `output_dir`.
    ///
    /// Templates from `config.templates_dir` replace built-in ones by name.
    pub fn new(
        config: &ReportConfig,
        highlighter: Arc<dyn Highlighter>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ReportError> {
        let mut handlebars = Handlebars::new();
        register_helpers(&mut handlebars);
        register_builtin_templates(&mut handlebars)?;

        if let Some(templates_dir) = &config.templates_dir {
            load_templates_from_dir(&mut handlebars, templates_dir)?;
        }

        Ok(Self {
            handlebars,
            config: config.clone(),
            highlighter,
            output_dir: output_dir.into(),
        })
    }

    /// Report root directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Delete any previous report and create an empty output directory
    pub fn prepare_output_dir(&self) -> Result<(), ReportError> {
        if self.output_dir.exists() {
            debug!("Removing stale report at {}", self.output_dir.display());
            fs::remove_dir_all(&self.output_dir)?;
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// A fresh opaque page file name
    pub fn allocate_page_name(&self) -> String {
        format!("{}.{}", Uuid::new_v4(), self.config.page_extension)
    }

    fn render_to<T: Serialize>(
        &self,
        template: &str,
        data: &T,
        file_name: &str,
    ) -> Result<(), ReportError> {
        let content = self.handlebars.render(template, data)?;
        fs::write(self.output_dir.join(file_name), content)?;
        Ok(())
    }

    fn page_data(&self, title: String, mut data: serde_json::Value) -> serde_json::Value {
        if let Some(object) = data.as_object_mut() {
            object.insert("title".into(), json!(title));
            object.insert("stylesheet".into(), json!(self.config.stylesheet_name));
            object.insert("index".into(), json!(self.config.index_name));
        }
        data
    }

    /// Write the highlighted page of a new file
    pub fn write_source_page(
        &self,
        archive: &str,
        back_href: &str,
        path: &Path,
        text: &str,
    ) -> Result<FileLink, ReportError> {
        let caption = path.display().to_string();
        let markup = self.highlighter.highlight(text, language_for(path));
        let lines: Vec<&str> = markup.lines().collect();
        let page = self.allocate_page_name();

        let data = self.page_data(
            format!("{archive}: {caption}"),
            json!({
                "archive": archive,
                "back": back_href,
                "caption": caption,
                "lines": lines,
            }),
        );
        self.render_to(SOURCE_TEMPLATE, &data, &page)?;

        Ok(FileLink {
            caption,
            href: page,
        })
    }

    /// Write the side-by-side diff page of a changed file
    pub fn write_diff_page(
        &self,
        archive: &str,
        back_href: &str,
        path: &Path,
        baseline: &str,
        submission: &str,
    ) -> Result<FileLink, ReportError> {
        let caption = path.display().to_string();
        let page = self.allocate_page_name();

        let data = self.page_data(
            format!("{archive}: {caption}"),
            json!({
                "archive": archive,
                "back": back_href,
                "caption": caption,
                "rows": safe_json_value(side_by_side(baseline, submission)),
            }),
        );
        self.render_to(DIFF_TEMPLATE, &data, &page)?;

        Ok(FileLink {
            caption,
            href: page,
        })
    }

    /// Write one page per artifact, returning new-file and changed-file links
    pub fn write_artifact_pages(
        &self,
        archive: &str,
        back_href: &str,
        artifacts: &[FileArtifact],
    ) -> Result<(Vec<FileLink>, Vec<FileLink>), ReportError> {
        let mut new_links = Vec::new();
        let mut changed_links = Vec::new();

        for artifact in artifacts {
            match &artifact.content {
                ArtifactContent::New { text } => {
                    new_links.push(self.write_source_page(archive, back_href, &artifact.path, text)?);
                }
                ArtifactContent::Changed {
                    baseline,
                    submission,
                } => {
                    changed_links.push(self.write_diff_page(
                        archive,
                        back_href,
                        &artifact.path,
                        baseline,
                        submission,
                    )?);
                }
            }
        }

        Ok((new_links, changed_links))
    }

    /// Write a submission page under the previously allocated `page` name
    pub fn write_submission_page(
        &self,
        page: &str,
        archive: &str,
        submitters: &str,
        new_files: &[FileLink],
        changed_files: &[FileLink],
    ) -> Result<(), ReportError> {
        let data = self.page_data(
            archive.to_string(),
            json!({
                "archive": archive,
                "submitters": submitters,
                "new_files": new_files,
                "changed_files": changed_files,
            }),
        );
        self.render_to(SUBMISSION_TEMPLATE, &data, page)
    }

    /// Write the detail page of one compared pair
    pub fn write_comparison_page(
        &self,
        left: &str,
        right: &str,
        score: f64,
        lines: &[String],
        failure: Option<&str>,
    ) -> Result<String, ReportError> {
        let page = self.allocate_page_name();
        let data = self.page_data(
            format!("{left} vs {right}"),
            json!({
                "left": left,
                "right": right,
                "score": score,
                "lines": lines,
                "failure": failure,
            }),
        );
        self.render_to(COMPARISON_TEMPLATE, &data, &page)?;
        Ok(page)
    }

    /// Write the similarity matrix image and return its file name
    pub fn write_figure(&self, matrix: &SimilarityMatrix) -> Result<String, ReportError> {
        let n = matrix.size();
        let extent = FIGURE_MARGIN + n * FIGURE_CELL + FIGURE_CELL / 2;

        let labels: Vec<FigureLabel> = matrix
            .labels
            .iter()
            .enumerate()
            .map(|(i, archive)| FigureLabel {
                text: (i + 1).to_string(),
                archive: archive.clone(),
                row_x: FIGURE_MARGIN - 6,
                row_y: FIGURE_MARGIN + i * FIGURE_CELL + FIGURE_CELL * 2 / 3,
                column_x: FIGURE_MARGIN + i * FIGURE_CELL + FIGURE_CELL / 2,
                column_y: FIGURE_MARGIN - 8,
            })
            .collect();

        let mut cells = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if let Some(score) = matrix.cell(i, j) {
                    cells.push(FigureCell {
                        x: FIGURE_MARGIN + j * FIGURE_CELL,
                        y: FIGURE_MARGIN + i * FIGURE_CELL,
                        size: FIGURE_CELL,
                        color: grey_hex(score),
                        title: format!(
                            "{} / {}: {:.2}",
                            matrix.labels[i], matrix.labels[j], score
                        ),
                    });
                }
            }
        }

        let data = json!({
            "width": extent,
            "height": extent,
            "labels": safe_json_value(labels),
            "cells": safe_json_value(cells),
        });
        self.render_to(FIGURE_TEMPLATE, &data, &self.config.figure_name)?;
        Ok(self.config.figure_name.clone())
    }

    fn matrix_view(matrix: &SimilarityMatrix) -> MatrixView {
        let n = matrix.size();
        let rows = (0..n)
            .map(|i| MatrixRowView {
                label: (i + 1).to_string(),
                archive: matrix.labels[i].clone(),
                cells: (0..n)
                    .map(|j| match matrix.cell(i, j) {
                        Some(score) => MatrixCellView {
                            text: format!("{score:.2}"),
                            color: grey_hex(score),
                            class: if score > 0.5 { "dark" } else { "light" },
                            href: (i < j)
                                .then(|| matrix.record(i, j))
                                .flatten()
                                .and_then(|record| record.detail_page.clone()),
                        },
                        None => MatrixCellView {
                            text: String::new(),
                            color: "#ffffff".to_string(),
                            class: "blank",
                            href: None,
                        },
                    })
                    .collect(),
            })
            .collect();

        MatrixView {
            columns: (1..=n).map(|i| i.to_string()).collect(),
            rows,
        }
    }

    /// Write the stylesheet
    pub fn write_stylesheet(&self) -> Result<(), ReportError> {
        write_stylesheet(
            &self.output_dir,
            &self.config.stylesheet_name,
            self.config.templates_dir.as_deref(),
        )
    }

    /// Write the global index page and return its path
    pub fn write_index(&self, page: &IndexPage<'_>) -> Result<PathBuf, ReportError> {
        let matrix = match page.strategy {
            StrategyKind::Delegated => Some(safe_json_value(Self::matrix_view(page.matrix))),
            StrategyKind::Alignment => None,
        };

        let pair_failures: Vec<serde_json::Value> = page
            .pair_failures
            .iter()
            .map(|failure| {
                json!({
                    "left": failure.left_archive,
                    "right": failure.right_archive,
                    "reason": failure.reason,
                })
            })
            .collect();

        let data = self.page_data(
            "Submission similarity report".to_string(),
            json!({
                "generated_at": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                "strategy": page.strategy,
                "submission_count": page.entries.len(),
                "submissions": page.entries,
                "figure": page.figure,
                "matrix": matrix,
                "pair_failures": pair_failures,
            }),
        );
        self.render_to(INDEX_TEMPLATE, &data, &self.config.index_name)?;
        Ok(self.output_dir.join(&self.config.index_name))
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
