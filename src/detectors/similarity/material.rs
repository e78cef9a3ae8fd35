//! Comparable material of a submission: new files and diff-only bodies.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use similar::{ChangeTag, TextDiff};

use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::{write_with_parents, FileReader};
use crate::detectors::normalizer::{Normalizer, Signature};
use crate::detectors::tree_diff::{DiffFilter, TreeDiffNode};

/// Content of one reportable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContent {
    /// File present only in the submission
    New {
        /// Submission text
        text: String,
    },
    /// File present in both trees
    Changed {
        /// Baseline text
        baseline: String,
        /// Submission text
        submission: String,
    },
}

/// One reportable file with its decoded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    /// Path relative to the staged root
    pub path: PathBuf,
    /// Decoded content
    pub content: ArtifactContent,
}

impl FileArtifact {
    /// Whether this artifact is a new file
    pub fn is_new(&self) -> bool {
        matches!(self.content, ArtifactContent::New { .. })
    }

    /// Text that takes part in comparison
    pub fn comparable_body(&self) -> Cow<'_, str> {
        match &self.content {
            ArtifactContent::New { text } => Cow::Borrowed(text),
            ArtifactContent::Changed {
                baseline,
                submission,
            } => Cow::Owned(added_lines(baseline, submission)),
        }
    }
}

/// Artifacts of one submission plus the number of lossy decodes
#[derive(Debug, Clone, Default)]
pub struct SubmissionMaterial {
    /// New files first, then changed files, each in tree pre-order
    pub artifacts: Vec<FileArtifact>,
    /// Files that were not valid UTF-8
    pub decode_warnings: usize,
}

impl SubmissionMaterial {
    /// Read every reportable file of `tree`
    pub fn collect(
        tree: &TreeDiffNode,
        filter: &DiffFilter,
        staged_root: &Path,
        baseline_root: &Path,
    ) -> Result<Self> {
        let mut material = Self::default();

        for path in filter.new_files(tree) {
            let text = material.read(&staged_root.join(path))?;
            material.artifacts.push(FileArtifact {
                path: path.to_path_buf(),
                content: ArtifactContent::New { text },
            });
        }

        for path in filter.common_files(tree) {
            let baseline = material.read(&baseline_root.join(path))?;
            let submission = material.read(&staged_root.join(path))?;
            material.artifacts.push(FileArtifact {
                path: path.to_path_buf(),
                content: ArtifactContent::Changed {
                    baseline,
                    submission,
                },
            });
        }

        Ok(material)
    }

    fn read(&mut self, path: &Path) -> Result<String> {
        let decoded = FileReader::read_text(path)?;
        if decoded.lossy {
            self.decode_warnings += 1;
        }
        Ok(decoded.text)
    }

    /// Number of new-file artifacts
    pub fn new_count(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_new()).count()
    }

    /// Number of changed-file artifacts
    pub fn changed_count(&self) -> usize {
        self.artifacts.len() - self.new_count()
    }

    /// Concatenated signature of every comparable body
    pub fn signature(&self, normalizer: &Normalizer) -> Signature {
        let mut signature = Signature::default();
        for artifact in &self.artifacts {
            signature.append(&normalizer.normalize(&artifact.comparable_body()));
        }
        signature
    }

    /// Write the filtered tree under `dest`, preserving relative paths
    pub fn write_filtered_tree(&self, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest).map_err(|e| SubdiffError::io_at("create", dest, e))?;
        for artifact in &self.artifacts {
            write_with_parents(
                &dest.join(&artifact.path),
                artifact.comparable_body().as_bytes(),
            )?;
        }
        Ok(())
    }
}

/// Lines added going from `baseline` to `submission`, without diff markers
pub fn added_lines(baseline: &str, submission: &str) -> String {
    let diff = TextDiff::from_lines(baseline, submission);
    let mut body = String::new();
    for change in diff.iter_all_changes() {
        if change.tag() == ChangeTag::Insert {
            body.push_str(change.value());
            if change.missing_newline() {
                body.push('\n');
            }
        }
    }
    body
}
