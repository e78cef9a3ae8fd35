//! Comparison facilities for delegated (tree-level) scoring.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::core::config::SimilarityConfig;
use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::{list_files, FileReader};
use crate::detectors::normalizer::Normalizer;

static REPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?) consists for (\d+) ?% of (.*?) material\s*$")
        .expect("report line pattern is valid")
});

/// One facility finding: `left_file` consists for `percent` % of `right_file` material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOverlap {
    /// File whose content is covered
    pub left_file: PathBuf,
    /// File supplying the shared material
    pub right_file: PathBuf,
    /// Integer percentage of `left_file` covered
    pub percent: u32,
}

impl fmt::Display for FileOverlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} consists for {} % of {} material",
            self.left_file.display(),
            self.percent,
            self.right_file.display()
        )
    }
}

/// Compares two directory trees and reports per-file overlap
#[async_trait]
pub trait ComparisonFacility: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Compare every file of `left_dir` and `right_dir`
    async fn compare(&self, left_dir: &Path, right_dir: &Path) -> Result<Vec<FileOverlap>>;
}

fn ensure_dir(dir: &Path, left_dir: &Path, right_dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(SubdiffError::comparison(
            left_dir.display().to_string(),
            right_dir.display().to_string(),
            format!("filtered tree is missing: {}", dir.display()),
        ))
    }
}

/// Parse facility output into overlaps.
///
/// Lines that are not report lines are skipped. Relative file paths are
/// resolved against the left tree, or the right tree when the file lives there.
pub fn parse_report(output: &str, left_dir: &Path, right_dir: &Path) -> Result<Vec<FileOverlap>> {
    let resolve = |raw: &str| -> PathBuf {
        let path = PathBuf::from(raw.trim());
        if path.is_absolute() {
            return path;
        }
        let in_right = right_dir.join(&path);
        if !left_dir.join(&path).exists() && in_right.exists() {
            in_right
        } else {
            left_dir.join(path)
        }
    };

    let mut overlaps = Vec::new();
    for line in output.lines() {
        let Some(caps) = REPORT_LINE.captures(line.trim_end()) else {
            continue;
        };
        let percent: u32 = caps[2].parse().map_err(|_| {
            SubdiffError::comparison(
                left_dir.display().to_string(),
                right_dir.display().to_string(),
                format!("unparsable percentage in line: {line}"),
            )
        })?;
        overlaps.push(FileOverlap {
            left_file: resolve(&caps[1]),
            right_file: resolve(&caps[3]),
            percent,
        });
    }
    Ok(overlaps)
}

/// Runs an external similarity tester such as `sim_c`
#[derive(Debug, Clone)]
pub struct ExternalSimTool {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalSimTool {
    /// Create a facility invoking `command args... left right`
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    /// Create from the similarity configuration
    pub fn from_config(config: &SimilarityConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.command_args.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl ComparisonFacility for ExternalSimTool {
    fn name(&self) -> &str {
        &self.command
    }

    async fn compare(&self, left_dir: &Path, right_dir: &Path) -> Result<Vec<FileOverlap>> {
        ensure_dir(left_dir, left_dir, right_dir)?;
        ensure_dir(right_dir, left_dir, right_dir)?;
        let fail = |message: String| {
            SubdiffError::comparison(
                left_dir.display().to_string(),
                right_dir.display().to_string(),
                message,
            )
        };

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(left_dir)
            .arg(right_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("facility '{}' unavailable: {e}", self.command)))?;

        // Dropping the child on timeout kills the process.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("facility timed out after {:?}", self.timeout)))?
            .map_err(|e| fail(format!("facility I/O failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "facility exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{} produced {} bytes of output", self.command, stdout.len());
        parse_report(&stdout, left_dir, right_dir)
    }
}

/// In-process facility scoring normalized token shingle overlap
#[derive(Debug, Clone)]
pub struct TokenOverlapFacility {
    normalizer: Normalizer,
    shingle_size: usize,
    min_percent: u32,
}

struct ShingledFile {
    path: PathBuf,
    shingles: HashSet<String>,
}

impl TokenOverlapFacility {
    /// Create a facility with the given shingle width and reporting threshold
    pub fn new(normalizer: Normalizer, shingle_size: usize, min_percent: u32) -> Self {
        Self {
            normalizer,
            shingle_size: shingle_size.max(1),
            min_percent,
        }
    }

    /// Create from the similarity configuration
    pub fn from_config(normalizer: Normalizer, config: &SimilarityConfig) -> Self {
        Self::new(normalizer, config.shingle_size, config.min_percent)
    }

    fn shingles(&self, text: &str) -> HashSet<String> {
        let signature = self.normalizer.normalize(text);
        let tokens = signature.tokens();
        if tokens.is_empty() {
            return HashSet::new();
        }
        if tokens.len() < self.shingle_size {
            return HashSet::from([tokens.join(" ")]);
        }
        tokens
            .windows(self.shingle_size)
            .map(|window| window.join(" "))
            .collect()
    }

    fn load_tree(&self, root: &Path) -> Result<Vec<ShingledFile>> {
        let mut files = Vec::new();
        for relative in list_files(root)? {
            let path = root.join(relative);
            let text = FileReader::read_text(&path)?.text;
            files.push(ShingledFile {
                shingles: self.shingles(&text),
                path,
            });
        }
        Ok(files)
    }

    fn overlaps_between(&self, from: &[ShingledFile], to: &[ShingledFile]) -> Vec<FileOverlap> {
        let mut overlaps = Vec::new();
        for left in from.iter().filter(|f| !f.shingles.is_empty()) {
            for right in to {
                let shared = left.shingles.intersection(&right.shingles).count();
                let percent = (shared * 100 / left.shingles.len()) as u32;
                if percent >= self.min_percent {
                    overlaps.push(FileOverlap {
                        left_file: left.path.clone(),
                        right_file: right.path.clone(),
                        percent,
                    });
                }
            }
        }
        overlaps
    }
}

#[async_trait]
impl ComparisonFacility for TokenOverlapFacility {
    fn name(&self) -> &str {
        "token-overlap"
    }

    async fn compare(&self, left_dir: &Path, right_dir: &Path) -> Result<Vec<FileOverlap>> {
        ensure_dir(left_dir, left_dir, right_dir)?;
        ensure_dir(right_dir, left_dir, right_dir)?;

        let facility = self.clone();
        let (left_root, right_root) = (left_dir.to_path_buf(), right_dir.to_path_buf());
        let (left, right) = tokio::task::spawn_blocking(move || -> Result<_> {
            Ok((facility.load_tree(&left_root)?, facility.load_tree(&right_root)?))
        })
        .await
        .map_err(|e| {
            SubdiffError::comparison(
                left_dir.display().to_string(),
                right_dir.display().to_string(),
                format!("token overlap task failed: {e}"),
            )
        })??;

        let mut overlaps = self.overlaps_between(&left, &right);
        overlaps.extend(self.overlaps_between(&right, &left));
        Ok(overlaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_report_lines() {
        let left = Path::new("/tmp/left");
        let right = Path::new("/tmp/right");
        let output = "\
File /tmp/left/a.c: 120 tokens, 12 lines
/tmp/left/a.c consists for 87 % of /tmp/right/a.c material
/tmp/right/b.c consists for 12% of /tmp/left/a.c material
nonsense line
";
        let overlaps = parse_report(output, left, right).unwrap();
        assert_eq!(overlaps.len(), 2);
        assert_eq!(overlaps[0].left_file, PathBuf::from("/tmp/left/a.c"));
        assert_eq!(overlaps[0].percent, 87);
        assert_eq!(overlaps[1].percent, 12);
        assert_eq!(overlaps[1].right_file, PathBuf::from("/tmp/left/a.c"));
    }

    #[test]
    fn test_parse_report_resolves_relative_paths() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        fs::write(right.path().join("only_right.c"), "x").unwrap();

        let output = "a.c consists for 50 % of only_right.c material\n";
        let overlaps = parse_report(output, left.path(), right.path()).unwrap();

        assert_eq!(overlaps[0].left_file, left.path().join("a.c"));
        assert_eq!(overlaps[0].right_file, right.path().join("only_right.c"));
    }

    #[test]
    fn test_parse_report_rejects_overflowing_percent() {
        let output = "a.c consists for 99999999999 % of b.c material";
        let err = parse_report(output, Path::new("/l"), Path::new("/r")).unwrap_err();
        assert_eq!(err.kind(), "ComparisonFailure");
    }

    #[test]
    fn test_overlap_display_is_a_report_line() {
        let overlap = FileOverlap {
            left_file: PathBuf::from("/l/a.c"),
            right_file: PathBuf::from("/r/a.c"),
            percent: 40,
        };
        let parsed = parse_report(&overlap.to_string(), Path::new("/l"), Path::new("/r")).unwrap();
        assert_eq!(parsed, vec![overlap]);
    }

    #[tokio::test]
    async fn test_token_overlap_identical_trees() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let code = "int sum(int *v, int n) { int s = 0; for (int i = 0; i < n; i++) s += v[i]; return s; }";
        fs::write(left.path().join("a.c"), code).unwrap();
        fs::write(right.path().join("renamed.c"), code.replace('s', "total_")).unwrap();

        let facility = TokenOverlapFacility::new(Normalizer::default(), 5, 1);
        let overlaps = facility.compare(left.path(), right.path()).await.unwrap();

        assert_eq!(overlaps.len(), 2);
        assert!(overlaps.iter().all(|o| o.percent == 100));
        assert_eq!(overlaps[0].left_file, left.path().join("a.c"));
        assert_eq!(overlaps[1].left_file, right.path().join("renamed.c"));
    }

    #[tokio::test]
    async fn test_token_overlap_unrelated_trees_report_nothing() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        fs::write(left.path().join("a.c"), "while (x) { y = y * 2; }").unwrap();
        fs::write(right.path().join("b.c"), "struct s { char c; };").unwrap();

        let facility = TokenOverlapFacility::new(Normalizer::default(), 3, 1);
        assert!(facility.compare(left.path(), right.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_threshold_reports_every_pair() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        fs::write(left.path().join("a.c"), "while (x) { y = y * 2; }").unwrap();
        fs::write(right.path().join("b.c"), "struct s { char c; };").unwrap();

        let facility = TokenOverlapFacility::new(Normalizer::default(), 3, 0);
        let overlaps = facility.compare(left.path(), right.path()).await.unwrap();
        assert_eq!(overlaps.len(), 2);
        assert!(overlaps.iter().all(|o| o.percent == 0));
    }

    #[tokio::test]
    async fn test_missing_tree_is_a_comparison_failure() {
        let left = tempdir().unwrap();
        let facility = TokenOverlapFacility::new(Normalizer::default(), 5, 1);
        let err = facility
            .compare(left.path(), &left.path().join("gone"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ComparisonFailure");
    }

    #[tokio::test]
    async fn test_external_tool_unavailable() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let tool = ExternalSimTool::new(
            "subdiff-no-such-sim-binary",
            Vec::new(),
            Duration::from_secs(5),
        );
        let err = tool.compare(left.path(), right.path()).await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_timeout() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let tool = ExternalSimTool::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(200),
        );
        let err = tool.compare(left.path(), right.path()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_output_is_parsed() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let tool = ExternalSimTool::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo \"$0/a.c consists for 42 % of $1/a.c material\"".to_string(),
            ],
            Duration::from_secs(5),
        );
        let overlaps = tool.compare(left.path(), right.path()).await.unwrap();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].percent, 42);
        assert_eq!(overlaps[0].left_file, left.path().join("a.c"));
    }
}
