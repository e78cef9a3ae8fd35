//! Recursive comparison of a staged submission tree against the baseline tree.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::config::DiffConfig;
use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::sorted_entries;

/// Classification of one staged path relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    /// Present only in the staged tree
    NewFile,
    /// File present in both trees
    CommonFile,
    /// Directory in the staged tree
    Subdir,
}

/// One node of a tree diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiffNode {
    /// Path relative to the staged root; empty for the root node
    pub path: PathBuf,
    /// Classification of this path
    pub category: DiffCategory,
    /// Children of a `Subdir`, sorted by file name
    pub children: Vec<TreeDiffNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Missing,
    File,
    Dir,
}

fn entry_kind(path: &Path, root: Option<&Path>) -> EntryKind {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return EntryKind::Missing;
    };
    if !meta.file_type().is_symlink() {
        return if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
    }

    // Only links to files inside the same tree are followed.
    let target = fs::canonicalize(path).ok();
    match (target, root) {
        (Some(target), Some(root)) if target.starts_with(root) && target.is_file() => {
            EntryKind::File
        }
        _ => {
            debug!("Skipping symlink {}", path.display());
            EntryKind::Missing
        }
    }
}

/// Canonical roots of the two trees being compared
struct Roots {
    staged: PathBuf,
    baseline: Option<PathBuf>,
}

/// Compare `staged_root` against `baseline_root`.
///
/// Baseline-only entries are ignored. A staged directory with no baseline
/// directory counterpart yields a `Subdir` whose descendants are all new.
/// Symlinks count as files when they resolve to a file inside their own tree
/// and are skipped otherwise, so linked directories are only walked at their
/// real location.
pub fn diff(staged_root: &Path, baseline_root: &Path) -> Result<TreeDiffNode> {
    let staged = fs::canonicalize(staged_root)
        .ok()
        .filter(|root| root.is_dir())
        .ok_or_else(|| {
            SubdiffError::internal(format!(
                "staged root is not a directory: {}",
                staged_root.display()
            ))
        })?;
    let baseline = fs::canonicalize(baseline_root)
        .ok()
        .filter(|root| root.is_dir());
    let roots = Roots { staged, baseline };

    Ok(TreeDiffNode {
        path: PathBuf::new(),
        category: DiffCategory::Subdir,
        children: diff_level(
            &roots,
            staged_root,
            roots.baseline.is_some().then_some(baseline_root),
            Path::new(""),
        )?,
    })
}

fn diff_level(
    roots: &Roots,
    staged_dir: &Path,
    baseline_dir: Option<&Path>,
    relative: &Path,
) -> Result<Vec<TreeDiffNode>> {
    let mut nodes = Vec::new();

    for staged_path in sorted_entries(staged_dir)? {
        let Some(name) = staged_path.file_name() else {
            continue;
        };
        let path = relative.join(name);
        let baseline_path = baseline_dir.map(|dir| dir.join(name));
        let baseline_kind = baseline_path
            .as_deref()
            .map(|p| entry_kind(p, roots.baseline.as_deref()))
            .unwrap_or(EntryKind::Missing);

        let node = match (entry_kind(&staged_path, Some(&roots.staged)), baseline_kind) {
            (EntryKind::Dir, EntryKind::Dir) => TreeDiffNode {
                children: diff_level(roots, &staged_path, baseline_path.as_deref(), &path)?,
                path,
                category: DiffCategory::Subdir,
            },
            (EntryKind::Dir, _) => TreeDiffNode {
                children: diff_level(roots, &staged_path, None, &path)?,
                path,
                category: DiffCategory::Subdir,
            },
            (EntryKind::File, EntryKind::File) => {
                TreeDiffNode::leaf(path, DiffCategory::CommonFile)
            }
            (EntryKind::File, _) => TreeDiffNode::leaf(path, DiffCategory::NewFile),
            (EntryKind::Missing, _) => continue,
        };
        nodes.push(node);
    }

    Ok(nodes)
}

impl TreeDiffNode {
    fn leaf(path: PathBuf, category: DiffCategory) -> Self {
        Self {
            path,
            category,
            children: Vec::new(),
        }
    }

    /// All nodes below this one in deterministic pre-order
    pub fn descendants(&self) -> Vec<&TreeDiffNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeDiffNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// File leaves in pre-order
    pub fn leaves(&self) -> Vec<&TreeDiffNode> {
        self.descendants()
            .into_iter()
            .filter(|node| node.category != DiffCategory::Subdir)
            .collect()
    }

    /// Paths of every descendant in `category`
    pub fn paths_in(&self, category: DiffCategory) -> Vec<&Path> {
        self.descendants()
            .into_iter()
            .filter(|node| node.category == category)
            .map(|node| node.path.as_path())
            .collect()
    }

    /// Number of descendants in `category`
    pub fn count(&self, category: DiffCategory) -> usize {
        self.descendants()
            .into_iter()
            .filter(|node| node.category == category)
            .count()
    }

    /// Check that every path below `staged_root` appears exactly once in the tree.
    ///
    /// Symlinks the diff skips are not expected in the tree.
    pub fn is_complete_for(&self, staged_root: &Path) -> Result<bool> {
        let root = fs::canonicalize(staged_root)?;
        let mut on_disk = HashSet::new();
        for entry in WalkDir::new(staged_root).min_depth(1) {
            let entry = entry?;
            if entry.path_is_symlink()
                && entry_kind(entry.path(), Some(&root)) == EntryKind::Missing
            {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(staged_root) {
                on_disk.insert(relative.to_path_buf());
            }
        }

        let mut seen = HashSet::new();
        for node in self.descendants() {
            if !seen.insert(node.path.clone()) {
                return Ok(false);
            }
        }
        Ok(seen == on_disk)
    }
}

/// Decides which diff leaves are reported and compared
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    ignore_suffixes: Vec<String>,
    filter_files: HashSet<String>,
}

impl DiffFilter {
    /// Build a filter from configuration plus caller-supplied names
    pub fn new(config: &DiffConfig, extra_filter_files: &[String]) -> Self {
        let ignore_suffixes = config
            .ignore_suffixes
            .iter()
            .map(|suffix| format!(".{}", suffix.trim_start_matches('.').to_lowercase()))
            .collect();
        let filter_files = config
            .filter_files
            .iter()
            .chain(extra_filter_files)
            .cloned()
            .collect();
        Self {
            ignore_suffixes,
            filter_files,
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn is_filtered(&self, path: &Path) -> bool {
        self.filter_files.contains(&Self::file_name(path))
    }

    fn has_ignored_suffix(&self, path: &Path) -> bool {
        let name = Self::file_name(path).to_lowercase();
        self.ignore_suffixes.iter().any(|suffix| name.ends_with(suffix))
    }

    /// Whether a leaf takes part in reporting and comparison
    pub fn accepts(&self, node: &TreeDiffNode) -> bool {
        match node.category {
            DiffCategory::NewFile => {
                !self.is_filtered(&node.path) && !self.has_ignored_suffix(&node.path)
            }
            DiffCategory::CommonFile => !self.is_filtered(&node.path),
            DiffCategory::Subdir => false,
        }
    }

    /// Reportable new files of a tree, in pre-order
    pub fn new_files<'a>(&self, tree: &'a TreeDiffNode) -> Vec<&'a Path> {
        self.select(tree, DiffCategory::NewFile)
    }

    /// Comparable common files of a tree, in pre-order
    pub fn common_files<'a>(&self, tree: &'a TreeDiffNode) -> Vec<&'a Path> {
        self.select(tree, DiffCategory::CommonFile)
    }

    fn select<'a>(&self, tree: &'a TreeDiffNode, category: DiffCategory) -> Vec<&'a Path> {
        tree.leaves()
            .into_iter()
            .filter(|node| node.category == category && self.accepts(node))
            .map(|node| node.path.as_path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlinks_are_walked_at_their_target() {
        use std::os::unix::fs::symlink;

        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        for root in [staged.path(), baseline.path()] {
            write(root, "include/asm-i386/page.h", "#define PAGE_SHIFT 12");
            symlink("asm-i386", root.join("include/asm")).unwrap();
        }
        write(staged.path(), "hw.c", "int main(){return 0;}");

        let tree = diff(staged.path(), baseline.path()).unwrap();

        assert_eq!(tree.paths_in(DiffCategory::NewFile), vec![Path::new("hw.c")]);
        assert_eq!(
            tree.paths_in(DiffCategory::CommonFile),
            vec![Path::new("include/asm-i386/page.h")]
        );
        assert!(tree.is_complete_for(staged.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_leaving_the_tree_are_skipped() {
        use std::os::unix::fs::symlink;

        let outside = tempdir().unwrap();
        write(outside.path(), "secret.txt", "not part of the submission");
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(staged.path(), "real.c", "int x;");
        symlink("real.c", staged.path().join("alias.c")).unwrap();
        symlink(outside.path().join("secret.txt"), staged.path().join("leak.c")).unwrap();
        symlink("missing.c", staged.path().join("dangling.c")).unwrap();

        let tree = diff(staged.path(), baseline.path()).unwrap();

        assert_eq!(
            tree.paths_in(DiffCategory::NewFile),
            vec![Path::new("alias.c"), Path::new("real.c")]
        );
        assert!(tree.is_complete_for(staged.path()).unwrap());
    }

    #[test]
    fn test_new_and_common_classification() {
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(baseline.path(), "a.c", "int main(){return 0;}");
        write(baseline.path(), "only_in_baseline.c", "");
        write(staged.path(), "a.c", "int main(){return 0;}");
        write(staged.path(), "b.c", "int f(){return 1;}");

        let tree = diff(staged.path(), baseline.path()).unwrap();

        assert_eq!(tree.paths_in(DiffCategory::CommonFile), vec![Path::new("a.c")]);
        assert_eq!(tree.paths_in(DiffCategory::NewFile), vec![Path::new("b.c")]);
        assert!(tree.is_complete_for(staged.path()).unwrap());
    }

    #[test]
    fn test_staged_only_directory_is_all_new() {
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(baseline.path(), "kernel/sched.c", "");
        write(staged.path(), "kernel/sched.c", "");
        write(staged.path(), "extra/deep/x.c", "");
        write(staged.path(), "extra/y.c", "");

        let tree = diff(staged.path(), baseline.path()).unwrap();
        let extra = tree
            .children
            .iter()
            .find(|node| node.path == Path::new("extra"))
            .unwrap();

        assert_eq!(extra.category, DiffCategory::Subdir);
        assert_eq!(extra.count(DiffCategory::CommonFile), 0);
        assert_eq!(extra.count(DiffCategory::NewFile), 2);
        assert_eq!(tree.count(DiffCategory::CommonFile), 1);
    }

    #[test]
    fn test_file_directory_mismatches() {
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(baseline.path(), "was_dir/inner.c", "");
        write(staged.path(), "was_dir", "now a file");
        write(baseline.path(), "was_file", "");
        write(staged.path(), "was_file/inner.c", "");

        let tree = diff(staged.path(), baseline.path()).unwrap();

        assert_eq!(tree.children[0].path, Path::new("was_dir"));
        assert_eq!(tree.children[0].category, DiffCategory::NewFile);
        assert_eq!(tree.children[1].category, DiffCategory::Subdir);
        assert_eq!(tree.children[1].children[0].category, DiffCategory::NewFile);
        assert!(tree.is_complete_for(staged.path()).unwrap());
    }

    #[test]
    fn test_siblings_sorted_and_preorder() {
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(staged.path(), "z.c", "");
        write(staged.path(), "m/b.c", "");
        write(staged.path(), "m/a.c", "");
        write(staged.path(), "a.c", "");

        let tree = diff(staged.path(), baseline.path()).unwrap();
        let order: Vec<_> = tree.leaves().iter().map(|n| n.path.clone()).collect();

        assert_eq!(
            order,
            vec![
                PathBuf::from("a.c"),
                PathBuf::from("m/a.c"),
                PathBuf::from("m/b.c"),
                PathBuf::from("z.c"),
            ]
        );
    }

    #[test]
    fn test_missing_baseline_makes_everything_new() {
        let staged = tempdir().unwrap();
        write(staged.path(), "a.c", "");
        let tree = diff(staged.path(), &staged.path().join("nope")).unwrap();
        assert_eq!(tree.count(DiffCategory::NewFile), 1);
    }

    #[test]
    fn test_filter_rules() {
        let staged = tempdir().unwrap();
        let baseline = tempdir().unwrap();
        write(baseline.path(), "Makefile", "");
        write(baseline.path(), "notes.txt", "");
        write(staged.path(), "Makefile", "all:");
        write(staged.path(), "notes.txt", "changed");
        write(staged.path(), "README.TXT", "");
        write(staged.path(), "hw.c", "");
        write(staged.path(), "scratch.c", "");

        let tree = diff(staged.path(), baseline.path()).unwrap();
        let extra = ["scratch.c".to_string(), "Makefile".to_string()];
        let filter = DiffFilter::new(&DiffConfig::default(), &extra);

        assert_eq!(filter.new_files(&tree), vec![Path::new("hw.c")]);
        assert_eq!(filter.common_files(&tree), vec![Path::new("notes.txt")]);
        // The tree itself keeps every path.
        assert!(tree.is_complete_for(staged.path()).unwrap());
    }
}
