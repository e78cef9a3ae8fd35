//! File utilities for safe and robust file operations.
//!
//! Student submissions routinely contain files saved in legacy encodings, so
//! every text read here degrades to a lossy decode instead of failing.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::core::errors::{Result, SubdiffError};

/// Text decoded from raw bytes, remembering whether replacement happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Decoded content
    pub text: String,
    /// True when invalid UTF-8 sequences were replaced
    pub lossy: bool,
}

/// Decode bytes as UTF-8, substituting undecodable sequences
pub fn decode_lossy(bytes: &[u8]) -> DecodedText {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(text) => DecodedText {
            text: text.to_string(),
            lossy: false,
        },
        Cow::Owned(text) => DecodedText { text, lossy: true },
    }
}

/// Safe file reading with UTF-8 validation and fallback handling
pub struct FileReader;

impl FileReader {
    /// Read a file as text, converting invalid UTF-8 lossily
    pub fn read_text(file_path: &Path) -> Result<DecodedText> {
        let bytes = fs::read(file_path).map_err(|e| SubdiffError::io_at("read", file_path, e))?;
        let decoded = decode_lossy(&bytes);
        if decoded.lossy {
            warn!(
                "File contained invalid UTF-8, converted with lossy encoding: {}",
                file_path.display()
            );
        }
        Ok(decoded)
    }

    /// Read non-empty, trimmed lines of a small metadata file
    pub fn read_trimmed_lines(file_path: &Path) -> Result<Vec<String>> {
        let decoded = Self::read_text(file_path)?;
        Ok(decoded
            .text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Total byte size of all regular files below `root`
pub fn tree_size(root: &Path) -> Result<u64> {
    let mut total = 0_u64;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let metadata = entry.metadata()?;
            total = total.saturating_add(metadata.len());
        }
    }
    Ok(total)
}

/// Regular files below `root`, relative to it, in sorted order
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Direct children of `dir`, sorted lexicographically by file name
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| SubdiffError::io_at("list", dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| SubdiffError::io_at("list", dir, e))?;
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}

/// Remove a directory tree if it exists
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SubdiffError::io_at("remove", dir, e)),
    }
}

/// Write `content` to `path`, creating parent directories as needed
pub fn write_with_parents(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SubdiffError::io_at("create", parent, e))?;
    }
    fs::write(path, content).map_err(|e| SubdiffError::io_at("write", path, e))
}
