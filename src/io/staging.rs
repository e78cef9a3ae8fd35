//! Archive staging: extraction into the scratch directory, layout checks,
//! nested archive unpacking and submitter discovery.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::core::config::StagingConfig;
use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::{remove_dir_if_exists, sorted_entries, FileReader};
use crate::core::submission::MISSING_SUBMITTERS;

/// Unpacks an archive into a destination directory
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest`, which already exists
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveFormat {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Default extractor for `.zip`, `.tar`, `.tar.gz` and `.tgz` archives.
///
/// Entries whose paths would escape the destination are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipTarExtractor;

impl ZipTarExtractor {
    fn archive_name(archive: &Path) -> String {
        archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.display().to_string())
    }

    fn unpack_tar<R: std::io::Read>(archive: &Path, reader: R, dest: &Path) -> Result<()> {
        let name = Self::archive_name(archive);
        let mut tarball = tar::Archive::new(reader);
        let entries = tarball
            .entries()
            .map_err(|e| SubdiffError::extraction(&name, e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| SubdiffError::extraction(&name, e.to_string()))?;
            let unpacked = entry
                .unpack_in(dest)
                .map_err(|e| SubdiffError::extraction(&name, e.to_string()))?;
            if !unpacked {
                return Err(SubdiffError::extraction(
                    &name,
                    "entry path escapes the extraction directory",
                ));
            }
        }
        Ok(())
    }
}

impl ArchiveExtractor for ZipTarExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let name = Self::archive_name(archive);
        let format = ArchiveFormat::detect(archive)
            .ok_or_else(|| SubdiffError::extraction(&name, "unsupported archive format"))?;
        let corrupt = |e: &dyn std::fmt::Display| SubdiffError::extraction(&name, e.to_string());
        let file = File::open(archive).map_err(|e| corrupt(&e))?;

        match format {
            ArchiveFormat::Zip => {
                let mut zip = ZipArchive::new(file).map_err(|e| corrupt(&e))?;
                zip.extract(dest).map_err(|e| corrupt(&e))
            }
            ArchiveFormat::TarGz => Self::unpack_tar(archive, GzDecoder::new(file), dest),
            ArchiveFormat::Tar => Self::unpack_tar(archive, file, dest),
        }
    }
}

/// A successfully staged submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSubmission {
    /// Root of the extracted tree
    pub root: PathBuf,
    /// Submitter names, or the missing sentinel
    pub submitters: Vec<String>,
}

/// Extracts one archive at a time into a shared scratch directory
pub struct ArchiveStager {
    config: StagingConfig,
    extractor: Arc<dyn ArchiveExtractor>,
    scratch_dir: PathBuf,
}

impl ArchiveStager {
    /// Create a stager whose scratch directory lives under `scratch_parent`
    pub fn new(
        config: &StagingConfig,
        extractor: Arc<dyn ArchiveExtractor>,
        scratch_parent: &Path,
    ) -> Self {
        Self {
            scratch_dir: scratch_parent.join(&config.scratch_dir_name),
            config: config.clone(),
            extractor,
        }
    }

    /// The scratch directory used for every staged submission
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Remove the scratch directory
    pub fn clear(&self) -> Result<()> {
        remove_dir_if_exists(&self.scratch_dir)
    }

    /// Stage `archive` into a clean scratch directory.
    ///
    /// A nested archive that fails to extract leaves the top-level files in
    /// place; callers clear the scratch directory before the next archive.
    pub fn stage(&self, archive: &Path) -> Result<StagedSubmission> {
        let name = ZipTarExtractor::archive_name(archive);
        self.clear()?;
        fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| SubdiffError::io_at("create", &self.scratch_dir, e))?;

        info!("Staging {}", name);
        if let Err(err) = self.extractor.extract(archive, &self.scratch_dir) {
            self.clear()?;
            return Err(match err {
                SubdiffError::Extraction { .. } => err,
                other => SubdiffError::extraction(&name, other.to_string()),
            });
        }

        self.check_layout(&name)?;
        self.extract_nested(&name)?;

        Ok(StagedSubmission {
            root: self.scratch_dir.clone(),
            submitters: self.read_submitters()?,
        })
    }

    fn check_layout(&self, archive: &str) -> Result<()> {
        let entries = sorted_entries(&self.scratch_dir)?;
        if let [only] = entries.as_slice() {
            if only.is_dir() {
                let entry = only
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Err(SubdiffError::layout(archive, entry));
            }
        }
        Ok(())
    }

    fn extract_nested(&self, archive: &str) -> Result<()> {
        for nested_name in &self.config.nested_archive_names {
            let nested = self.scratch_dir.join(nested_name);
            if !nested.is_file() {
                continue;
            }
            debug!("Extracting nested archive {} of {}", nested_name, archive);
            self.extractor
                .extract(&nested, &self.scratch_dir)
                .map_err(|e| {
                    let message = match e {
                        SubdiffError::Extraction { message, .. } => message,
                        other => other.to_string(),
                    };
                    SubdiffError::nested_extraction(archive, message)
                })?;
            fs::remove_file(&nested).map_err(|e| SubdiffError::io_at("remove", &nested, e))?;
        }
        Ok(())
    }

    fn read_submitters(&self) -> Result<Vec<String>> {
        let wanted: Vec<String> = self
            .config
            .submitters_file_names
            .iter()
            .map(|n| n.to_lowercase())
            .collect();

        for entry in sorted_entries(&self.scratch_dir)? {
            let is_submitters_file = entry.is_file()
                && entry
                    .file_name()
                    .map(|n| wanted.contains(&n.to_string_lossy().to_lowercase()))
                    .unwrap_or(false);
            if is_submitters_file {
                let names = FileReader::read_trimmed_lines(&entry)?;
                if !names.is_empty() {
                    return Ok(names);
                }
            }
        }

        Ok(vec![MISSING_SUBMITTERS.to_string()])
    }
}
