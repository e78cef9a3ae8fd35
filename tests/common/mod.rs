//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const MAIN_C: &str = "int main(){return 0;}";

pub const SCHEDULER_C: &str = "\
#include <linux/sched.h>
/* pick the next task */
static int pick_next(struct task *tasks, int count)
{
    int best = 0;
    for (int i = 1; i < count; i++) {
        if (tasks[i].priority > tasks[best].priority)
            best = i;
    }
    return best;
}
";

/// Write a zip archive with the given entries
pub fn write_zip(path: &Path, files: Vec<(&str, Vec<u8>)>) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in files {
        zip.start_file(name, FileOptions::default()).unwrap();
        zip.write_all(&content).unwrap();
    }
    zip.finish().unwrap();
}

/// Write a zip archive of text files
pub fn write_text_zip(path: &Path, files: &[(&str, &str)]) {
    write_zip(
        path,
        files
            .iter()
            .map(|(name, text)| (*name, text.as_bytes().to_vec()))
            .collect(),
    );
}

/// Gzip-compressed tarball bytes
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Baseline tree with a single `a.c`
pub fn baseline(root: &Path) -> PathBuf {
    let dir = root.join("baseline");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.c"), MAIN_C).unwrap();
    dir
}

/// Empty submissions folder
pub fn submissions(root: &Path) -> PathBuf {
    let dir = root.join("submissions");
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Every `href`/`src` attribute value in an HTML page
pub fn links(html: &str) -> Vec<String> {
    let mut found = Vec::new();
    for attribute in ["href=\"", "src=\""] {
        for (start, _) in html.match_indices(attribute) {
            let rest = &html[start + attribute.len()..];
            if let Some(end) = rest.find('"') {
                found.push(rest[..end].to_string());
            }
        }
    }
    found
}
