use glob::{glob_with, MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{PrepareError, Result};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create a directory and its parents. An existing directory is left as is.
pub fn create_output_directory(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        debug!("Directory {:?} already exists, reusing it.", path);
    } else {
        fs::create_dir_all(path).map_err(|e| PrepareError::io(path, e))?;
    }
    Ok(path.to_path_buf())
}

/// File name without directory and extension, the join key between images and labels
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

/// List the files directly inside `dir` whose extension is one of `extensions`.
///
/// Extensions are matched case-insensitively. Results are grouped by extension in the
/// order given, and sorted by path within each group, so discovery is deterministic.
pub fn collect_files_with_extensions(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PrepareError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        ));
    }

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let base = Pattern::escape(&dir.to_string_lossy());

    let mut files = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.');
        if ext.is_empty() {
            continue;
        }
        let pattern = format!("{}/*.{}", base, Pattern::escape(ext));
        let entries = glob_with(&pattern, options).map_err(|source| PrepareError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        let mut matched: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter(|path| seen.insert(path.clone()))
            .collect();
        matched.sort();
        files.extend(matched);
    }
    Ok(files)
}

/// Copy `src` to `dst` unless `dst` already holds the same bytes.
///
/// Returns `true` when a copy was made.
pub fn copy_if_changed(src: &Path, dst: &Path) -> Result<bool> {
    if files_identical(src, dst)? {
        return Ok(false);
    }
    fs::copy(src, dst).map_err(|e| PrepareError::io(dst, e))?;
    Ok(true)
}

fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let meta_b = match fs::metadata(b) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Ok(false),
    };
    let meta_a = fs::metadata(a).map_err(|e| PrepareError::io(a, e))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = fs::File::open(a).map_err(|e| PrepareError::io(a, e))?;
    let mut file_b = fs::File::open(b).map_err(|e| PrepareError::io(b, e))?;
    let mut buf_a = [0u8; 64 * 1024];
    let mut buf_b = [0u8; 64 * 1024];
    loop {
        let n = read_full(&mut file_a, &mut buf_a).map_err(|e| PrepareError::io(a, e))?;
        let m = read_full(&mut file_b, &mut buf_b).map_err(|e| PrepareError::io(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

// Fill as much of `buf` as the reader allows, stopping only at EOF
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
