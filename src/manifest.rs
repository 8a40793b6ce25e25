//! The dataset descriptor read by the YOLO trainer

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PrepareError, Result};
use crate::types::{OutputDirs, MANIFEST_FILE_NAME};

/// Contents of `custom_dataset.yaml`. Field names are part of the trainer contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub names: Vec<String>,
    pub nc: usize,
    pub train: String,
    pub val: String,
}

impl Manifest {
    pub fn new(names: Vec<String>, train: &Path, val: &Path) -> Self {
        Self {
            nc: names.len(),
            names,
            train: train.to_string_lossy().into_owned(),
            val: val.to_string_lossy().into_owned(),
        }
    }

    /// Render as YAML. Strings are written as double-quoted scalars, so any class name
    /// or path survives a YAML parser.
    pub fn to_yaml(&self) -> String {
        let names = self
            .names
            .iter()
            .map(|name| quote(name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "names: [{}]\nnc: {}\ntrain: {}\nval: {}\n",
            names,
            self.nc,
            quote(&self.train),
            quote(&self.val)
        )
    }
}

// JSON strings are valid YAML double-quoted scalars
fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Read the class catalog, one class name per line in class-index order.
///
/// Every line is a class, blank ones included, so line `i` is always class `i`.
/// Only trailing whitespace is stripped.
pub fn read_class_names(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| PrepareError::io(path, e))?;
    Ok(content
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect())
}

/// Write the manifest at the dataset root and return its path
pub fn create_dataset_yaml(output_dirs: &OutputDirs, class_names: &[String]) -> Result<PathBuf> {
    let train = fs::canonicalize(&output_dirs.train_dir)
        .map_err(|e| PrepareError::io(&output_dirs.train_dir, e))?;
    let val = fs::canonicalize(&output_dirs.valid_dir)
        .map_err(|e| PrepareError::io(&output_dirs.valid_dir, e))?;
    let manifest = Manifest::new(class_names.to_vec(), &train, &val);

    let yaml_path = output_dirs.root.join(MANIFEST_FILE_NAME);
    let file = File::create(&yaml_path).map_err(|e| PrepareError::io(&yaml_path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(manifest.to_yaml().as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| PrepareError::io(&yaml_path, e))?;
    Ok(yaml_path)
}
