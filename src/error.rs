use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepareError>;

/// Every way a preparation run can fail. All of them abort the run.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no valid image/annotation pairs found, check the input paths and formats")]
    NoPairs,

    #[error("not enough samples to split: found {found}, need at least 2")]
    TooFewSamples { found: usize },

    #[error("cannot stratify: class '{key}' has only {count} sample(s), at least 2 are required")]
    Stratification { key: String, count: usize },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write frame {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("video decoder error for {path}: {msg}")]
    Decode { path: PathBuf, msg: String },

    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl PrepareError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PrepareError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
