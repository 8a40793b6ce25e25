//! Image and video to YOLO dataset preparation
//!
//! This library pairs images (and frames sampled from videos) with their YOLO annotation
//! files, splits them into stratified train/valid subsets and lays them out for training.

pub mod config;
pub mod error;
pub mod io;
pub mod labels;
pub mod manifest;
pub mod pairing;
pub mod split;
pub mod types;
pub mod utils;
pub mod video;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::{Args, InputSources, PrepareConfig, SplitPolicy};
pub use error::{PrepareError, Result};
pub use manifest::Manifest;
pub use types::{OutputDirs, PrepareReport, ProcessingStats, Sample, SplitData};
pub use video::{FfmpegBackend, FrameWorkspace, VideoBackend, VideoDecoder};
pub use yolo_dataset::{process_dataset, process_dataset_with_backend};
