use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{PrepareError, Result};
use crate::types::{DEFAULT_IMG_FORMATS, DEFAULT_VIDEO_FORMATS};

/// Command-line arguments for preparing an image/video dataset for YOLO training.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing the images
    #[arg(long = "images_dir")]
    pub images_dir: Option<PathBuf>,

    /// Directory containing the videos to sample frames from
    #[arg(long = "videos_dir")]
    pub videos_dir: Option<PathBuf>,

    /// Directory containing the YOLO annotation txt files
    #[arg(long = "labels_dir")]
    pub labels_dir: PathBuf,

    /// File listing the class names, one per line
    #[arg(long = "classes_file")]
    pub classes_file: PathBuf,

    /// Root directory of the generated dataset
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f32,

    /// Image extensions to pick up from images_dir
    #[arg(long = "img_formats", value_delimiter = ',', default_values_t = default_img_formats())]
    pub img_formats: Vec<String>,

    /// Video extensions to pick up from videos_dir
    #[arg(long = "video_formats", value_delimiter = ',', default_values_t = default_video_formats())]
    pub video_formats: Vec<String>,

    /// Frames to keep per second of video
    #[arg(long = "frame_rate", default_value_t = 1, value_parser = validate_frame_rate)]
    pub frame_rate: u32,

    /// Seed for the train/valid split
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Fall back to an unstratified split when a class has a single sample
    #[arg(long = "allow_unstratified")]
    pub allow_unstratified: bool,

    /// Parent directory for the temporary extracted frames (defaults to the system temp dir)
    #[arg(long = "frames_dir")]
    pub frames_dir: Option<PathBuf>,
}

impl Args {
    pub fn to_sources(&self) -> Result<InputSources> {
        InputSources::new(
            self.images_dir.clone(),
            self.videos_dir.clone(),
            self.labels_dir.clone(),
            self.classes_file.clone(),
        )
    }

    pub fn to_config(&self) -> Result<PrepareConfig> {
        let config = PrepareConfig {
            output_dir: self.output_dir.clone(),
            val_size: self.val_size,
            img_formats: self.img_formats.clone(),
            video_formats: self.video_formats.clone(),
            frame_rate: self.frame_rate,
            seed: self.seed,
            split_policy: if self.allow_unstratified {
                SplitPolicy::FallbackUnstratified
            } else {
                SplitPolicy::Strict
            },
            frames_dir: self.frames_dir.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Where the raw samples come from. At least one of `images_dir` and `videos_dir` is always set.
#[derive(Debug, Clone)]
pub struct InputSources {
    images_dir: Option<PathBuf>,
    videos_dir: Option<PathBuf>,
    labels_dir: PathBuf,
    classes_file: PathBuf,
}

impl InputSources {
    pub fn new(
        images_dir: Option<PathBuf>,
        videos_dir: Option<PathBuf>,
        labels_dir: PathBuf,
        classes_file: PathBuf,
    ) -> Result<Self> {
        if images_dir.is_none() && videos_dir.is_none() {
            return Err(PrepareError::Config(
                "provide at least one images directory or videos directory".to_string(),
            ));
        }
        Ok(Self {
            images_dir,
            videos_dir,
            labels_dir,
            classes_file,
        })
    }

    pub fn images_dir(&self) -> Option<&PathBuf> {
        self.images_dir.as_ref()
    }

    pub fn videos_dir(&self) -> Option<&PathBuf> {
        self.videos_dir.as_ref()
    }

    pub fn labels_dir(&self) -> &PathBuf {
        &self.labels_dir
    }

    pub fn classes_file(&self) -> &PathBuf {
        &self.classes_file
    }
}

/// What to do when a class is too small to appear on both sides of the split.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SplitPolicy {
    /// Abort with a stratification error
    #[default]
    Strict,
    /// Log a warning and split the whole set with a seeded shuffle
    FallbackUnstratified,
}

#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub output_dir: PathBuf,
    pub val_size: f32,
    pub img_formats: Vec<String>,
    pub video_formats: Vec<String>,
    pub frame_rate: u32,
    pub seed: u64,
    pub split_policy: SplitPolicy,
    pub frames_dir: Option<PathBuf>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dataset_yolo"),
            val_size: 0.2,
            img_formats: default_img_formats(),
            video_formats: default_video_formats(),
            frame_rate: 1,
            seed: 42,
            split_policy: SplitPolicy::Strict,
            frames_dir: None,
        }
    }
}

impl PrepareConfig {
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Checked once before the pipeline touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !(self.val_size > 0.0 && self.val_size < 1.0) {
            return Err(PrepareError::Config(format!(
                "val_size must be strictly between 0.0 and 1.0, got {}",
                self.val_size
            )));
        }
        if self.frame_rate == 0 {
            return Err(PrepareError::Config(
                "frame_rate must be at least 1".to_string(),
            ));
        }
        if self.img_formats.is_empty() {
            return Err(PrepareError::Config(
                "img_formats must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_img_formats() -> Vec<String> {
    DEFAULT_IMG_FORMATS.iter().map(|ext| ext.to_string()).collect()
}

fn default_video_formats() -> Vec<String> {
    DEFAULT_VIDEO_FORMATS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

// Validate that the size is strictly between 0.0 and 1.0
pub fn validate_size(s: &str) -> std::result::Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if val > 0.0 && val < 1.0 => Ok(val),
        _ => Err("SIZE must be strictly between 0.0 and 1.0".to_string()),
    }
}

pub fn validate_frame_rate(s: &str) -> std::result::Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if val >= 1 => Ok(val),
        _ => Err("FRAME_RATE must be a positive integer".to_string()),
    }
}
